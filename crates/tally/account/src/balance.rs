//! Deposits, withdrawals and payments.
//!
//! Each operation runs its `ensure_*` checks first and only then writes, so
//! a failed call leaves every slot as it was.

use tally_types::{AccountAddress, DepositEvent, LedgerEvent, TokenType, WithdrawEvent};
use tracing::debug;

use crate::capability::WithdrawCapability;
use crate::error::{CapabilityKind, LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::signer::Signer;
use crate::store::LedgerStore;
use crate::token::Token;

impl<S: LedgerStore> Ledger<S> {
    // ── Deposit ────────────────────────────────────────────────────────

    pub fn deposit<T: TokenType>(&mut self, receiver: AccountAddress, token: Token<T>) -> LedgerResult<()> {
        self.deposit_with_metadata(receiver, token, Vec::new())
    }

    pub fn deposit_to_self<T: TokenType>(&mut self, signer: &Signer, token: Token<T>) -> LedgerResult<()> {
        let address = self.authorize(signer)?;
        self.deposit(address, token)
    }

    /// Credit `token` to `receiver`, implicitly accepting `T` if the
    /// receiver's policy allows it. Zero-value tokens are discarded.
    pub fn deposit_with_metadata<T: TokenType>(
        &mut self,
        receiver: AccountAddress,
        token: Token<T>,
        metadata: Vec<u8>,
    ) -> LedgerResult<()> {
        let amount = token.value();
        if amount == 0 {
            return token.destroy_zero();
        }
        self.ensure_live_token(&token)?;
        self.ensure_can_deposit::<T>(receiver, amount)?;

        self.try_accept_token::<T>(receiver)?;
        self.credit::<T>(receiver, token.into_value())?;
        self.emit(
            receiver,
            LedgerEvent::Deposit(DepositEvent {
                amount,
                token_code: T::token_code(),
                metadata,
            }),
        )?;
        debug!(receiver = %receiver, token = %T::token_code(), amount, "Deposit");
        Ok(())
    }

    // ── Withdraw ───────────────────────────────────────────────────────

    pub fn withdraw<T: TokenType>(&mut self, signer: &Signer, amount: u128) -> LedgerResult<Token<T>> {
        self.withdraw_with_metadata(signer, amount, Vec::new())
    }

    /// Withdraw on the signer's own authority; refused while the withdraw
    /// capability is held elsewhere.
    pub fn withdraw_with_metadata<T: TokenType>(
        &mut self,
        signer: &Signer,
        amount: u128,
        metadata: Vec<u8>,
    ) -> LedgerResult<Token<T>> {
        let address = self.authorize(signer)?;
        self.ensure_can_withdraw::<T>(address, amount, true)?;
        self.debit::<T>(address, amount, metadata)
    }

    pub fn withdraw_with_capability<T: TokenType>(
        &mut self,
        cap: &WithdrawCapability,
        amount: u128,
    ) -> LedgerResult<Token<T>> {
        self.withdraw_with_capability_and_metadata(cap, amount, Vec::new())
    }

    pub fn withdraw_with_capability_and_metadata<T: TokenType>(
        &mut self,
        cap: &WithdrawCapability,
        amount: u128,
        metadata: Vec<u8>,
    ) -> LedgerResult<Token<T>> {
        self.ensure_live_withdraw_capability(cap)?;
        let address = cap.account_address();
        self.ensure_can_withdraw::<T>(address, amount, false)?;
        self.debit::<T>(address, amount, metadata)
    }

    // ── Pay ────────────────────────────────────────────────────────────

    pub fn pay_from<T: TokenType>(
        &mut self,
        signer: &Signer,
        payee: AccountAddress,
        amount: u128,
    ) -> LedgerResult<()> {
        self.pay_from_with_metadata::<T>(signer, payee, amount, Vec::new())
    }

    pub fn pay_from_with_metadata<T: TokenType>(
        &mut self,
        signer: &Signer,
        payee: AccountAddress,
        amount: u128,
        metadata: Vec<u8>,
    ) -> LedgerResult<()> {
        let payer = self.authorize(signer)?;
        self.ensure_can_withdraw::<T>(payer, amount, true)?;
        self.ensure_pay_leg::<T>(payer, payee, amount)?;

        let token = self.debit::<T>(payer, amount, metadata.clone())?;
        self.deposit_with_metadata(payee, token, metadata)
    }

    pub fn pay_from_capability<T: TokenType>(
        &mut self,
        cap: &WithdrawCapability,
        payee: AccountAddress,
        amount: u128,
        metadata: Vec<u8>,
    ) -> LedgerResult<()> {
        self.ensure_live_withdraw_capability(cap)?;
        let payer = cap.account_address();
        self.ensure_can_withdraw::<T>(payer, amount, false)?;
        self.ensure_pay_leg::<T>(payer, payee, amount)?;

        let token = self.debit::<T>(payer, amount, metadata.clone())?;
        self.deposit_with_metadata(payee, token, metadata)
    }

    // ── Checks ─────────────────────────────────────────────────────────

    /// Refuse a token withdrawn inside a section that rolled back.
    pub(crate) fn ensure_live_token<T: TokenType>(&self, token: &Token<T>) -> LedgerResult<()> {
        token
            .issued_in()
            .iter()
            .try_for_each(|section| self.ensure_live(Some(*section), "token"))
    }

    pub(crate) fn ensure_can_withdraw<T: TokenType>(
        &self,
        address: AccountAddress,
        amount: u128,
        require_capability: bool,
    ) -> LedgerResult<()> {
        let record = self.account(address)?;
        if require_capability && record.withdraw_capability.is_none() {
            return Err(LedgerError::CapabilityAlreadyExtracted {
                address,
                kind: CapabilityKind::Withdraw,
            });
        }
        if amount == 0 {
            return Ok(());
        }
        let available = self.balance::<T>(address);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                address,
                token: T::token_code(),
                required: amount,
                available,
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_can_deposit<T: TokenType>(
        &self,
        receiver: AccountAddress,
        amount: u128,
    ) -> LedgerResult<()> {
        if amount == 0 {
            return Ok(());
        }
        self.ensure_can_accept::<T>(receiver)?;
        let current = self.balance::<T>(receiver);
        match current.checked_add(amount) {
            Some(sum) if sum <= T::MAX_AMOUNT => Ok(()),
            _ => Err(LedgerError::AmountOverflow {
                token: T::token_code(),
                current,
                amount,
                max: T::MAX_AMOUNT,
            }),
        }
    }

    /// Deposit-leg check of a payment. Paying oneself nets to zero and
    /// cannot overflow once the withdraw leg passed.
    fn ensure_pay_leg<T: TokenType>(
        &self,
        payer: AccountAddress,
        payee: AccountAddress,
        amount: u128,
    ) -> LedgerResult<()> {
        if payer == payee {
            return Ok(());
        }
        self.ensure_can_deposit::<T>(payee, amount)
    }

    // ── Writes ─────────────────────────────────────────────────────────

    fn credit<T: TokenType>(&mut self, address: AccountAddress, amount: u128) -> LedgerResult<()> {
        let token = T::token_code();
        let balance = self
            .store_mut()
            .balance_mut(&address, &token)
            .ok_or_else(|| LedgerError::BalanceMissing {
                address,
                token: token.clone(),
            })?;
        balance.amount = balance
            .amount
            .checked_add(amount)
            .filter(|sum| *sum <= T::MAX_AMOUNT)
            .ok_or_else(|| {
                LedgerError::InvariantViolation(format!(
                    "credit of {amount} {token} to {address} passed its checks but overflowed"
                ))
            })?;
        Ok(())
    }

    /// Subtract an already-checked amount from a balance store.
    pub(crate) fn debit_balance<T: TokenType>(&mut self, address: AccountAddress, amount: u128) -> LedgerResult<()> {
        let token_code = T::token_code();
        let balance = self
            .store_mut()
            .balance_mut(&address, &token_code)
            .ok_or_else(|| LedgerError::BalanceMissing {
                address,
                token: token_code.clone(),
            })?;
        balance.amount = balance.amount.checked_sub(amount).ok_or_else(|| {
            LedgerError::InvariantViolation(format!(
                "debit of {amount} {token_code} from {address} passed its checks but underflowed"
            ))
        })?;
        Ok(())
    }

    /// Debit an already-checked amount and hand it out as a token.
    fn debit<T: TokenType>(
        &mut self,
        address: AccountAddress,
        amount: u128,
        metadata: Vec<u8>,
    ) -> LedgerResult<Token<T>> {
        if amount == 0 {
            return Ok(Token::zero());
        }
        self.debit_balance::<T>(address, amount)?;
        self.emit(
            address,
            LedgerEvent::Withdraw(WithdrawEvent {
                amount,
                token_code: T::token_code(),
                metadata,
            }),
        )?;
        debug!(address = %address, token = %T::token_code(), amount, "Withdraw");
        Ok(Token::issued(amount, self.issue_stamp()))
    }
}
