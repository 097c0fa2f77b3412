//! Transaction fee pool.

use tally_types::{AccountAddress, TokenType};
use tracing::{debug, info};

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::signer::Signer;
use crate::store::LedgerStore;
use crate::token::Token;

impl<S: LedgerStore> Ledger<S> {
    /// Move a collected fee into the pool.
    pub fn pay_fee<T: TokenType>(&mut self, fee: Token<T>) -> LedgerResult<()> {
        self.ensure_live_token(&fee)?;
        let amount = fee.into_value();
        if amount == 0 {
            return Ok(());
        }
        let token_code = T::token_code();
        let current = self.store().fee_pool(&token_code);
        let total = current
            .checked_add(amount)
            .filter(|sum| *sum <= T::MAX_AMOUNT)
            .ok_or_else(|| LedgerError::AmountOverflow {
                token: token_code.clone(),
                current,
                amount,
                max: T::MAX_AMOUNT,
            })?;
        self.store_mut().set_fee_pool(token_code.clone(), total);
        debug!(token = %token_code, amount, pool = total, "Fee collected");
        Ok(())
    }

    pub fn fee_pool_balance<T: TokenType>(&self) -> u128 {
        self.store().fee_pool(&T::token_code())
    }

    /// Charge `amount` of `T` from `payer` straight into the pool.
    ///
    /// Runtime only. Bypasses the withdraw capability and emits no withdraw
    /// event; the epilogue is the only caller.
    pub fn collect_fee<T: TokenType>(
        &mut self,
        runtime: &Signer,
        payer: AccountAddress,
        amount: u128,
    ) -> LedgerResult<()> {
        self.ensure_runtime(runtime)?;
        if amount == 0 {
            return Ok(());
        }
        self.ensure_can_withdraw::<T>(payer, amount, false)?;
        self.debit_balance::<T>(payer, amount)?;
        self.pay_fee(Token::<T>::new(amount))
    }

    /// Drain the pool of `T`. Runtime only.
    pub fn distribute_transaction_fees<T: TokenType>(&mut self, runtime: &Signer) -> LedgerResult<Token<T>> {
        self.ensure_runtime(runtime)?;
        let token_code = T::token_code();
        let amount = self.store().fee_pool(&token_code);
        self.store_mut().set_fee_pool(token_code.clone(), 0);
        info!(token = %token_code, amount, "Transaction fees distributed");
        Ok(Token::issued(amount, self.issue_stamp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MintCapability;
    use tally_types::Stc;

    fn mint(amount: u128) -> Token<Stc> {
        MintCapability::<Stc>::issue(&Signer::runtime(None))
            .unwrap()
            .mint(amount)
            .unwrap()
    }

    #[test]
    fn fees_accumulate_and_drain() {
        let mut ledger = Ledger::in_memory();
        ledger.pay_fee(mint(30)).unwrap();
        ledger.pay_fee(mint(12)).unwrap();
        ledger.pay_fee(Token::<Stc>::zero()).unwrap();
        assert_eq!(ledger.fee_pool_balance::<Stc>(), 42);

        let drained = ledger
            .distribute_transaction_fees::<Stc>(&Signer::runtime(None))
            .unwrap();
        assert_eq!(drained.value(), 42);
        assert_eq!(ledger.fee_pool_balance::<Stc>(), 0);

        ledger
            .create_genesis_account(&Signer::runtime(None), AccountAddress::RUNTIME)
            .unwrap();
        ledger.deposit(AccountAddress::RUNTIME, drained).unwrap();
        assert_eq!(ledger.balance::<Stc>(AccountAddress::RUNTIME), 42);
    }

    #[test]
    fn only_runtime_distributes() {
        let mut ledger = Ledger::in_memory();
        ledger.pay_fee(mint(5)).unwrap();
        let stranger = Signer::new("0xdead".parse().unwrap());
        assert!(matches!(
            ledger.distribute_transaction_fees::<Stc>(&stranger),
            Err(LedgerError::NotAuthorized { .. })
        ));
        assert_eq!(ledger.fee_pool_balance::<Stc>(), 5);
    }

    #[test]
    fn collect_fee_moves_balance_into_pool() {
        let mut ledger = Ledger::in_memory();
        let payer: AccountAddress = "0xa".parse().unwrap();
        ledger.create_account_with_address::<Stc>(payer).unwrap();
        ledger.deposit(payer, mint(100)).unwrap();
        let events = ledger.events().len();

        ledger.collect_fee::<Stc>(&Signer::runtime(None), payer, 40).unwrap();
        assert_eq!(ledger.balance::<Stc>(payer), 60);
        assert_eq!(ledger.fee_pool_balance::<Stc>(), 40);
        assert_eq!(ledger.events().len(), events);

        assert!(matches!(
            ledger.collect_fee::<Stc>(&Signer::runtime(None), payer, 61),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert!(ledger.collect_fee::<Stc>(&Signer::new(payer), payer, 1).is_err());
        assert_eq!(ledger.balance::<Stc>(payer), 60);
    }
}
