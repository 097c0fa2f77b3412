//! Token opt-in and the Auto-Accept Policy.
//!
//! A balance store for (address, T) exists only once the address accepted
//! `T`, either explicitly or implicitly on first deposit while auto-accept
//! is enabled.

use tally_types::{AcceptTokenEvent, AccountAddress, LedgerEvent, TokenType};
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::record::BalanceRecord;
use crate::signer::Signer;
use crate::store::LedgerStore;

impl<S: LedgerStore> Ledger<S> {
    /// Opt `signer` in to token `T`: install an empty balance store and log
    /// an accept-token event. No-op when the store already exists.
    pub fn do_accept_token<T: TokenType>(&mut self, signer: &Signer) -> LedgerResult<()> {
        let address = self.authorize(signer)?;
        self.account(address)?;
        if self.is_accepts_token::<T>(address) {
            return Ok(());
        }

        let token_code = T::token_code();
        self.store_mut()
            .insert_balance(address, token_code.clone(), BalanceRecord::default())?;
        self.emit(
            address,
            LedgerEvent::AcceptToken(AcceptTokenEvent {
                token_code: token_code.clone(),
            }),
        )?;
        debug!(address = %address, token = %token_code, "Token accepted");
        Ok(())
    }

    /// Entry point for an account opting in to `T` from a transaction.
    pub fn accept_token<T: TokenType>(&mut self, signer: &Signer) -> LedgerResult<()> {
        self.do_accept_token::<T>(signer)
    }

    /// Implicit acceptance used by deposits.
    ///
    /// With auto-accept enabled a signer is synthesized for `address` purely
    /// to install the balance store; otherwise `TokenNotAccepted`.
    pub fn try_accept_token<T: TokenType>(&mut self, address: AccountAddress) -> LedgerResult<()> {
        self.ensure_can_accept::<T>(address)?;
        if !self.is_accepts_token::<T>(address) {
            let signer = Signer::new(address);
            self.do_accept_token::<T>(&signer)?;
        }
        Ok(())
    }

    /// Check, without writing, that `address` holds or may implicitly create
    /// a balance store for `T`.
    pub(crate) fn ensure_can_accept<T: TokenType>(&self, address: AccountAddress) -> LedgerResult<()> {
        self.account(address)?;
        if self.is_accepts_token::<T>(address) || self.can_auto_accept_token(address) {
            return Ok(());
        }
        Err(LedgerError::TokenNotAccepted {
            address,
            token: T::token_code(),
        })
    }

    /// Whether `address` holds a balance store for `T`.
    pub fn is_accepts_token<T: TokenType>(&self, address: AccountAddress) -> bool {
        self.store().balance(&address, &T::token_code()).is_some()
    }

    /// Toggle the Auto-Accept Policy of the signer's account.
    pub fn set_auto_accept_token(&mut self, signer: &Signer, enable: bool) -> LedgerResult<()> {
        let address = self.authorize(signer)?;
        self.account(address)?;
        self.store_mut().set_auto_accept(address, enable);
        debug!(address = %address, enable, "Auto-accept token policy updated");
        Ok(())
    }

    /// Auto-accept flag; enabled unless the owner turned it off.
    pub fn can_auto_accept_token(&self, address: AccountAddress) -> bool {
        self.store().auto_accept(&address).unwrap_or(true)
    }
}
