//! Typestate wrapper that runs the phases in order.
//!
//! [`TransactionSession::begin`] only yields a session once the prologue
//! passed, and [`TransactionSession::finish`] consumes it, so a transaction
//! cannot settle without validation or settle twice.

use std::marker::PhantomData;

use tally_account::{Checkpointable, Ledger, LedgerError, LedgerResult, LedgerStore, Signer};
use tally_types::{AuthKeyScheme, TokenType};
use tracing::debug;

use crate::lifecycle::{Settlement, TransactionLifecycle, TransactionParams};

/// A transaction between a passed prologue and its epilogue. `T` is the fee token.
pub struct TransactionSession<'a, S: LedgerStore, A: AuthKeyScheme, T: TokenType> {
    lifecycle: &'a TransactionLifecycle<A>,
    ledger: &'a mut Ledger<S>,
    runtime: &'a Signer,
    params: TransactionParams,
    sender: Signer,
    _fee_token: PhantomData<fn() -> T>,
}

/// Result of running a transaction body and settling it.
#[derive(Debug)]
pub struct Receipt<R> {
    /// Body outcome; on `Err` the body's writes were rolled back.
    pub output: Result<R, LedgerError>,
    pub settlement: Settlement,
}

impl<'a, S: LedgerStore, A: AuthKeyScheme, T: TokenType> TransactionSession<'a, S, A, T> {
    /// Run the prologue and open a session on success.
    pub fn begin(
        lifecycle: &'a TransactionLifecycle<A>,
        ledger: &'a mut Ledger<S>,
        runtime: &'a Signer,
        params: TransactionParams,
    ) -> LedgerResult<Self> {
        lifecycle.prologue::<T, S>(ledger, runtime, &params)?;
        let sender = ledger.transaction_signer(runtime, params.sender)?;
        Ok(Self {
            lifecycle,
            ledger,
            runtime,
            params,
            sender,
            _fee_token: PhantomData,
        })
    }

    pub fn params(&self) -> &TransactionParams {
        &self.params
    }

    /// The ledger, for the executing body.
    pub fn ledger(&mut self) -> &mut Ledger<S> {
        self.ledger
    }

    /// The sender's signer, as handed to the body.
    pub fn sender(&self) -> &Signer {
        &self.sender
    }

    /// Run the epilogue and close the session.
    pub fn finish(self, gas_units_remaining: u64) -> LedgerResult<Settlement> {
        self.lifecycle
            .epilogue::<T, S>(self.ledger, self.runtime, &self.params, gas_units_remaining)
    }
}

impl<'a, S, A, T> TransactionSession<'a, S, A, T>
where
    S: LedgerStore + Checkpointable,
    A: AuthKeyScheme,
    T: TokenType,
{
    /// Execute `body` as the sender with all-or-nothing semantics, then
    /// settle. Gas is charged whether or not the body succeeded.
    pub fn execute<R>(
        mut self,
        gas_units_remaining: u64,
        body: impl FnOnce(&mut Ledger<S>, &Signer) -> LedgerResult<R>,
    ) -> LedgerResult<Receipt<R>> {
        let sender = &self.sender;
        let output = self.ledger.atomically(|ledger| body(ledger, sender));
        if let Err(e) = &output {
            debug!(sender = %sender.address(), error = %e, "Transaction body aborted");
        }
        let settlement = self.finish(gas_units_remaining)?;
        Ok(Receipt { output, settlement })
    }
}
