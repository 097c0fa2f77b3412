//! Prologue and epilogue.
//!
//! The runtime calls [`TransactionLifecycle::prologue`] before a
//! transaction body runs and [`TransactionLifecycle::epilogue`] after it.
//! Each phase runs its checks in a fixed order and performs no write until
//! every check has passed.

use serde::{Deserialize, Serialize};
use tally_account::{Ledger, LedgerError, LedgerResult, LedgerStore, Signer};
use tally_types::{AccountAddress, AuthKeyScheme, AuthenticationKey, Blake3AuthScheme, TokenType};
use tracing::{debug, error, info, warn};

use crate::config::LifecycleConfig;

/// What the runtime knows about a transaction before executing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionParams {
    pub sender: AccountAddress,
    pub sequence_number: u64,
    /// Public-key material whose hash must match the sender's key.
    #[serde(default, with = "hex_bytes")]
    pub auth_key_preimage: Vec<u8>,
    pub gas_price: u64,
    pub max_gas_units: u64,
}

impl TransactionParams {
    /// Upper bound on the fee this transaction can be charged.
    pub fn max_transaction_fee(&self) -> u128 {
        u128::from(self.gas_price) * u128::from(self.max_gas_units)
    }
}

/// Fee charged and sequence number assigned by a successful epilogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub fee: u128,
    pub sequence_number: u64,
    pub key_bound: bool,
}

/// Validation and settlement around every transaction.
pub struct TransactionLifecycle<A: AuthKeyScheme = Blake3AuthScheme> {
    config: LifecycleConfig,
    scheme: A,
}

impl Default for TransactionLifecycle<Blake3AuthScheme> {
    fn default() -> Self {
        Self::new(LifecycleConfig::default(), Blake3AuthScheme)
    }
}

impl<A: AuthKeyScheme> TransactionLifecycle<A> {
    pub fn new(config: LifecycleConfig, scheme: A) -> Self {
        Self { config, scheme }
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    pub fn scheme(&self) -> &A {
        &self.scheme
    }

    /// Pre-execution gate. Read-only.
    pub fn prologue<T: TokenType, S: LedgerStore>(
        &self,
        ledger: &Ledger<S>,
        runtime: &Signer,
        params: &TransactionParams,
    ) -> LedgerResult<()> {
        self.check_prologue::<T, S>(ledger, runtime, params)
            .inspect(|_| {
                debug!(
                    sender = %params.sender,
                    sequence_number = params.sequence_number,
                    "Prologue passed"
                )
            })
            .inspect_err(|e| {
                warn!(
                    sender = %params.sender,
                    sequence_number = params.sequence_number,
                    error = %e,
                    "Prologue rejected transaction"
                )
            })
    }

    /// Post-execution settlement, binding the sender's key on first use.
    pub fn epilogue<T: TokenType, S: LedgerStore>(
        &self,
        ledger: &mut Ledger<S>,
        runtime: &Signer,
        params: &TransactionParams,
        gas_units_remaining: u64,
    ) -> LedgerResult<Settlement> {
        self.settle::<T, S>(ledger, runtime, params, gas_units_remaining, true)
    }

    /// Settlement without lazy key binding; the pre-image is ignored.
    pub fn epilogue_v1<T: TokenType, S: LedgerStore>(
        &self,
        ledger: &mut Ledger<S>,
        runtime: &Signer,
        params: &TransactionParams,
        gas_units_remaining: u64,
    ) -> LedgerResult<Settlement> {
        self.settle::<T, S>(ledger, runtime, params, gas_units_remaining, false)
    }

    fn check_prologue<T: TokenType, S: LedgerStore>(
        &self,
        ledger: &Ledger<S>,
        runtime: &Signer,
        params: &TransactionParams,
    ) -> LedgerResult<()> {
        ledger.ensure_runtime(runtime)?;
        let sender = params.sender;

        let record = ledger.account(sender)?;
        if ledger.is_signer_delegated(sender) {
            return Err(LedgerError::SignerDelegated(sender));
        }

        self.check_authentication(sender, record.authentication_key(), &params.auth_key_preimage)?;

        let max_fee = params.max_transaction_fee();
        self.check_fee_cap(params, max_fee)?;

        if max_fee > 0 {
            let token = T::token_code();
            if token != self.config.fee_token {
                return Err(LedgerError::UnsupportedFeeToken(token));
            }
            let available = ledger.balance::<T>(sender);
            if available < max_fee {
                return Err(LedgerError::CannotPayGas {
                    address: sender,
                    required: max_fee,
                    available,
                });
            }
            if params.sequence_number >= u64::MAX {
                return Err(LedgerError::SequenceNumberTooBig(params.sequence_number));
            }
        }

        let expected = record.sequence_number();
        if params.sequence_number < expected {
            return Err(LedgerError::SequenceTooOld {
                expected,
                actual: params.sequence_number,
            });
        }
        if params.sequence_number > expected {
            return Err(LedgerError::SequenceTooNew {
                expected,
                actual: params.sequence_number,
            });
        }
        Ok(())
    }

    /// Sentinel key: the pre-image must derive to the sender's own address.
    /// Bound key: its hash must equal the stored key.
    fn check_authentication(
        &self,
        sender: AccountAddress,
        stored: &AuthenticationKey,
        preimage: &[u8],
    ) -> LedgerResult<()> {
        let hashed = self.scheme.hash_preimage(preimage);
        let matches = if stored.is_zero() {
            self.scheme.derive_address(&hashed) == sender
        } else {
            hashed == *stored
        };
        if matches {
            Ok(())
        } else {
            Err(LedgerError::InvalidAuthKey(sender))
        }
    }

    fn check_fee_cap(&self, params: &TransactionParams, fee: u128) -> LedgerResult<()> {
        if fee > u128::from(self.config.max_fee) {
            return Err(LedgerError::FeeOverflow {
                gas_price: params.gas_price,
                gas_units: params.max_gas_units,
                max_fee: u128::from(self.config.max_fee),
            });
        }
        Ok(())
    }

    fn settle<T: TokenType, S: LedgerStore>(
        &self,
        ledger: &mut Ledger<S>,
        runtime: &Signer,
        params: &TransactionParams,
        gas_units_remaining: u64,
        bind_key: bool,
    ) -> LedgerResult<Settlement> {
        let checked = self.check_epilogue::<T, S>(ledger, runtime, params, gas_units_remaining);
        let fee = match checked {
            Ok(fee) => fee,
            Err(e) => {
                warn!(
                    sender = %params.sender,
                    sequence_number = params.sequence_number,
                    error = %e,
                    "Epilogue rejected transaction"
                );
                return Err(e);
            }
        };

        // Every check has passed; only writes from here on.
        let sender = params.sender;
        ledger.increment_sequence_number(runtime, sender, params.sequence_number)?;

        let mut key_bound = false;
        if bind_key
            && ledger.authentication_key(sender)?.is_zero()
            && !params.auth_key_preimage.is_empty()
        {
            let key = self.scheme.hash_preimage(&params.auth_key_preimage);
            ledger.bind_authentication_key(runtime, sender, key)?;
            key_bound = true;
        }

        if fee > 0 {
            ledger.collect_fee::<T>(runtime, sender, fee).map_err(|e| {
                error!(sender = %sender, fee, error = %e, "Fee collection failed after checks passed");
                LedgerError::InvariantViolation(format!(
                    "epilogue fee collection of {fee} from {sender} failed: {e}"
                ))
            })?;
        }

        let settlement = Settlement {
            fee,
            sequence_number: params.sequence_number + 1,
            key_bound,
        };
        info!(
            sender = %sender,
            fee,
            sequence_number = settlement.sequence_number,
            "Transaction settled"
        );
        Ok(settlement)
    }

    /// Epilogue checks; returns the fee to charge.
    fn check_epilogue<T: TokenType, S: LedgerStore>(
        &self,
        ledger: &Ledger<S>,
        runtime: &Signer,
        params: &TransactionParams,
        gas_units_remaining: u64,
    ) -> LedgerResult<u128> {
        ledger.ensure_runtime(runtime)?;
        let sender = params.sender;

        ledger.account(sender)?;
        if !ledger.is_accepts_token::<T>(sender) {
            return Err(LedgerError::BalanceMissing {
                address: sender,
                token: T::token_code(),
            });
        }

        if params.max_gas_units < gas_units_remaining {
            return Err(LedgerError::GasAccountingError {
                max_gas_units: params.max_gas_units,
                gas_units_remaining,
            });
        }
        let gas_used = params.max_gas_units - gas_units_remaining;
        let fee = u128::from(params.gas_price) * u128::from(gas_used);
        if fee > u128::from(self.config.max_fee) {
            return Err(LedgerError::FeeOverflow {
                gas_price: params.gas_price,
                gas_units: gas_used,
                max_fee: u128::from(self.config.max_fee),
            });
        }

        let available = ledger.balance::<T>(sender);
        if available < fee {
            return Err(LedgerError::InsufficientBalance {
                address: sender,
                token: T::token_code(),
                required: fee,
                available,
            });
        }

        if params.sequence_number == u64::MAX {
            return Err(LedgerError::SequenceOverflow(params.sequence_number));
        }
        Ok(fee)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.trim_start_matches("0x")).map_err(serde::de::Error::custom)
    }
}
