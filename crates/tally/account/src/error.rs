use std::fmt;

use serde::{Deserialize, Serialize};
use tally_types::{AccountAddress, TokenCode};
use thiserror::Error;

use crate::store::StorageError;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Which capability an extraction or restoration refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityKind {
    Withdraw,
    KeyRotation,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::Withdraw => write!(f, "withdraw"),
            CapabilityKind::KeyRotation => write!(f, "key rotation"),
        }
    }
}

/// Errors from ledger operations and the transaction lifecycle.
///
/// Every error aborts the enclosing transaction; nothing here is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    // --- Account records ---
    #[error("account {0} does not exist")]
    AccountMissing(AccountAddress),

    #[error("account {0} already exists")]
    DuplicateAccount(AccountAddress),

    #[error("signer of account {0} has been delegated")]
    SignerDelegated(AccountAddress),

    #[error("authentication key pre-image does not match account {0}")]
    InvalidAuthKey(AccountAddress),

    #[error("malformed authentication key: expected 32 bytes, got {length}")]
    MalformedKey { length: usize },

    #[error("not authorized: operation requires {expected}, called by {actual}")]
    NotAuthorized {
        expected: AccountAddress,
        actual: AccountAddress,
    },

    // --- Capabilities ---
    #[error("{kind} capability of {address} is already extracted")]
    CapabilityAlreadyExtracted {
        address: AccountAddress,
        kind: CapabilityKind,
    },

    #[error("{kind} capability of {address} is already present")]
    CapabilityAlreadyPresent {
        address: AccountAddress,
        kind: CapabilityKind,
    },

    // --- Balances ---
    #[error("account {address} does not accept token {token}")]
    TokenNotAccepted {
        address: AccountAddress,
        token: TokenCode,
    },

    #[error("insufficient balance of {token} at {address}: required {required}, available {available}")]
    InsufficientBalance {
        address: AccountAddress,
        token: TokenCode,
        required: u128,
        available: u128,
    },

    #[error("balance store of {token} missing at {address}")]
    BalanceMissing {
        address: AccountAddress,
        token: TokenCode,
    },

    #[error("amount overflow on {token}: {current} + {amount} exceeds {max}")]
    AmountOverflow {
        token: TokenCode,
        current: u128,
        amount: u128,
        max: u128,
    },

    // --- Transaction lifecycle ---
    #[error("fee overflow: gas price {gas_price} x {gas_units} gas units exceeds {max_fee}")]
    FeeOverflow {
        gas_price: u64,
        gas_units: u64,
        max_fee: u128,
    },

    #[error("token {0} cannot be used to pay transaction fees")]
    UnsupportedFeeToken(TokenCode),

    #[error("account {address} cannot pay gas deposit: required {required}, available {available}")]
    CannotPayGas {
        address: AccountAddress,
        required: u128,
        available: u128,
    },

    #[error("sequence number {0} too big")]
    SequenceNumberTooBig(u64),

    #[error("sequence number too old: expected {expected}, got {actual}")]
    SequenceTooOld { expected: u64, actual: u64 },

    #[error("sequence number too new: expected {expected}, got {actual}")]
    SequenceTooNew { expected: u64, actual: u64 },

    #[error("sequence number overflow at {0}")]
    SequenceOverflow(u64),

    #[error("gas accounting error: {gas_units_remaining} gas units remaining exceeds maximum {max_gas_units}")]
    GasAccountingError {
        max_gas_units: u64,
        gas_units_remaining: u64,
    },

    // --- Issuance ---
    #[error("{what} was issued inside a rolled-back section")]
    RolledBack { what: &'static str },

    #[error("runtime signer already issued")]
    RuntimeSignerIssued,

    #[error("ledger invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LedgerError {
    /// Stable numeric code reported to the host when a transaction aborts.
    pub fn code(&self) -> u64 {
        match self {
            LedgerError::AccountMissing(_) => 1,
            LedgerError::DuplicateAccount(_) => 2,
            LedgerError::SignerDelegated(_) => 3,
            LedgerError::InvalidAuthKey(_) => 4,
            LedgerError::MalformedKey { .. } => 5,
            LedgerError::NotAuthorized { .. } => 6,
            LedgerError::CapabilityAlreadyExtracted { .. } => 7,
            LedgerError::CapabilityAlreadyPresent { .. } => 8,
            LedgerError::TokenNotAccepted { .. } => 9,
            LedgerError::InsufficientBalance { .. } => 10,
            LedgerError::BalanceMissing { .. } => 11,
            LedgerError::AmountOverflow { .. } => 12,
            LedgerError::FeeOverflow { .. } => 13,
            LedgerError::UnsupportedFeeToken(_) => 14,
            LedgerError::CannotPayGas { .. } => 15,
            LedgerError::SequenceNumberTooBig(_) => 16,
            LedgerError::SequenceTooOld { .. } => 17,
            LedgerError::SequenceTooNew { .. } => 18,
            LedgerError::SequenceOverflow(_) => 19,
            LedgerError::GasAccountingError { .. } => 20,
            LedgerError::InvariantViolation(_) => 21,
            LedgerError::Storage(_) => 22,
            LedgerError::RolledBack { .. } => 23,
            LedgerError::RuntimeSignerIssued => 24,
        }
    }

    /// Whether the error can only come from a broken ledger, never from a bad transaction.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            LedgerError::InvariantViolation(_) | LedgerError::Storage(_)
        )
    }
}
