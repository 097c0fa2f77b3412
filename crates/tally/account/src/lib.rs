//! Tally account ledger.
//!
//! Persistent per-address state and the operations that move it:
//!
//! - **Account Record**: authentication key, sequence number, capability slots, event handles
//! - **Balance Store**: one `u128` amount per (address, token type)
//! - **Auto-Accept Policy**: whether unsolicited tokens open a new balance store
//! - **Capabilities**: linear withdraw, key-rotation and signer rights
//! - **Signers**: identities minted only by the ledger
//! - **Fee pool**: where the transaction epilogue deposits gas fees
//!
//! Storage is abstracted behind [`LedgerStore`]; [`InMemoryLedgerStore`]
//! also implements [`Checkpointable`] so hosts can roll a failed
//! transaction body back with [`Ledger::atomically`]. Values the body took
//! out of the ledger are revoked with it.

#![deny(unsafe_code)]

mod accounts;
mod balance;
pub mod capability;
pub mod error;
mod fee;
pub mod ledger;
pub mod memory;
mod policy;
pub mod record;
pub mod signer;
pub mod store;
pub mod token;

pub use capability::{
    destroy_key_rotation_capability, destroy_signer_cap, key_rotation_capability_address,
    signer_address, withdraw_capability_address, KeyRotationCapability, SignerCapability,
    WithdrawCapability,
};
pub use error::{CapabilityKind, LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use memory::{InMemoryCheckpoint, InMemoryLedgerStore};
pub use record::{AccountRecord, AccountView, BalanceRecord, BalanceView};
pub use signer::Signer;
pub use store::{Checkpointable, LedgerStore, StorageError, StorageResult};
pub use token::{MintCapability, Token};
