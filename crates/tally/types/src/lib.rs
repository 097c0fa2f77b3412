//! Core type definitions for the Tally ledger.
//!
//! This crate provides the shared vocabulary of the ledger core: addresses,
//! authentication keys, token type identities, event payloads and the
//! hash/derive collaborator. No ledger state lives here.

#![deny(unsafe_code)]

pub mod address;
pub mod auth_key;
pub mod error;
pub mod event;
pub mod scheme;
pub mod token;

pub use address::AccountAddress;
pub use auth_key::AuthenticationKey;
pub use error::TypesError;
pub use event::{
    AcceptTokenEvent, DepositEvent, EventHandle, EventKey, EventRecord, EventStream, LedgerEvent,
    WithdrawEvent,
};
pub use scheme::{AuthKeyScheme, Blake3AuthScheme};
pub use token::{Stc, TokenCode, TokenType};
