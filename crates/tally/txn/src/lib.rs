//! Tally transaction lifecycle.
//!
//! Every transaction passes through two runtime-only phases:
//!
//! 1. **Prologue**: the sender exists and has not delegated its signer, the
//!    pre-image authenticates it, it can cover the maximum fee in the fee
//!    token, and the claimed sequence number is exactly the stored one.
//! 2. **Epilogue**: gas accounting is consistent and the sender can pay the
//!    fee; then the sequence number is bumped, a first-use key is bound and
//!    the fee moves to the fee pool.
//!
//! [`TransactionSession`] strings the two together around a body.

#![deny(unsafe_code)]

pub mod config;
pub mod lifecycle;
pub mod session;

pub use config::{ConfigError, LifecycleConfig};
pub use lifecycle::{Settlement, TransactionLifecycle, TransactionParams};
pub use session::{Receipt, TransactionSession};
