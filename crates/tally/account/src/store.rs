use tally_types::{AccountAddress, EventRecord, TokenCode};
use thiserror::Error;

use crate::record::{AccountRecord, BalanceRecord};

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage-layer errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Per-address storage slots owned by the host.
///
/// Slots are insert-if-absent and mutate-in-place; nothing is ever deleted.
/// The ledger re-reads every slot at the start of each operation and never
/// caches values across calls.
pub trait LedgerStore {
    fn account(&self, address: &AccountAddress) -> Option<&AccountRecord>;

    fn account_mut(&mut self, address: &AccountAddress) -> Option<&mut AccountRecord>;

    /// Insert a new account record; fails with `Conflict` if one exists.
    fn insert_account(&mut self, record: AccountRecord) -> StorageResult<()>;

    /// All addresses holding an account record, in ascending order.
    fn addresses(&self) -> Vec<AccountAddress>;

    fn balance(&self, address: &AccountAddress, token: &TokenCode) -> Option<&BalanceRecord>;

    fn balance_mut(
        &mut self,
        address: &AccountAddress,
        token: &TokenCode,
    ) -> Option<&mut BalanceRecord>;

    /// Insert a new balance store; fails with `Conflict` if one exists.
    fn insert_balance(
        &mut self,
        address: AccountAddress,
        token: TokenCode,
        record: BalanceRecord,
    ) -> StorageResult<()>;

    /// Every balance store held by `address`, ordered by token code.
    fn balances_of(&self, address: &AccountAddress) -> Vec<(TokenCode, u128)>;

    /// Auto-accept flag; `None` when never written.
    fn auto_accept(&self, address: &AccountAddress) -> Option<bool>;

    fn set_auto_accept(&mut self, address: AccountAddress, enable: bool);

    fn is_signer_delegated(&self, address: &AccountAddress) -> bool;

    /// Set the one-way delegation marker. There is no inverse.
    fn mark_signer_delegated(&mut self, address: AccountAddress);

    /// Accumulated, undistributed transaction fees of one token.
    fn fee_pool(&self, token: &TokenCode) -> u128;

    fn set_fee_pool(&mut self, token: TokenCode, amount: u128);

    fn append_event(&mut self, record: EventRecord);

    fn events(&self) -> &[EventRecord];
}

/// Stores that can snapshot themselves, giving hosts all-or-nothing
/// semantics around a transaction body.
pub trait Checkpointable {
    type Checkpoint;

    fn checkpoint(&self) -> Self::Checkpoint;

    fn rollback(&mut self, checkpoint: Self::Checkpoint);
}
