//! In-memory reference implementation of [`LedgerStore`].
//!
//! Deterministic and test-friendly. Hosts with durable state plug their own
//! store in behind the same trait.

use std::collections::{BTreeMap, HashMap, HashSet};

use tally_types::{AccountAddress, EventRecord, TokenCode};

use crate::record::{AccountRecord, BalanceRecord};
use crate::store::{Checkpointable, LedgerStore, StorageError, StorageResult};

#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    accounts: BTreeMap<AccountAddress, AccountRecord>,
    balances: HashMap<(AccountAddress, TokenCode), BalanceRecord>,
    auto_accept: HashMap<AccountAddress, bool>,
    signer_delegated: HashSet<AccountAddress>,
    fee_pools: HashMap<TokenCode, u128>,
    events: Vec<EventRecord>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn account(&self, address: &AccountAddress) -> Option<&AccountRecord> {
        self.accounts.get(address)
    }

    fn account_mut(&mut self, address: &AccountAddress) -> Option<&mut AccountRecord> {
        self.accounts.get_mut(address)
    }

    fn insert_account(&mut self, record: AccountRecord) -> StorageResult<()> {
        if self.accounts.contains_key(&record.address()) {
            return Err(StorageError::Conflict(format!(
                "account {} already exists",
                record.address()
            )));
        }
        self.accounts.insert(record.address(), record);
        Ok(())
    }

    fn addresses(&self) -> Vec<AccountAddress> {
        self.accounts.keys().copied().collect()
    }

    fn balance(&self, address: &AccountAddress, token: &TokenCode) -> Option<&BalanceRecord> {
        self.balances.get(&(*address, token.clone()))
    }

    fn balance_mut(
        &mut self,
        address: &AccountAddress,
        token: &TokenCode,
    ) -> Option<&mut BalanceRecord> {
        self.balances.get_mut(&(*address, token.clone()))
    }

    fn insert_balance(
        &mut self,
        address: AccountAddress,
        token: TokenCode,
        record: BalanceRecord,
    ) -> StorageResult<()> {
        let key = (address, token);
        if self.balances.contains_key(&key) {
            return Err(StorageError::Conflict(format!(
                "balance store of {} already exists at {}",
                key.1, key.0
            )));
        }
        self.balances.insert(key, record);
        Ok(())
    }

    fn balances_of(&self, address: &AccountAddress) -> Vec<(TokenCode, u128)> {
        let mut held: Vec<(TokenCode, u128)> = self
            .balances
            .iter()
            .filter(|((owner, _), _)| owner == address)
            .map(|((_, token), record)| (token.clone(), record.amount))
            .collect();
        held.sort_by(|a, b| a.0.cmp(&b.0));
        held
    }

    fn auto_accept(&self, address: &AccountAddress) -> Option<bool> {
        self.auto_accept.get(address).copied()
    }

    fn set_auto_accept(&mut self, address: AccountAddress, enable: bool) {
        self.auto_accept.insert(address, enable);
    }

    fn is_signer_delegated(&self, address: &AccountAddress) -> bool {
        self.signer_delegated.contains(address)
    }

    fn mark_signer_delegated(&mut self, address: AccountAddress) {
        self.signer_delegated.insert(address);
    }

    fn fee_pool(&self, token: &TokenCode) -> u128 {
        self.fee_pools.get(token).copied().unwrap_or(0)
    }

    fn set_fee_pool(&mut self, token: TokenCode, amount: u128) {
        self.fee_pools.insert(token, amount);
    }

    fn append_event(&mut self, record: EventRecord) {
        self.events.push(record);
    }

    fn events(&self) -> &[EventRecord] {
        &self.events
    }
}

/// Opaque snapshot of an [`InMemoryLedgerStore`].
pub struct InMemoryCheckpoint {
    accounts: BTreeMap<AccountAddress, AccountRecord>,
    balances: HashMap<(AccountAddress, TokenCode), BalanceRecord>,
    auto_accept: HashMap<AccountAddress, bool>,
    signer_delegated: HashSet<AccountAddress>,
    fee_pools: HashMap<TokenCode, u128>,
    event_count: usize,
}

impl Checkpointable for InMemoryLedgerStore {
    type Checkpoint = InMemoryCheckpoint;

    fn checkpoint(&self) -> InMemoryCheckpoint {
        InMemoryCheckpoint {
            accounts: self
                .accounts
                .iter()
                .map(|(address, record)| (*address, record.fork()))
                .collect(),
            balances: self.balances.clone(),
            auto_accept: self.auto_accept.clone(),
            signer_delegated: self.signer_delegated.clone(),
            fee_pools: self.fee_pools.clone(),
            event_count: self.events.len(),
        }
    }

    fn rollback(&mut self, checkpoint: InMemoryCheckpoint) {
        self.accounts = checkpoint.accounts;
        self.balances = checkpoint.balances;
        self.auto_accept = checkpoint.auto_accept;
        self.signer_delegated = checkpoint.signer_delegated;
        self.fee_pools = checkpoint.fee_pools;
        // The journal is append-only, so truncation restores it exactly.
        self.events.truncate(checkpoint.event_count);
    }
}
