use serde::{Deserialize, Serialize};
use tally_types::{AccountAddress, AuthenticationKey, EventHandle, EventStream, TokenCode};

use crate::capability::{KeyRotationCapability, WithdrawCapability};

/// The one persistent record per address.
///
/// Capability slots are `None` only while the capability is held elsewhere
/// (extracted) or, for key rotation, after it was destroyed by signer
/// delegation.
#[derive(Debug, Serialize)]
pub struct AccountRecord {
    pub(crate) address: AccountAddress,
    pub(crate) authentication_key: AuthenticationKey,
    pub(crate) sequence_number: u64,
    pub(crate) withdraw_capability: Option<WithdrawCapability>,
    pub(crate) key_rotation_capability: Option<KeyRotationCapability>,
    pub(crate) withdraw_events: EventHandle,
    pub(crate) deposit_events: EventHandle,
    pub(crate) accept_token_events: EventHandle,
}

impl AccountRecord {
    /// Fresh record: sentinel key, sequence 0, both capabilities present.
    pub(crate) fn new(address: AccountAddress) -> Self {
        Self {
            address,
            authentication_key: AuthenticationKey::ZERO,
            sequence_number: 0,
            withdraw_capability: Some(WithdrawCapability::new(address)),
            key_rotation_capability: Some(KeyRotationCapability::new(address)),
            withdraw_events: EventHandle::new(address, EventStream::Withdraw),
            deposit_events: EventHandle::new(address, EventStream::Deposit),
            accept_token_events: EventHandle::new(address, EventStream::AcceptToken),
        }
    }

    pub fn address(&self) -> AccountAddress {
        self.address
    }

    pub fn authentication_key(&self) -> &AuthenticationKey {
        &self.authentication_key
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn has_withdraw_capability(&self) -> bool {
        self.withdraw_capability.is_some()
    }

    pub fn has_key_rotation_capability(&self) -> bool {
        self.key_rotation_capability.is_some()
    }

    pub fn event_handle(&self, stream: EventStream) -> &EventHandle {
        match stream {
            EventStream::Withdraw => &self.withdraw_events,
            EventStream::Deposit => &self.deposit_events,
            EventStream::AcceptToken => &self.accept_token_events,
        }
    }

    pub(crate) fn event_handle_mut(&mut self, stream: EventStream) -> &mut EventHandle {
        match stream {
            EventStream::Withdraw => &mut self.withdraw_events,
            EventStream::Deposit => &mut self.deposit_events,
            EventStream::AcceptToken => &mut self.accept_token_events,
        }
    }

    /// Copy for checkpoints. The copy's capabilities are never handed out.
    pub(crate) fn fork(&self) -> Self {
        Self {
            address: self.address,
            authentication_key: self.authentication_key,
            sequence_number: self.sequence_number,
            withdraw_capability: self.withdraw_capability.as_ref().map(WithdrawCapability::fork),
            key_rotation_capability: self
                .key_rotation_capability
                .as_ref()
                .map(KeyRotationCapability::fork),
            withdraw_events: self.withdraw_events.clone(),
            deposit_events: self.deposit_events.clone(),
            accept_token_events: self.accept_token_events.clone(),
        }
    }
}

/// Amount of one token held by one address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub amount: u128,
}

/// Read-only snapshot of everything the ledger knows about an address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountView {
    pub address: AccountAddress,
    pub authentication_key: AuthenticationKey,
    pub sequence_number: u64,
    pub withdraw_capability_delegated: bool,
    pub key_rotation_capability_delegated: bool,
    pub signer_delegated: bool,
    pub auto_accept_token: bool,
    pub balances: Vec<BalanceView>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceView {
    pub token: TokenCode,
    pub amount: u128,
}
