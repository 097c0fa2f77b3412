use serde::{Deserialize, Serialize};

use crate::address::AccountAddress;
use crate::token::TokenCode;

/// Which of an account's event streams a record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStream {
    Withdraw,
    Deposit,
    AcceptToken,
}

/// Globally unique key of one event stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventKey {
    pub address: AccountAddress,
    pub stream: EventStream,
}

/// Append-only handle; `counter` is the number of events emitted so far and
/// therefore the sequence number of the next one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHandle {
    key: EventKey,
    counter: u64,
}

impl EventHandle {
    pub fn new(address: AccountAddress, stream: EventStream) -> Self {
        Self {
            key: EventKey { address, stream },
            counter: 0,
        }
    }

    pub fn key(&self) -> EventKey {
        self.key
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Reserve the next sequence number on this stream.
    pub fn next_sequence(&mut self) -> u64 {
        let seq = self.counter;
        self.counter += 1;
        seq
    }
}

/// Emitted when tokens leave an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawEvent {
    pub amount: u128,
    pub token_code: TokenCode,
    pub metadata: Vec<u8>,
}

/// Emitted when tokens arrive in an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub amount: u128,
    pub token_code: TokenCode,
    pub metadata: Vec<u8>,
}

/// Emitted when an account opts in to a token type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptTokenEvent {
    pub token_code: TokenCode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    Withdraw(WithdrawEvent),
    Deposit(DepositEvent),
    AcceptToken(AcceptTokenEvent),
}

impl LedgerEvent {
    pub fn stream(&self) -> EventStream {
        match self {
            LedgerEvent::Withdraw(_) => EventStream::Withdraw,
            LedgerEvent::Deposit(_) => EventStream::Deposit,
            LedgerEvent::AcceptToken(_) => EventStream::AcceptToken,
        }
    }
}

/// One entry of the ledger's event journal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub key: EventKey,
    pub sequence_number: u64,
    pub event: LedgerEvent,
}
