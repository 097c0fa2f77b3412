//! Capability objects and their lifecycle.
//!
//! Capabilities are linear: not `Clone`, not `Copy`, never deserialized, and
//! only this crate can construct them. At most one live instance exists per
//! address and kind; the Account Record slot being empty is what records
//! that the instance is held elsewhere.

use serde::{Serialize, Serializer};
use tally_types::{AccountAddress, AuthenticationKey};
use tracing::{debug, info};

use crate::error::{CapabilityKind, LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::signer::Signer;
use crate::store::LedgerStore;

const WITHDRAW_TAG: u8 = 0x01;
const KEY_ROTATION_TAG: u8 = 0x02;
const SIGNER_TAG: u8 = 0x03;

fn export_bytes(tag: u8, address: &AccountAddress) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(1 + AccountAddress::LENGTH);
    bytes.push(tag);
    bytes.extend_from_slice(address.as_bytes());
    bytes
}

/// Right to withdraw from `account_address`.
#[derive(Debug, PartialEq, Eq)]
pub struct WithdrawCapability {
    account_address: AccountAddress,
    issued_in: Option<u64>,
}

impl WithdrawCapability {
    pub(crate) fn new(account_address: AccountAddress) -> Self {
        Self {
            account_address,
            issued_in: None,
        }
    }

    pub(crate) fn fork(&self) -> Self {
        Self::new(self.account_address)
    }

    pub fn account_address(&self) -> AccountAddress {
        self.account_address
    }

    /// Export layout: one tag byte followed by the address.
    pub fn to_bytes(&self) -> Vec<u8> {
        export_bytes(WITHDRAW_TAG, &self.account_address)
    }
}

/// Right to rotate the authentication key of `account_address`.
#[derive(Debug, PartialEq, Eq)]
pub struct KeyRotationCapability {
    account_address: AccountAddress,
    issued_in: Option<u64>,
}

impl KeyRotationCapability {
    pub(crate) fn new(account_address: AccountAddress) -> Self {
        Self {
            account_address,
            issued_in: None,
        }
    }

    pub(crate) fn fork(&self) -> Self {
        Self::new(self.account_address)
    }

    pub fn account_address(&self) -> AccountAddress {
        self.account_address
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        export_bytes(KEY_ROTATION_TAG, &self.account_address)
    }
}

/// Right to act as `address` after its signer was delegated.
#[derive(Debug, PartialEq, Eq)]
pub struct SignerCapability {
    address: AccountAddress,
    issued_in: Option<u64>,
}

impl SignerCapability {
    pub fn address(&self) -> AccountAddress {
        self.address
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        export_bytes(SIGNER_TAG, &self.address)
    }
}

macro_rules! serialize_as_export_bytes {
    ($($ty:ty),*) => {
        $(impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_bytes(&self.to_bytes())
            }
        })*
    };
}

serialize_as_export_bytes!(WithdrawCapability, KeyRotationCapability, SignerCapability);

pub fn withdraw_capability_address(cap: &WithdrawCapability) -> AccountAddress {
    cap.account_address
}

pub fn key_rotation_capability_address(cap: &KeyRotationCapability) -> AccountAddress {
    cap.account_address
}

/// Consume a key rotation capability. The account's key can then never be
/// rotated again.
pub fn destroy_key_rotation_capability(cap: KeyRotationCapability) {
    let KeyRotationCapability { account_address, .. } = cap;
    debug!(address = %account_address, "Key rotation capability destroyed");
}

pub fn signer_address(cap: &SignerCapability) -> AccountAddress {
    cap.address
}

/// Consume a signer capability. The address stays delegated, so nobody can
/// act for it afterwards.
pub fn destroy_signer_cap(cap: SignerCapability) {
    let SignerCapability { address, .. } = cap;
    debug!(address = %address, "Signer capability destroyed");
}

impl<S: LedgerStore> Ledger<S> {
    // ── Withdraw capability ────────────────────────────────────────────

    pub fn extract_withdraw_capability(&mut self, signer: &Signer) -> LedgerResult<WithdrawCapability> {
        let address = self.authorize(signer)?;
        let issued_in = self.issue_stamp();
        let record = self.account_mut(address)?;
        let mut cap = record
            .withdraw_capability
            .take()
            .ok_or(LedgerError::CapabilityAlreadyExtracted {
                address,
                kind: CapabilityKind::Withdraw,
            })?;
        cap.issued_in = issued_in;
        debug!(address = %address, "Withdraw capability extracted");
        Ok(cap)
    }

    pub fn restore_withdraw_capability(&mut self, cap: WithdrawCapability) -> LedgerResult<()> {
        self.ensure_live(cap.issued_in, "withdraw capability")?;
        let address = cap.account_address;
        let record = self.account_mut(address)?;
        if record.withdraw_capability.is_some() {
            return Err(LedgerError::CapabilityAlreadyPresent {
                address,
                kind: CapabilityKind::Withdraw,
            });
        }
        record.withdraw_capability = Some(cap);
        debug!(address = %address, "Withdraw capability restored");
        Ok(())
    }

    /// Whether the withdraw capability of `address` is currently held outside the record.
    pub fn delegated_withdraw_capability(&self, address: AccountAddress) -> LedgerResult<bool> {
        Ok(self.account(address)?.withdraw_capability.is_none())
    }

    // ── Key rotation capability ────────────────────────────────────────

    pub fn extract_key_rotation_capability(
        &mut self,
        signer: &Signer,
    ) -> LedgerResult<KeyRotationCapability> {
        let address = self.authorize(signer)?;
        if self.store().is_signer_delegated(&address) {
            return Err(LedgerError::SignerDelegated(address));
        }
        let issued_in = self.issue_stamp();
        let record = self.account_mut(address)?;
        let mut cap = record
            .key_rotation_capability
            .take()
            .ok_or(LedgerError::CapabilityAlreadyExtracted {
                address,
                kind: CapabilityKind::KeyRotation,
            })?;
        cap.issued_in = issued_in;
        debug!(address = %address, "Key rotation capability extracted");
        Ok(cap)
    }

    pub fn restore_key_rotation_capability(&mut self, cap: KeyRotationCapability) -> LedgerResult<()> {
        self.ensure_live(cap.issued_in, "key rotation capability")?;
        let address = cap.account_address;
        let record = self.account_mut(address)?;
        if record.key_rotation_capability.is_some() {
            return Err(LedgerError::CapabilityAlreadyPresent {
                address,
                kind: CapabilityKind::KeyRotation,
            });
        }
        record.key_rotation_capability = Some(cap);
        debug!(address = %address, "Key rotation capability restored");
        Ok(())
    }

    pub fn delegated_key_rotation_capability(&self, address: AccountAddress) -> LedgerResult<bool> {
        Ok(self.account(address)?.key_rotation_capability.is_none())
    }

    // ── Signer capability ──────────────────────────────────────────────

    /// Hand control of the signer's address over to program logic.
    ///
    /// One-way: the authentication key becomes the contract-controlled
    /// placeholder, the key rotation capability is destroyed, and only the
    /// holder of the returned `SignerCapability` can act for the address.
    pub fn remove_signer_capability(&mut self, signer: &Signer) -> LedgerResult<SignerCapability> {
        let address = self.authorize(signer)?;
        if self.store().is_signer_delegated(&address) {
            return Err(LedgerError::SignerDelegated(address));
        }

        // Extraction is the last fallible step; everything after it is a plain write.
        let rotation_cap = self.extract_key_rotation_capability(signer)?;
        self.rotate_authentication_key_unchecked(&rotation_cap, AuthenticationKey::CONTRACT_CONTROLLED)?;
        destroy_key_rotation_capability(rotation_cap);
        self.store_mut().mark_signer_delegated(address);

        info!(address = %address, "Signer capability removed; account is now contract-controlled");
        Ok(SignerCapability {
            address,
            issued_in: self.issue_stamp(),
        })
    }

    /// Act as the delegated address of `cap`.
    pub fn create_signer_with_cap(&self, cap: &SignerCapability) -> LedgerResult<Signer> {
        self.ensure_live(cap.issued_in, "signer capability")?;
        Ok(Signer::issued(cap.address, self.issue_stamp()))
    }

    pub(crate) fn ensure_live_withdraw_capability(&self, cap: &WithdrawCapability) -> LedgerResult<()> {
        self.ensure_live(cap.issued_in, "withdraw capability")
    }

    pub(crate) fn ensure_live_key_rotation_capability(&self, cap: &KeyRotationCapability) -> LedgerResult<()> {
        self.ensure_live(cap.issued_in, "key rotation capability")
    }

    pub fn is_signer_delegated(&self, address: AccountAddress) -> bool {
        self.store().is_signer_delegated(&address)
    }
}
