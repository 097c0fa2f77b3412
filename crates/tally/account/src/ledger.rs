use std::collections::BTreeMap;

use tally_types::{AccountAddress, AuthenticationKey, EventRecord, LedgerEvent, TokenType};
use tracing::{debug, info};

use crate::error::{LedgerError, LedgerResult};
use crate::memory::InMemoryLedgerStore;
use crate::record::{AccountRecord, AccountView, BalanceView};
use crate::signer::Signer;
use crate::store::{Checkpointable, LedgerStore};

/// The account ledger.
///
/// Owns the host's storage slots for the duration of a transaction. Every
/// mutating operation takes `&mut self`, so accesses are serialized by the
/// borrow checker, and every operation validates all of its preconditions
/// before its first write.
///
/// Tokens, capabilities and signers handed out inside an
/// [`atomically`](Ledger::atomically) section remember the section. When the
/// section rolls back, those values are revoked and every operation refuses
/// them with `RolledBack`.
pub struct Ledger<S: LedgerStore = InMemoryLedgerStore> {
    store: S,
    runtime_issued: bool,
    /// Open sections, innermost last.
    sections: Vec<u64>,
    next_section: u64,
    /// Rolled-back section ids as `start -> end` (exclusive) ranges.
    revoked: BTreeMap<u64, u64>,
}

impl Ledger<InMemoryLedgerStore> {
    /// Create a ledger backed by a fresh in-memory store.
    pub fn in_memory() -> Self {
        Self::new(InMemoryLedgerStore::new())
    }
}

impl Default for Ledger<InMemoryLedgerStore> {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            runtime_issued: false,
            sections: Vec::new(),
            next_section: 0,
            revoked: BTreeMap::new(),
        }
    }

    /// Read access to the underlying store. Writes go through ledger operations only.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // ── Signers ────────────────────────────────────────────────────────

    /// Hand the runtime signer to the host. Only the first call succeeds.
    pub fn runtime_signer(&mut self) -> LedgerResult<Signer> {
        if self.runtime_issued {
            return Err(LedgerError::RuntimeSignerIssued);
        }
        self.runtime_issued = true;
        info!("Runtime signer issued");
        Ok(Signer::runtime(self.issue_stamp()))
    }

    /// Mint the signer a transaction body runs as. Runtime only; refused for
    /// delegated addresses, which are reachable only through their
    /// `SignerCapability`.
    pub fn transaction_signer(&self, runtime: &Signer, address: AccountAddress) -> LedgerResult<Signer> {
        self.ensure_runtime(runtime)?;
        self.account(address)?;
        if self.store.is_signer_delegated(&address) {
            return Err(LedgerError::SignerDelegated(address));
        }
        Ok(Signer::issued(address, self.issue_stamp()))
    }

    /// Fail with `NotAuthorized` unless `signer` is this ledger's live runtime signer.
    pub fn ensure_runtime(&self, signer: &Signer) -> LedgerResult<()> {
        self.ensure_live(signer.issued_in(), "signer")?;
        if !signer.is_runtime() {
            return Err(LedgerError::NotAuthorized {
                expected: AccountAddress::RUNTIME,
                actual: signer.address(),
            });
        }
        Ok(())
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn exists_at(&self, address: AccountAddress) -> bool {
        self.store.account(&address).is_some()
    }

    pub fn account(&self, address: AccountAddress) -> LedgerResult<&AccountRecord> {
        self.store
            .account(&address)
            .ok_or(LedgerError::AccountMissing(address))
    }

    pub fn sequence_number(&self, address: AccountAddress) -> LedgerResult<u64> {
        Ok(self.account(address)?.sequence_number)
    }

    pub fn authentication_key(&self, address: AccountAddress) -> LedgerResult<AuthenticationKey> {
        Ok(self.account(address)?.authentication_key)
    }

    /// Balance of `T` at `address`; zero when no balance store exists.
    pub fn balance<T: TokenType>(&self, address: AccountAddress) -> u128 {
        self.store
            .balance(&address, &T::token_code())
            .map(|b| b.amount)
            .unwrap_or(0)
    }

    /// The event journal, oldest first.
    pub fn events(&self) -> &[EventRecord] {
        self.store.events()
    }

    pub fn account_view(&self, address: AccountAddress) -> LedgerResult<AccountView> {
        let record = self.account(address)?;
        Ok(AccountView {
            address,
            authentication_key: record.authentication_key,
            sequence_number: record.sequence_number,
            withdraw_capability_delegated: record.withdraw_capability.is_none(),
            key_rotation_capability_delegated: record.key_rotation_capability.is_none(),
            signer_delegated: self.store.is_signer_delegated(&address),
            auto_accept_token: self.can_auto_accept_token(address),
            balances: self
                .store
                .balances_of(&address)
                .into_iter()
                .map(|(token, amount)| BalanceView { token, amount })
                .collect(),
        })
    }

    pub fn account_views(&self) -> Vec<AccountView> {
        self.store
            .addresses()
            .into_iter()
            .filter_map(|address| self.account_view(address).ok())
            .collect()
    }

    // ── Internal helpers ───────────────────────────────────────────────

    /// Address of a live `signer`.
    pub(crate) fn authorize(&self, signer: &Signer) -> LedgerResult<AccountAddress> {
        self.ensure_live(signer.issued_in(), "signer")?;
        Ok(signer.address())
    }

    /// Section that values issued now belong to; `None` outside any section.
    pub(crate) fn issue_stamp(&self) -> Option<u64> {
        self.sections.last().copied()
    }

    pub(crate) fn ensure_live(&self, issued_in: Option<u64>, what: &'static str) -> LedgerResult<()> {
        match issued_in {
            Some(section) if self.is_revoked(section) => Err(LedgerError::RolledBack { what }),
            _ => Ok(()),
        }
    }

    fn is_revoked(&self, section: u64) -> bool {
        self.revoked
            .range(..=section)
            .next_back()
            .is_some_and(|(_, end)| section < *end)
    }

    /// Revoke `first` and every section opened inside it.
    fn revoke_from(&mut self, first: u64) {
        // Ranges starting at or after `first` were opened inside it.
        drop(self.revoked.split_off(&first));
        self.revoked.insert(first, self.next_section);
    }

    pub(crate) fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub(crate) fn account_mut(&mut self, address: AccountAddress) -> LedgerResult<&mut AccountRecord> {
        self.store
            .account_mut(&address)
            .ok_or(LedgerError::AccountMissing(address))
    }

    /// Append `event` to the matching stream of `address`.
    ///
    /// Callers have already checked that the account exists.
    pub(crate) fn emit(&mut self, address: AccountAddress, event: LedgerEvent) -> LedgerResult<()> {
        let handle = self.account_mut(address)?.event_handle_mut(event.stream());
        let key = handle.key();
        let sequence_number = handle.next_sequence();
        debug!(
            address = %address,
            stream = ?key.stream,
            sequence_number,
            "Event emitted"
        );
        self.store.append_event(EventRecord {
            key,
            sequence_number,
            event,
        });
        Ok(())
    }
}

impl<S: LedgerStore + Checkpointable> Ledger<S> {
    /// Run `body` with all-or-nothing semantics: if it fails, every write it
    /// made is rolled back before the error is returned.
    ///
    /// Tokens, capabilities and signers the body obtained from the ledger are
    /// revoked along with the writes, so a failed body cannot smuggle value
    /// out. Values moved into a failed body are gone.
    pub fn atomically<R, E>(&mut self, body: impl FnOnce(&mut Self) -> Result<R, E>) -> Result<R, E> {
        let section = self.next_section;
        self.next_section += 1;
        self.sections.push(section);
        let checkpoint = self.store.checkpoint();

        let result = body(self);
        self.sections.pop();
        if result.is_err() {
            self.store.rollback(checkpoint);
            self.revoke_from(section);
            debug!(section, "Ledger rolled back to checkpoint");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{MintCapability, Token};
    use tally_types::Stc;

    fn addr(s: &str) -> AccountAddress {
        s.parse().unwrap()
    }

    fn abort() -> LedgerError {
        LedgerError::InvariantViolation("abort".into())
    }

    /// Ledger with 0xa holding 100 STC and an empty 0xb.
    fn setup() -> (Ledger, Signer, Signer) {
        let mut ledger = Ledger::in_memory();
        let runtime = ledger.runtime_signer().unwrap();
        ledger.create_account_with_address::<Stc>(addr("0xa")).unwrap();
        ledger.create_account_with_address::<Stc>(addr("0xb")).unwrap();
        let minted = MintCapability::<Stc>::issue(&runtime)
            .unwrap()
            .mint(100)
            .unwrap();
        ledger.deposit(addr("0xa"), minted).unwrap();
        let alice = ledger.transaction_signer(&runtime, addr("0xa")).unwrap();
        (ledger, runtime, alice)
    }

    #[test]
    fn runtime_signer_is_issued_once() {
        let mut ledger = Ledger::in_memory();
        let runtime = ledger.runtime_signer().unwrap();
        assert!(runtime.is_runtime());
        assert_eq!(runtime.address(), AccountAddress::RUNTIME);
        assert_eq!(ledger.runtime_signer().unwrap_err(), LedgerError::RuntimeSignerIssued);
    }

    #[test]
    fn transaction_signers_are_runtime_only() {
        let (ledger, runtime, alice) = setup();
        assert!(!alice.is_runtime());
        assert!(matches!(
            ledger.transaction_signer(&alice, addr("0xb")),
            Err(LedgerError::NotAuthorized { .. })
        ));
        assert_eq!(
            ledger.transaction_signer(&runtime, addr("0x404")).unwrap_err(),
            LedgerError::AccountMissing(addr("0x404"))
        );
        // A signer for the runtime address is not the runtime identity.
        assert!(ledger.ensure_runtime(&alice).is_err());
        ledger.ensure_runtime(&runtime).unwrap();
    }

    #[test]
    fn delegated_address_is_reachable_only_through_its_capability() {
        let (mut ledger, runtime, alice) = setup();
        let cap = ledger.remove_signer_capability(&alice).unwrap();

        assert_eq!(
            ledger.transaction_signer(&runtime, addr("0xa")).unwrap_err(),
            LedgerError::SignerDelegated(addr("0xa"))
        );
        let delegate = ledger.create_signer_with_cap(&cap).unwrap();
        ledger.pay_from::<Stc>(&delegate, addr("0xb"), 10).unwrap();
        assert_eq!(ledger.balance::<Stc>(addr("0xb")), 10);
    }

    #[test]
    fn failed_body_cannot_smuggle_token_or_capability_out() {
        let (mut ledger, _runtime, alice) = setup();
        let mut stash: Option<Token<Stc>> = None;
        let mut cap_stash = None;

        let result: LedgerResult<()> = ledger.atomically(|l| {
            stash = Some(l.withdraw::<Stc>(&alice, 100)?);
            cap_stash = Some(l.extract_withdraw_capability(&alice)?);
            Err(abort())
        });
        assert_eq!(result, Err(abort()));
        assert_eq!(ledger.balance::<Stc>(addr("0xa")), 100);

        let token = stash.unwrap();
        assert_eq!(
            ledger.deposit(addr("0xb"), token),
            Err(LedgerError::RolledBack { what: "token" })
        );
        assert_eq!(ledger.balance::<Stc>(addr("0xb")), 0);

        let stale_cap = cap_stash.unwrap();
        assert_eq!(
            ledger.withdraw_with_capability::<Stc>(&stale_cap, 1).unwrap_err(),
            LedgerError::RolledBack {
                what: "withdraw capability"
            }
        );
        // The slot was restored, so exactly one live capability exists.
        let live_cap = ledger.extract_withdraw_capability(&alice).unwrap();
        assert_eq!(
            ledger.restore_withdraw_capability(stale_cap),
            Err(LedgerError::RolledBack {
                what: "withdraw capability"
            })
        );
        ledger.restore_withdraw_capability(live_cap).unwrap();

        let supply = ledger.balance::<Stc>(addr("0xa")) + ledger.balance::<Stc>(addr("0xb"));
        assert_eq!(supply, 100);
    }

    #[test]
    fn merging_keeps_a_revoked_token_revoked() {
        let (mut ledger, _runtime, alice) = setup();
        let mut stash: Option<Token<Stc>> = None;
        let _ = ledger.atomically(|l| -> LedgerResult<()> {
            stash = Some(l.withdraw::<Stc>(&alice, 40)?);
            Err(abort())
        });

        let mut fresh = ledger.withdraw::<Stc>(&alice, 10).unwrap();
        fresh.merge(stash.unwrap()).unwrap();
        let part = fresh.split(5).unwrap();
        assert!(matches!(
            ledger.deposit(addr("0xb"), part),
            Err(LedgerError::RolledBack { .. })
        ));
        assert!(matches!(
            ledger.pay_fee(fresh),
            Err(LedgerError::RolledBack { .. })
        ));
        assert_eq!(ledger.fee_pool_balance::<Stc>(), 0);
    }

    #[test]
    fn committed_sections_hand_out_live_values() {
        let (mut ledger, _runtime, alice) = setup();
        let token = ledger
            .atomically(|l| l.withdraw::<Stc>(&alice, 30))
            .unwrap();
        ledger.deposit(addr("0xb"), token).unwrap();
        assert_eq!(ledger.balance::<Stc>(addr("0xb")), 30);
    }

    #[test]
    fn outer_rollback_revokes_nested_sections() {
        let (mut ledger, _runtime, alice) = setup();
        let mut kept: Option<Token<Stc>> = None;
        let mut lost: Option<Token<Stc>> = None;

        ledger
            .atomically(|l| -> LedgerResult<()> {
                kept = Some(l.withdraw::<Stc>(&alice, 10)?);
                let inner: LedgerResult<()> = l.atomically(|l| {
                    lost = Some(l.withdraw::<Stc>(&alice, 5)?);
                    Err(abort())
                });
                assert!(inner.is_err());
                Ok(())
            })
            .unwrap();
        assert_eq!(ledger.balance::<Stc>(addr("0xa")), 90);
        ledger.deposit(addr("0xb"), kept.unwrap()).unwrap();
        assert!(ledger.deposit(addr("0xb"), lost.unwrap()).is_err());

        let mut inner_token: Option<Token<Stc>> = None;
        let _ = ledger.atomically(|l| -> LedgerResult<()> {
            l.atomically(|l| -> LedgerResult<()> {
                inner_token = Some(l.withdraw::<Stc>(&alice, 5)?);
                Ok(())
            })?;
            Err(abort())
        });
        assert!(matches!(
            ledger.deposit(addr("0xb"), inner_token.unwrap()),
            Err(LedgerError::RolledBack { .. })
        ));
        assert_eq!(ledger.balance::<Stc>(addr("0xa")), 90);
        assert_eq!(ledger.balance::<Stc>(addr("0xb")), 10);
    }

    #[test]
    fn signers_from_a_failed_body_are_revoked() {
        let (mut ledger, _runtime, alice) = setup();
        let mut signer_stash = None;
        let mut cap_stash = None;
        let _ = ledger.atomically(|l| -> LedgerResult<()> {
            let cap = l.remove_signer_capability(&alice)?;
            signer_stash = Some(l.create_signer_with_cap(&cap)?);
            cap_stash = Some(cap);
            Err(abort())
        });
        assert!(!ledger.is_signer_delegated(addr("0xa")));

        let stale = signer_stash.unwrap();
        assert_eq!(
            ledger.pay_from::<Stc>(&stale, addr("0xb"), 1),
            Err(LedgerError::RolledBack { what: "signer" })
        );
        assert_eq!(
            ledger.create_signer_with_cap(&cap_stash.unwrap()).unwrap_err(),
            LedgerError::RolledBack {
                what: "signer capability"
            }
        );
        ledger.pay_from::<Stc>(&alice, addr("0xb"), 1).unwrap();
    }
}
