//! Account creation and authentication-key management.

use tally_types::{AccountAddress, AuthKeyScheme, AuthenticationKey, Stc, TokenType, TypesError};
use tracing::{debug, info};

use crate::capability::{KeyRotationCapability, SignerCapability};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::record::AccountRecord;
use crate::signer::Signer;
use crate::store::LedgerStore;

fn parse_key(new_key: &[u8]) -> LedgerResult<AuthenticationKey> {
    AuthenticationKey::from_slice(new_key).map_err(|e| match e {
        TypesError::InvalidKeyLength { actual, .. } => LedgerError::MalformedKey { length: actual },
        other => LedgerError::InvariantViolation(other.to_string()),
    })
}

impl<S: LedgerStore> Ledger<S> {
    /// Install a fresh Account Record: sentinel key, sequence 0, both
    /// capabilities present, auto-accept enabled.
    fn make_account(&mut self, address: AccountAddress) -> LedgerResult<()> {
        if self.exists_at(address) {
            return Err(LedgerError::DuplicateAccount(address));
        }
        self.store_mut().insert_account(AccountRecord::new(address))?;
        self.store_mut().set_auto_accept(address, true);
        info!(address = %address, "Account created");
        Ok(())
    }

    /// Create an account during genesis. Only the runtime identity may call
    /// this; the new account's signer is returned so genesis can configure it.
    pub fn create_genesis_account(
        &mut self,
        runtime: &Signer,
        new_address: AccountAddress,
    ) -> LedgerResult<Signer> {
        self.ensure_runtime(runtime)?;
        self.make_account(new_address)?;
        Ok(Signer::issued(new_address, self.issue_stamp()))
    }

    /// Create an account at `fresh_address` that accepts `T` and the native
    /// fee token.
    pub fn create_account_with_address<T: TokenType>(
        &mut self,
        fresh_address: AccountAddress,
    ) -> LedgerResult<()> {
        self.make_account(fresh_address)?;
        let signer = Signer::new(fresh_address);
        self.do_accept_token::<T>(&signer)?;
        if T::token_code() != Stc::token_code() {
            self.do_accept_token::<Stc>(&signer)?;
        }
        Ok(())
    }

    /// Create `fresh_address` and fund it with `initial_amount` of `T` from `funder`.
    pub fn create_account_with_initial_amount<T: TokenType>(
        &mut self,
        funder: &Signer,
        fresh_address: AccountAddress,
        initial_amount: u128,
    ) -> LedgerResult<()> {
        if self.exists_at(fresh_address) {
            return Err(LedgerError::DuplicateAccount(fresh_address));
        }
        let funder_address = self.authorize(funder)?;
        self.ensure_can_withdraw::<T>(funder_address, initial_amount, true)?;

        self.create_account_with_address::<T>(fresh_address)?;
        if initial_amount > 0 {
            self.pay_from::<T>(funder, fresh_address, initial_amount)?;
        }
        Ok(())
    }

    /// Create an account whose address is derived from `sender`'s state and
    /// whose signer is immediately delegated to the returned capability.
    pub fn create_delegate_account(
        &mut self,
        sender: &Signer,
        scheme: &dyn AuthKeyScheme,
    ) -> LedgerResult<(AccountAddress, SignerCapability)> {
        let sender_address = self.authorize(sender)?;
        let sequence_number = self.sequence_number(sender_address)?;
        let native_balance = self.balance::<Stc>(sender_address);

        let mut seed = Vec::with_capacity(AccountAddress::LENGTH + 8 + 16);
        seed.extend_from_slice(sender_address.as_bytes());
        seed.extend_from_slice(&sequence_number.to_le_bytes());
        seed.extend_from_slice(&native_balance.to_le_bytes());
        let new_address = scheme.derive_address(&scheme.hash_preimage(&seed));

        self.create_account_with_address::<Stc>(new_address)?;
        let new_signer = Signer::new(new_address);
        let cap = self.remove_signer_capability(&new_signer)?;
        info!(
            sender = %sender_address,
            delegate = %new_address,
            "Delegate account created"
        );
        Ok((new_address, cap))
    }

    // ── Authentication key rotation ────────────────────────────────────

    /// Rotate the signer's own key: extract the rotation capability, rotate,
    /// and put the capability back.
    pub fn rotate_authentication_key(&mut self, signer: &Signer, new_key: &[u8]) -> LedgerResult<()> {
        let key = parse_key(new_key)?;
        let cap = self.extract_key_rotation_capability(signer)?;
        self.rotate_authentication_key_unchecked(&cap, key)?;
        self.restore_key_rotation_capability(cap)
    }

    /// Overwrite the key of `cap`'s account. The old value is irrelevant.
    pub fn rotate_authentication_key_with_capability(
        &mut self,
        cap: &KeyRotationCapability,
        new_key: &[u8],
    ) -> LedgerResult<()> {
        self.ensure_live_key_rotation_capability(cap)?;
        let key = parse_key(new_key)?;
        self.rotate_authentication_key_unchecked(cap, key)
    }

    pub(crate) fn rotate_authentication_key_unchecked(
        &mut self,
        cap: &KeyRotationCapability,
        key: AuthenticationKey,
    ) -> LedgerResult<()> {
        let address = cap.account_address();
        let record = self.account_mut(address)?;
        record.authentication_key = key;
        debug!(address = %address, key = %key, "Authentication key rotated");
        Ok(())
    }

    // ── Transaction settlement (runtime only) ─────────────────────────

    /// Replace the sentinel key with `key` on an account's first successful
    /// transaction. Keys that are already bound are left alone.
    pub fn bind_authentication_key(
        &mut self,
        runtime: &Signer,
        address: AccountAddress,
        key: AuthenticationKey,
    ) -> LedgerResult<()> {
        self.ensure_runtime(runtime)?;
        let record = self.account_mut(address)?;
        if record.authentication_key.is_zero() {
            record.authentication_key = key;
            info!(address = %address, key = %key, "Authentication key bound");
        }
        Ok(())
    }

    /// Set the sequence number to `claimed + 1`.
    pub fn increment_sequence_number(
        &mut self,
        runtime: &Signer,
        address: AccountAddress,
        claimed: u64,
    ) -> LedgerResult<()> {
        self.ensure_runtime(runtime)?;
        let next = claimed
            .checked_add(1)
            .ok_or(LedgerError::SequenceOverflow(claimed))?;
        self.account_mut(address)?.sequence_number = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MintCapability;
    use tally_types::Blake3AuthScheme;

    fn addr(s: &str) -> AccountAddress {
        s.parse().unwrap()
    }

    #[test]
    fn create_installs_fresh_record() {
        let mut ledger = Ledger::in_memory();
        ledger.create_account_with_address::<Stc>(addr("0xa")).unwrap();

        let view = ledger.account_view(addr("0xa")).unwrap();
        assert!(view.authentication_key.is_zero());
        assert_eq!(view.sequence_number, 0);
        assert!(!view.withdraw_capability_delegated);
        assert!(!view.key_rotation_capability_delegated);
        assert!(!view.signer_delegated);
        assert!(view.auto_accept_token);
        assert_eq!(view.balances.len(), 1);
    }

    #[test]
    fn duplicate_creation_fails() {
        let mut ledger = Ledger::in_memory();
        ledger.create_account_with_address::<Stc>(addr("0xa")).unwrap();
        assert_eq!(
            ledger.create_account_with_address::<Stc>(addr("0xa")),
            Err(LedgerError::DuplicateAccount(addr("0xa")))
        );
        assert_eq!(ledger.account_views().len(), 1);
    }

    #[test]
    fn genesis_creation_requires_runtime() {
        let mut ledger = Ledger::in_memory();
        let stranger = Signer::new(addr("0x2"));
        assert!(matches!(
            ledger.create_genesis_account(&stranger, addr("0x3")),
            Err(LedgerError::NotAuthorized { .. })
        ));

        let signer = ledger
            .create_genesis_account(&Signer::runtime(None), AccountAddress::RUNTIME)
            .unwrap();
        assert_eq!(signer.address(), AccountAddress::RUNTIME);
        assert!(ledger.exists_at(AccountAddress::RUNTIME));
    }

    #[test]
    fn rotate_requires_32_bytes() {
        let mut ledger = Ledger::in_memory();
        ledger.create_account_with_address::<Stc>(addr("0xa")).unwrap();
        let alice = Signer::new(addr("0xa"));

        assert_eq!(
            ledger.rotate_authentication_key(&alice, &[1u8; 31]),
            Err(LedgerError::MalformedKey { length: 31 })
        );
        // A rejected key leaves the capability in place.
        assert!(!ledger.delegated_key_rotation_capability(addr("0xa")).unwrap());

        ledger.rotate_authentication_key(&alice, &[9u8; 32]).unwrap();
        assert_eq!(
            ledger.authentication_key(addr("0xa")).unwrap(),
            AuthenticationKey::new([9u8; 32])
        );
        ledger.rotate_authentication_key(&alice, &[8u8; 32]).unwrap();
        assert_eq!(
            ledger.authentication_key(addr("0xa")).unwrap(),
            AuthenticationKey::new([8u8; 32])
        );
    }

    #[test]
    fn rotate_with_held_capability() {
        let mut ledger = Ledger::in_memory();
        ledger.create_account_with_address::<Stc>(addr("0xa")).unwrap();
        let alice = Signer::new(addr("0xa"));
        let cap = ledger.extract_key_rotation_capability(&alice).unwrap();

        ledger
            .rotate_authentication_key_with_capability(&cap, &[3u8; 32])
            .unwrap();
        assert!(ledger
            .rotate_authentication_key_with_capability(&cap, &[3u8; 33])
            .is_err());
        // The plain path needs the capability in its slot.
        assert!(ledger.rotate_authentication_key(&alice, &[4u8; 32]).is_err());

        ledger.restore_key_rotation_capability(cap).unwrap();
        assert_eq!(
            ledger.authentication_key(addr("0xa")).unwrap(),
            AuthenticationKey::new([3u8; 32])
        );
    }

    #[test]
    fn initial_amount_funds_fresh_account() {
        let mut ledger = Ledger::in_memory();
        let runtime = Signer::runtime(None);
        ledger
            .create_genesis_account(&runtime, AccountAddress::RUNTIME)
            .unwrap();
        let minted = MintCapability::<Stc>::issue(&runtime)
            .unwrap()
            .mint(1_000)
            .unwrap();
        ledger.deposit(AccountAddress::RUNTIME, minted).unwrap();

        ledger
            .create_account_with_initial_amount::<Stc>(&runtime, addr("0xf"), 250)
            .unwrap();
        assert_eq!(ledger.balance::<Stc>(addr("0xf")), 250);
        assert_eq!(ledger.balance::<Stc>(AccountAddress::RUNTIME), 750);

        // An unfunded request creates nothing.
        assert!(matches!(
            ledger.create_account_with_initial_amount::<Stc>(&runtime, addr("0xe"), 10_000),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert!(!ledger.exists_at(addr("0xe")));
    }

    #[test]
    fn delegate_account_is_contract_controlled() {
        let mut ledger = Ledger::in_memory();
        ledger.create_account_with_address::<Stc>(addr("0xa")).unwrap();
        let alice = Signer::new(addr("0xa"));

        let (delegate, cap) = ledger
            .create_delegate_account(&alice, &Blake3AuthScheme)
            .unwrap();
        assert_eq!(cap.address(), delegate);
        assert!(ledger.is_signer_delegated(delegate));
        assert_eq!(
            ledger.authentication_key(delegate).unwrap(),
            AuthenticationKey::CONTRACT_CONTROLLED
        );

        // Same sender state derives the same address.
        assert_eq!(
            ledger
                .create_delegate_account(&alice, &Blake3AuthScheme)
                .unwrap_err(),
            LedgerError::DuplicateAccount(delegate)
        );
    }

    #[test]
    fn settlement_is_runtime_only() {
        let mut ledger = Ledger::in_memory();
        ledger.create_account_with_address::<Stc>(addr("0xa")).unwrap();
        let alice = Signer::new(addr("0xa"));
        let key = AuthenticationKey::new([5u8; 32]);

        assert!(ledger.bind_authentication_key(&alice, addr("0xa"), key).is_err());
        assert!(ledger.increment_sequence_number(&alice, addr("0xa"), 0).is_err());

        let runtime = Signer::runtime(None);
        ledger.bind_authentication_key(&runtime, addr("0xa"), key).unwrap();
        ledger
            .bind_authentication_key(&runtime, addr("0xa"), AuthenticationKey::new([6u8; 32]))
            .unwrap();
        assert_eq!(ledger.authentication_key(addr("0xa")).unwrap(), key);

        ledger.increment_sequence_number(&runtime, addr("0xa"), 0).unwrap();
        assert_eq!(ledger.sequence_number(addr("0xa")).unwrap(), 1);
        assert_eq!(
            ledger.increment_sequence_number(&runtime, addr("0xa"), u64::MAX),
            Err(LedgerError::SequenceOverflow(u64::MAX))
        );
    }
}
