use crate::address::AccountAddress;
use crate::auth_key::AuthenticationKey;

/// Hash/derive collaborator consumed by the transaction prologue and epilogue.
///
/// Both functions must be pure and total: the same input always yields the
/// same output and no input is rejected.
pub trait AuthKeyScheme: Send + Sync {
    /// Hash an authentication pre-image (typically a public key) into a key.
    fn hash_preimage(&self, preimage: &[u8]) -> AuthenticationKey;

    /// Derive the account address owned by a key.
    fn derive_address(&self, key: &AuthenticationKey) -> AccountAddress;
}

/// Reference scheme: BLAKE3 with a domain separation tag; the address is the
/// trailing 16 bytes of the key.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3AuthScheme;

impl Blake3AuthScheme {
    const DOMAIN_TAG: &'static [u8] = b"tally-auth-key-v1:";
}

impl AuthKeyScheme for Blake3AuthScheme {
    fn hash_preimage(&self, preimage: &[u8]) -> AuthenticationKey {
        let mut hasher = blake3::Hasher::new();
        hasher.update(Self::DOMAIN_TAG);
        hasher.update(preimage);
        AuthenticationKey::new(*hasher.finalize().as_bytes())
    }

    fn derive_address(&self, key: &AuthenticationKey) -> AccountAddress {
        let mut bytes = [0u8; AccountAddress::LENGTH];
        bytes.copy_from_slice(&key.as_bytes()[AuthenticationKey::LENGTH - AccountAddress::LENGTH..]);
        AccountAddress::new(bytes)
    }
}
