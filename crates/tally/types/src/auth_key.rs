use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypesError;

/// 32-byte value a transaction pre-image must hash to.
///
/// Two reserved values:
/// - [`AuthenticationKey::ZERO`]: "the address is its own key". Every account
///   starts here; the first successful transaction binds the real key.
/// - [`AuthenticationKey::CONTRACT_CONTROLLED`]: installed when the account's
///   signer is delegated. No pre-image hashes to it in practice, so the
///   account can no longer authenticate directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct AuthenticationKey([u8; AuthenticationKey::LENGTH]);

impl AuthenticationKey {
    pub const LENGTH: usize = 32;

    pub const ZERO: Self = Self([0u8; Self::LENGTH]);

    pub const CONTRACT_CONTROLLED: Self = {
        let mut bytes = [0u8; Self::LENGTH];
        bytes[Self::LENGTH - 1] = 1;
        Self(bytes)
    };

    pub const fn new(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    /// Build a key from arbitrary bytes; anything but exactly 32 bytes is rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypesError> {
        let arr: [u8; Self::LENGTH] =
            bytes.try_into().map_err(|_| TypesError::InvalidKeyLength {
                expected: Self::LENGTH,
                actual: bytes.len(),
            })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for AuthenticationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for AuthenticationKey {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| TypesError::Hex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for AuthenticationKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AuthenticationKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_keys_differ() {
        assert!(AuthenticationKey::ZERO.is_zero());
        assert!(!AuthenticationKey::CONTRACT_CONTROLLED.is_zero());
        assert_ne!(AuthenticationKey::ZERO, AuthenticationKey::CONTRACT_CONTROLLED);
    }

    #[test]
    fn from_slice_requires_32_bytes() {
        assert!(AuthenticationKey::from_slice(&[7u8; 32]).is_ok());
        assert_eq!(
            AuthenticationKey::from_slice(&[7u8; 31]),
            Err(TypesError::InvalidKeyLength {
                expected: 32,
                actual: 31
            })
        );
        assert!(AuthenticationKey::from_slice(&[]).is_err());
    }

    #[test]
    fn hex_roundtrip() {
        let key = AuthenticationKey::new([0xab; 32]);
        let parsed: AuthenticationKey = key.to_string().parse().unwrap();
        assert_eq!(key, parsed);
    }
}
