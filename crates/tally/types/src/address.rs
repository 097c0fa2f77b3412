use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypesError;

/// The 16-byte key of every per-account record.
///
/// Text form is `0x`-prefixed lowercase hex. Parsing accepts short forms
/// such as `0x1`, which are left-padded with zeros.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AccountAddress([u8; AccountAddress::LENGTH]);

impl AccountAddress {
    pub const LENGTH: usize = 16;

    /// `0x0`. Never holds an account.
    pub const ZERO: Self = Self([0u8; Self::LENGTH]);

    /// `0x1`, the privileged runtime identity. It runs genesis, invokes the
    /// transaction prologue/epilogue and issues the native fee token.
    pub const RUNTIME: Self = Self::from_u8(1);

    pub const fn new(bytes: [u8; Self::LENGTH]) -> Self {
        Self(bytes)
    }

    const fn from_u8(v: u8) -> Self {
        let mut bytes = [0u8; Self::LENGTH];
        bytes[Self::LENGTH - 1] = v;
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        let arr: [u8; Self::LENGTH] = bytes.try_into().map_err(|_| TypesError::InvalidAddress {
            input: hex::encode(bytes),
            reason: format!("expected {} bytes, got {}", Self::LENGTH, bytes.len()),
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; Self::LENGTH] {
        &self.0
    }

    pub fn to_hex_literal(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Shortest `0x` form, without leading zero nibbles (`0x1` for the runtime).
    pub fn short_str(&self) -> String {
        let full = hex::encode(self.0);
        let trimmed = full.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{}", trimmed)
        }
    }
}

impl fmt::Display for AccountAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_str())
    }
}

impl FromStr for AccountAddress {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TypesError::InvalidAddress {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        if digits.is_empty() {
            return Err(invalid("empty address"));
        }
        if digits.len() > Self::LENGTH * 2 {
            return Err(invalid("address too long"));
        }

        let padded = format!("{:0>width$}", digits, width = Self::LENGTH * 2);
        let bytes = hex::decode(&padded).map_err(|e| invalid(&e.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for AccountAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex_literal())
    }
}

impl<'de> Deserialize<'de> for AccountAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_address_is_one() {
        assert_eq!(AccountAddress::RUNTIME.to_string(), "0x1");
        assert_eq!(AccountAddress::RUNTIME.as_bytes()[15], 1);
    }

    #[test]
    fn parse_short_and_full_forms() {
        let short: AccountAddress = "0x1".parse().unwrap();
        let full: AccountAddress = "0x00000000000000000000000000000001".parse().unwrap();
        assert_eq!(short, full);
        assert_eq!(short, AccountAddress::RUNTIME);
    }

    #[test]
    fn parse_without_prefix() {
        let addr: AccountAddress = "abcd".parse().unwrap();
        assert_eq!(addr.short_str(), "0xabcd");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("0x".parse::<AccountAddress>().is_err());
        assert!("0xzz".parse::<AccountAddress>().is_err());
        assert!(format!("0x{}", "1".repeat(33))
            .parse::<AccountAddress>()
            .is_err());
    }

    #[test]
    fn from_bytes_checks_length() {
        assert!(AccountAddress::from_bytes(&[1u8; 16]).is_ok());
        assert!(matches!(
            AccountAddress::from_bytes(&[1u8; 15]),
            Err(TypesError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn zero_displays_as_0x0() {
        assert_eq!(AccountAddress::ZERO.to_string(), "0x0");
    }

    #[test]
    fn serde_uses_hex_literal() {
        let addr: AccountAddress = "0xbeef".parse().unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"0x0000000000000000000000000000beef\"");
        let back: AccountAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, back);
    }
}
