use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::address::AccountAddress;
use crate::error::TypesError;

/// Runtime identity of a token type: `<issuer>::<module>::<name>`.
///
/// Balance stores are keyed by (address, TokenCode).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenCode {
    pub address: AccountAddress,
    pub module: String,
    pub name: String,
}

impl TokenCode {
    pub fn new(address: AccountAddress, module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address,
            module: module.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TokenCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.address, self.module, self.name)
    }
}

impl FromStr for TokenCode {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split("::").collect();
        match parts.as_slice() {
            [address, module, name] if !module.is_empty() && !name.is_empty() => {
                Ok(Self::new(address.parse()?, *module, *name))
            }
            _ => Err(TypesError::InvalidTokenCode(s.to_string())),
        }
    }
}

impl Serialize for TokenCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A token type known to the token registry.
///
/// Implementors are zero-sized markers; the ledger only uses them as a key
/// component and as the source of the per-token maximum amount.
pub trait TokenType: 'static {
    const ISSUER: AccountAddress;
    const MODULE: &'static str;
    const NAME: &'static str;

    /// Largest amount a single balance of this token may hold.
    const MAX_AMOUNT: u128 = u128::MAX;

    fn token_code() -> TokenCode {
        TokenCode::new(Self::ISSUER, Self::MODULE, Self::NAME)
    }
}

/// The native token; the only token transaction fees may be paid in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stc;

impl TokenType for Stc {
    const ISSUER: AccountAddress = AccountAddress::RUNTIME;
    const MODULE: &'static str = "STC";
    const NAME: &'static str = "STC";
}
