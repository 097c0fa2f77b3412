//! Scenario files: genesis accounts plus an ordered list of transactions.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tally_txn::LifecycleConfig;
use tally_types::{AccountAddress, AuthKeyScheme};

use crate::error::{CliError, CliResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Lifecycle overrides; an external config file takes precedence.
    #[serde(default)]
    pub lifecycle: Option<LifecycleConfig>,

    #[serde(default)]
    pub accounts: Vec<AccountSpec>,

    #[serde(default)]
    pub transactions: Vec<TransactionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccountSpec {
    pub name: String,
    /// Hex-encoded authentication pre-image; the address derives from it.
    pub preimage: String,
    /// Initial native token balance. TOML integers stop at `i64`.
    #[serde(default)]
    pub balance: u64,
    #[serde(default = "enabled")]
    pub auto_accept: bool,
}

fn enabled() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransactionSpec {
    /// Account name or address.
    pub sender: String,
    /// Defaults to the sender's registered pre-image.
    #[serde(default)]
    pub preimage: Option<String>,
    /// Defaults to the sender's current sequence number.
    #[serde(default)]
    pub sequence_number: Option<u64>,
    #[serde(default)]
    pub gas_price: u64,
    #[serde(default)]
    pub max_gas_units: u64,
    #[serde(default)]
    pub gas_used: u64,
    pub action: Action,
}

/// Transaction body.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum Action {
    Transfer {
        to: String,
        amount: u64,
        #[serde(default)]
        memo: Option<String>,
    },
    SetAutoAccept {
        enable: bool,
    },
    /// Rotate to the key hashed from a new hex pre-image.
    RotateKey {
        preimage: String,
    },
    /// Give up the signer; the account becomes contract-controlled.
    DelegateSigner,
    Noop,
}

impl Scenario {
    pub fn load(path: &Path) -> CliResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

/// Account names mapped to their derived addresses and pre-images.
#[derive(Debug, Default)]
pub struct Directory {
    entries: BTreeMap<String, (AccountAddress, Vec<u8>)>,
}

impl Directory {
    pub fn build(accounts: &[AccountSpec], scheme: &dyn AuthKeyScheme) -> CliResult<Self> {
        let mut entries = BTreeMap::new();
        for spec in accounts {
            let preimage = decode_hex(&spec.preimage)?;
            let address = scheme.derive_address(&scheme.hash_preimage(&preimage));
            if entries.insert(spec.name.clone(), (address, preimage)).is_some() {
                return Err(CliError::Scenario(format!(
                    "account name '{}' declared twice",
                    spec.name
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Resolve a name, falling back to parsing a literal address.
    pub fn resolve(&self, name_or_address: &str) -> CliResult<AccountAddress> {
        if let Some((address, _)) = self.entries.get(name_or_address) {
            return Ok(*address);
        }
        name_or_address.parse().map_err(|_| {
            CliError::Scenario(format!("unknown account '{name_or_address}'"))
        })
    }

    pub fn preimage(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(|(_, p)| p.as_slice())
    }

    pub fn name_of(&self, address: AccountAddress) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, (a, _))| *a == address)
            .map(|(name, _)| name.as_str())
    }
}

pub fn decode_hex(s: &str) -> CliResult<Vec<u8>> {
    hex::decode(s.trim_start_matches("0x"))
        .map_err(|e| CliError::InvalidArgument(format!("bad hex '{s}': {e}")))
}
