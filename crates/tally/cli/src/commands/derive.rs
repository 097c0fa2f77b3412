//! `tally derive`: show the authentication key and address for a pre-image.

use serde::Serialize;
use tally_types::{AccountAddress, AuthKeyScheme, AuthenticationKey, Blake3AuthScheme};

use crate::error::CliResult;
use crate::output::{print_json, OutputFormat};
use crate::scenario::decode_hex;

#[derive(Debug, Serialize)]
pub struct Derivation {
    pub authentication_key: AuthenticationKey,
    pub address: AccountAddress,
}

pub fn derive(preimage_hex: &str) -> CliResult<Derivation> {
    let preimage = decode_hex(preimage_hex)?;
    let scheme = Blake3AuthScheme;
    let authentication_key = scheme.hash_preimage(&preimage);
    Ok(Derivation {
        address: scheme.derive_address(&authentication_key),
        authentication_key,
    })
}

pub fn execute(preimage_hex: &str, format: OutputFormat) -> CliResult<()> {
    let derivation = derive(preimage_hex)?;
    match format {
        OutputFormat::Json => print_json(&derivation)?,
        OutputFormat::Text => {
            println!("authentication key: {}", derivation.authentication_key);
            println!("address:            {}", derivation.address.to_hex_literal());
        }
    }
    Ok(())
}
