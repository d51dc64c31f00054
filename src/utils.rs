//! Utility functions for identifiers

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique document/user id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Four-digit security code minted at document creation, used for the
/// signature-by-code fallback.
pub fn new_security_code() -> u32 {
    let id = uuid7();
    let b = id.as_bytes();
    let seed = u32::from_be_bytes([b[12], b[13], b[14], b[15]]);
    1000 + seed % 9000
}
