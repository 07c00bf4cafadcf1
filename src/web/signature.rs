//! HMAC-SHA256 signatures for webhook payloads.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{Result, VaultError};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex signature of the raw request body.
pub const SIGNATURE_HEADER: &str = "x-hmac-hash";

fn mac(secret: &str) -> Result<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| VaultError::Config(format!("webhook secret: {e}")))
}

/// Lowercase hex HMAC-SHA256 of `body` under `secret`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = mac(secret)?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Check a hex signature against `body` in constant time.
pub fn verify(secret: &str, body: &[u8], signature: &str) -> Result<()> {
    let expected = hex::decode(signature.trim()).map_err(|_| VaultError::InvalidSignature)?;
    let mut mac = mac(secret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| VaultError::InvalidSignature)
}
