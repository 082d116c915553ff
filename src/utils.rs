use hex::decode as hex_decode;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::error;

type HmacSha256 = Hmac<Sha256>;

/// Helper function for verifying a webhook delivery signature.
/// Expected header format: "sha256=<hex digest>".
pub fn verify_webhook_signature(secret: &str, payload: &[u8], signature_header: &str) -> bool {
    let expected_prefix = "sha256=";
    if !signature_header.starts_with(expected_prefix) {
        return false;
    }

    let delivered_signature = &signature_header[expected_prefix.len()..];

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);
    let my_sig = mac.finalize().into_bytes();

    match hex_decode(delivered_signature) {
        Ok(delivered_bytes) => my_sig.as_slice() == delivered_bytes.as_slice(),
        Err(_) => {
            error!("Signature verification failed");
            false
        }
    }
}

/// Strips the leading ref namespace from a ref id, so
/// "refs/heads/master" becomes "master". Unrecognized refs pass through
/// unchanged.
pub fn strip_ref_prefix(ref_id: &str) -> &str {
    ref_id
        .strip_prefix("refs/heads/")
        .or_else(|| ref_id.strip_prefix("refs/tags/"))
        .unwrap_or(ref_id)
}
