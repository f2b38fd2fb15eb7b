//! HMAC-SHA256 payload signing for webhook deliveries.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the `X-Signature` value for a delivery.
///
/// The `secret` is the endpoint-specific signing secret. The `payload` is
/// the exact JSON body being sent — sign the serialized string, never a
/// re-serialization. Returns the hex-encoded signature.
pub fn compute_signature(secret: &str, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(payload.as_bytes());
    let result = mac.finalize();
    hex::encode(result.into_bytes())
}

// ---------------------------------------------------------------------------
// hex rendering
// ---------------------------------------------------------------------------

mod hex {
    /// Lowercase hex, two digits per byte.
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
