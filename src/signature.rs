//! Callback signature scheme: hex(HMAC-SHA256(secret, "{order_id}|{payment_id}")).

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

fn mac_for(gateway_order_id: &str, gateway_payment_id: &str, secret: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(gateway_order_id.as_bytes());
    mac.update(b"|");
    mac.update(gateway_payment_id.as_bytes());
    Some(mac)
}

/// Lowercase hex signature for the given ids.
pub fn compute_signature(gateway_order_id: &str, gateway_payment_id: &str, secret: &str) -> String {
    mac_for(gateway_order_id, gateway_payment_id, secret)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default()
}

/// Constant-time check of a relayed callback signature. Only canonical
/// lowercase hex is accepted, so every change to the signature text is a mismatch.
pub fn verify_callback(
    gateway_order_id: &str,
    gateway_payment_id: &str,
    signature: &str,
    secret: &str,
) -> bool {
    if signature.bytes().any(|b| b.is_ascii_uppercase()) {
        return false;
    }

    let Ok(provided) = hex::decode(signature) else {
        return false;
    };

    match mac_for(gateway_order_id, gateway_payment_id, secret) {
        Some(mac) => mac.verify_slice(&provided).is_ok(),
        None => false,
    }
}

/// Digest stored for session tokens; raw tokens are never persisted.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
