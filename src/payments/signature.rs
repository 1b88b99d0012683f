//! HMAC-SHA256 signatures over `providerOrderId|paymentId`, hex encoded.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str, provider_order_id: &str, payment_id: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(format!("{provider_order_id}|{payment_id}").as_bytes());
    Some(mac)
}

pub fn sign(secret: &str, provider_order_id: &str, payment_id: &str) -> Option<String> {
    mac(secret, provider_order_id, payment_id).map(|m| hex::encode(m.finalize().into_bytes()))
}

/// Constant-time check of a hex signature. Anything that is not valid hex fails.
pub fn verify(secret: &str, provider_order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(supplied) = hex::decode(signature.trim()) else { return false };
    match mac(secret, provider_order_id, payment_id) {
        Some(m) => m.verify_slice(&supplied).is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "rzp_test_secret";

    #[test]
    fn test_sign_then_verify() {
        let sig = sign(SECRET, "order_1", "pay_1").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(verify(SECRET, "order_1", "pay_1", &sig));
        assert!(verify(SECRET, "order_1", "pay_1", &sig.to_uppercase()));
    }

    #[test]
    fn test_any_mutated_byte_fails() {
        let sig = sign(SECRET, "order_1", "pay_1").unwrap();
        let mut bytes = hex::decode(&sig).unwrap();
        for i in 0..bytes.len() {
            bytes[i] ^= 0x01;
            assert!(!verify(SECRET, "order_1", "pay_1", &hex::encode(&bytes)));
            bytes[i] ^= 0x01;
        }
        assert!(verify(SECRET, "order_1", "pay_1", &hex::encode(&bytes)));
    }

    #[test]
    fn test_wrong_inputs_fail() {
        let sig = sign(SECRET, "order_1", "pay_1").unwrap();
        assert!(!verify("other", "order_1", "pay_1", &sig));
        assert!(!verify(SECRET, "order_2", "pay_1", &sig));
        assert!(!verify(SECRET, "order_1", "pay_2", &sig));
        assert!(!verify(SECRET, "order_1", "pay_1", "not-hex"));
        assert!(!verify(SECRET, "order_1", "pay_1", &sig[..62]));
    }
}
