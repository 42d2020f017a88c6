//! Stripe webhook signature verification.
//!
//! The `Stripe-Signature` header looks like `t=1700000000,v1=<hex>,v1=<hex>`.
//! Each `v1` value is `hex(HMAC-SHA256(secret, "{t}.{payload}"))`; one match
//! is enough (Stripe sends several while a secret is being rolled).

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use super::error::SignatureError;

/// Maximum age of a signed timestamp, in seconds.
pub const TOLERANCE_SECS: i64 = 300;

/// Verify `payload` against a `Stripe-Signature` header at the current time.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing why the header was rejected.
pub fn verify(secret: &SecretString, payload: &[u8], header: &str) -> Result<(), SignatureError> {
    verify_at(secret, payload, header, chrono::Utc::now().timestamp())
}

/// Verify against an explicit clock, in unix seconds.
///
/// # Errors
///
/// Returns a [`SignatureError`] describing why the header was rejected.
pub fn verify_at(
    secret: &SecretString,
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<(), SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        let (key, value) = part
            .trim()
            .split_once('=')
            .ok_or(SignatureError::Malformed)?;
        match key {
            "t" => timestamp = Some(value),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    if signatures.is_empty() {
        return Err(SignatureError::MissingSignature);
    }

    let ts: i64 = timestamp.parse().map_err(|_| SignatureError::Malformed)?;
    if (now - ts).abs() > TOLERANCE_SECS {
        return Err(SignatureError::Stale);
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // verify_slice compares in constant time
    let matched = signatures
        .iter()
        .filter_map(|sig| hex::decode(sig).ok())
        .any(|sig| mac.clone().verify_slice(&sig).is_ok());

    if matched {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Build a header value for `payload`, as Stripe would.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) fn sign(secret: &SecretString, payload: &[u8], timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;
    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"invoice.paid"}"#;

    fn secret() -> SecretString {
        SecretString::from("whsec_t3stS1gn1ngK3y")
    }

    #[test]
    fn test_valid_signature() {
        let header = sign(&secret(), PAYLOAD, NOW);
        assert_eq!(verify_at(&secret(), PAYLOAD, &header, NOW), Ok(()));
    }

    #[test]
    fn test_any_v1_may_match() {
        let good = sign(&secret(), PAYLOAD, NOW);
        let good_sig = good.split_once(",v1=").unwrap().1;
        let header = format!("t={NOW},v1={},v1={good_sig}", "ab".repeat(32));
        assert_eq!(verify_at(&secret(), PAYLOAD, &header, NOW), Ok(()));
    }

    #[test]
    fn test_tampered_payload() {
        let header = sign(&secret(), PAYLOAD, NOW);
        let tampered = br#"{"id":"evt_1","type":"invoice.paid","x":1}"#;
        assert_eq!(
            verify_at(&secret(), tampered, &header, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_wrong_secret() {
        let header = sign(&SecretString::from("whsec_other"), PAYLOAD, NOW);
        assert_eq!(
            verify_at(&secret(), PAYLOAD, &header, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_stale_timestamp() {
        let header = sign(&secret(), PAYLOAD, NOW - TOLERANCE_SECS - 1);
        assert_eq!(
            verify_at(&secret(), PAYLOAD, &header, NOW),
            Err(SignatureError::Stale)
        );

        let edge = sign(&secret(), PAYLOAD, NOW - TOLERANCE_SECS);
        assert_eq!(verify_at(&secret(), PAYLOAD, &edge, NOW), Ok(()));
    }

    #[test]
    fn test_malformed_headers() {
        assert_eq!(
            verify_at(&secret(), PAYLOAD, "garbage", NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_at(&secret(), PAYLOAD, "", NOW),
            Err(SignatureError::Malformed)
        );
        assert_eq!(
            verify_at(&secret(), PAYLOAD, "v1=abcd", NOW),
            Err(SignatureError::MissingTimestamp)
        );
        assert_eq!(
            verify_at(&secret(), PAYLOAD, &format!("t={NOW}"), NOW),
            Err(SignatureError::MissingSignature)
        );
        assert_eq!(
            verify_at(&secret(), PAYLOAD, "t=soon,v1=abcd", NOW),
            Err(SignatureError::Malformed)
        );
    }

    #[test]
    fn test_non_hex_signature_is_mismatch() {
        let header = format!("t={NOW},v1=not-hex");
        assert_eq!(
            verify_at(&secret(), PAYLOAD, &header, NOW),
            Err(SignatureError::Mismatch)
        );
    }
}
