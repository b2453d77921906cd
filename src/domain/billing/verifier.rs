//! Webhook signature verification.
//!
//! HMAC-SHA256 over `"{timestamp}.{payload}"`, compared in constant time,
//! with a timestamp window to reject replays.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::WebhookError;
use super::event::ProviderEvent;

/// Maximum allowed age for webhook events (5 minutes).
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Maximum allowed clock skew for future events (1 minute).
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components of the `Stripe-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp when the signature was generated.
    pub timestamp: i64,
    /// All v1 signatures; more than one is sent while a secret is rolled.
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses `t=<timestamp>,v1=<signature>[,v1=<signature>...]`.
    ///
    /// Unknown keys (such as legacy `v0`) are ignored.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::ParseError("invalid header format".to_string()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::ParseError("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    v1_signatures.push(hex::decode(value).map_err(|_| {
                        WebhookError::ParseError("invalid v1 signature hex".to_string())
                    })?);
                }
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| WebhookError::ParseError("missing timestamp".to_string()))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::ParseError("missing v1 signature".to_string()));
        }

        Ok(SignatureHeader {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifier for provider webhook signatures.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: SecretString,
}

impl WebhookVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verifies the signature against the current clock and parses the event.
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<ProviderEvent, WebhookError> {
        self.verify_and_parse_at(payload, signature_header, chrono::Utc::now().timestamp())
    }

    /// Verifies against an explicit `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// - `InvalidSignature` - no v1 signature matched
    /// - `TimestampOutOfRange` - signed more than 5 minutes ago
    /// - `InvalidTimestamp` - signed in the future beyond skew tolerance
    /// - `ParseError` - malformed header or JSON payload
    pub fn verify_and_parse_at(
        &self,
        payload: &[u8],
        signature_header: &str,
        now: i64,
    ) -> Result<ProviderEvent, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        // `t` is unauthenticated; an extreme value must not overflow
        let age = now
            .checked_sub(header.timestamp)
            .ok_or(WebhookError::TimestampOutOfRange)?;
        if age > MAX_EVENT_AGE_SECS {
            return Err(WebhookError::TimestampOutOfRange);
        }
        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::InvalidTimestamp);
        }

        let expected = compute_signature(self.secret.expose_secret(), header.timestamp, payload)?;
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| constant_time_compare(&expected, candidate));
        if !matched {
            return Err(WebhookError::InvalidSignature);
        }

        serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))
    }
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier").finish_non_exhaustive()
    }
}

fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Builds a `Stripe-Signature` header value for `payload`.
///
/// Used by tests and local tooling that replay events against the service.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let signature = compute_signature(secret, timestamp, payload)
        .map(hex::encode)
        .unwrap_or_default();
    format!("t={},v1={}", timestamp, signature)
}

/// Performs constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "whsec_test_secret_12345";
    const NOW: i64 = 1_705_276_800;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(SecretString::new(TEST_SECRET.to_string()))
    }

    fn payload() -> &'static str {
        r#"{"id":"evt_1","type":"invoice.paid","created":1705276800,"data":{"object":{"id":"in_1"}}}"#
    }

    // ══════════════════════════════════════════════════════════════
    // SignatureHeader Parsing Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn parses_header_with_multiple_v1() {
        let header = SignatureHeader::parse("t=123,v1=abcd,v1=ef01,v0=9999").unwrap();
        assert_eq!(header.timestamp, 123);
        assert_eq!(header.v1_signatures.len(), 2);
    }

    #[test]
    fn header_without_v1_is_rejected() {
        assert!(matches!(
            SignatureHeader::parse("t=123"),
            Err(WebhookError::ParseError(_))
        ));
    }

    #[test]
    fn header_with_bad_hex_is_rejected() {
        assert!(SignatureHeader::parse("t=123,v1=zz").is_err());
    }

    // ══════════════════════════════════════════════════════════════
    // Verification Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn valid_signature_parses_event() {
        let header = sign_payload(TEST_SECRET, NOW, payload().as_bytes());
        let event = verifier()
            .verify_and_parse_at(payload().as_bytes(), &header, NOW + 10)
            .unwrap();
        assert_eq!(event.id, "evt_1");
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let header = sign_payload("whsec_other", NOW, payload().as_bytes());
        assert_eq!(
            verifier()
                .verify_and_parse_at(payload().as_bytes(), &header, NOW)
                .unwrap_err(),
            WebhookError::InvalidSignature
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let header = sign_payload(TEST_SECRET, NOW, payload().as_bytes());
        let tampered = payload().replace("in_1", "in_2");
        assert_eq!(
            verifier()
                .verify_and_parse_at(tampered.as_bytes(), &header, NOW)
                .unwrap_err(),
            WebhookError::InvalidSignature
        );
    }

    #[test]
    fn stale_signature_is_out_of_range() {
        let header = sign_payload(TEST_SECRET, NOW, payload().as_bytes());
        assert_eq!(
            verifier()
                .verify_and_parse_at(payload().as_bytes(), &header, NOW + MAX_EVENT_AGE_SECS + 1)
                .unwrap_err(),
            WebhookError::TimestampOutOfRange
        );
    }

    #[test]
    fn extreme_timestamps_are_rejected_without_overflow() {
        let oldest = format!("t={},v1=00", i64::MIN);
        assert_eq!(
            verifier()
                .verify_and_parse_at(payload().as_bytes(), &oldest, NOW)
                .unwrap_err(),
            WebhookError::TimestampOutOfRange
        );

        let newest = format!("t={},v1=00", i64::MAX);
        assert_eq!(
            verifier()
                .verify_and_parse_at(payload().as_bytes(), &newest, NOW)
                .unwrap_err(),
            WebhookError::InvalidTimestamp
        );
    }

    #[test]
    fn future_signature_beyond_skew_is_invalid() {
        let header = sign_payload(TEST_SECRET, NOW + MAX_CLOCK_SKEW_SECS + 5, payload().as_bytes());
        assert_eq!(
            verifier()
                .verify_and_parse_at(payload().as_bytes(), &header, NOW)
                .unwrap_err(),
            WebhookError::InvalidTimestamp
        );
    }

    #[test]
    fn rolled_secret_matches_any_v1() {
        let good = sign_payload(TEST_SECRET, NOW, payload().as_bytes());
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={}", NOW, "00".repeat(32), good_sig);
        assert!(verifier()
            .verify_and_parse_at(payload().as_bytes(), &header, NOW)
            .is_ok());
    }
}
