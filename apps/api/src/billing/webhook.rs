//! Webhook signature verification and event decoding.
//!
//! The provider signs the raw request body; verification must happen on the
//! exact bytes received, before any JSON parsing. No entitlement mutation
//! occurs unless the signature checks out.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Reject events whose signature timestamp drifts more than this far from
/// the server clock, to limit replay of captured payloads.
const TIMESTAMP_TOLERANCE_SECS: i64 = 300;

/// Verifies a `Stripe-Signature` style header: `t=<unix-ts>,v1=<hex-hmac>`
/// where the HMAC-SHA256 is computed over `"{t}.{payload}"`.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str) -> Result<(), AppError> {
    let now = chrono::Utc::now().timestamp();
    verify_signature_at(payload, header, secret, now)
}

fn verify_signature_at(
    payload: &[u8],
    header: &str,
    secret: &str,
    now: i64,
) -> Result<(), AppError> {
    let mut timestamp: Option<i64> = None;
    let mut signature: Option<&str> = None;

    for part in header.split(',') {
        match part.split_once('=') {
            Some(("t", v)) => timestamp = v.parse().ok(),
            Some(("v1", v)) => signature = Some(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(AppError::SignatureVerification)?;
    let signature = signature.ok_or(AppError::SignatureVerification)?;

    if (now - timestamp).abs() > TIMESTAMP_TOLERANCE_SECS {
        return Err(AppError::SignatureVerification);
    }

    let payload_str =
        std::str::from_utf8(payload).map_err(|_| AppError::SignatureVerification)?;
    let signed_payload = format!("{timestamp}.{payload_str}");

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::SignatureVerification)?;
    mac.update(signed_payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if bool::from(subtle::ConstantTimeEq::ct_eq(
        expected.as_bytes(),
        signature.as_bytes(),
    )) {
        Ok(())
    } else {
        Err(AppError::SignatureVerification)
    }
}

/// Raw event envelope as sent by the provider.
#[derive(Debug, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Provider-side creation timestamp; the sequence hint for the
    /// reconciler's staleness guard.
    pub created: i64,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// A decoded webhook payload, reduced to the fields reconciliation needs.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    CheckoutCompleted {
        customer_id: String,
        email: String,
    },
    /// Covers both subscription-created and subscription-updated: the
    /// reconciler treats them identically.
    SubscriptionChanged {
        customer_id: String,
        status: String,
        price_id: String,
        created: i64,
    },
    SubscriptionDeleted {
        customer_id: String,
        created: i64,
    },
}

/// Maps a verified envelope to a `SubscriptionEvent`.
///
/// Returns `None` for event types we do not handle, or for handled types
/// whose payload is missing a required field — both are acknowledged to the
/// provider without mutation.
pub fn decode_event(envelope: &EventEnvelope) -> Option<SubscriptionEvent> {
    let object = &envelope.data.object;

    match envelope.event_type.as_str() {
        "checkout.session.completed" => {
            let customer_id = str_field(object, &["customer"])?;
            let email = str_field(object, &["customer_details", "email"])
                .or_else(|| str_field(object, &["customer_email"]))?;
            Some(SubscriptionEvent::CheckoutCompleted {
                customer_id,
                email,
            })
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            Some(SubscriptionEvent::SubscriptionChanged {
                customer_id: str_field(object, &["customer"])?,
                status: str_field(object, &["status"])?,
                price_id: str_field(object, &["items", "data", "0", "price", "id"])?,
                created: envelope.created,
            })
        }
        "customer.subscription.deleted" => Some(SubscriptionEvent::SubscriptionDeleted {
            customer_id: str_field(object, &["customer"])?,
            created: envelope.created,
        }),
        _ => None,
    }
}

/// Nested string lookup; a numeric path segment indexes into an array.
fn str_field(value: &serde_json::Value, path: &[&str]) -> Option<String> {
    let mut cur = value;
    for key in path {
        cur = match key.parse::<usize>() {
            Ok(idx) => cur.get(idx)?,
            Err(_) => cur.get(*key)?,
        };
    }
    cur.as_str().map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn sign(payload: &[u8], timestamp: i64) -> String {
        let signed = format!("{}.{}", timestamp, std::str::from_utf8(payload).unwrap());
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(signed.as_bytes());
        format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature_accepted() {
        let payload = br#"{"type":"test"}"#;
        let header = sign(payload, 1_700_000_000);
        assert!(verify_signature_at(payload, &header, SECRET, 1_700_000_000).is_ok());
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign(br#"{"type":"test"}"#, 1_700_000_000);
        let result =
            verify_signature_at(br#"{"type":"evil"}"#, &header, SECRET, 1_700_000_000);
        assert!(matches!(result, Err(AppError::SignatureVerification)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let payload = br#"{"type":"test"}"#;
        let header = sign(payload, 1_700_000_000);
        let result = verify_signature_at(payload, &header, "whsec_other", 1_700_000_000);
        assert!(matches!(result, Err(AppError::SignatureVerification)));
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = br#"{"type":"test"}"#;
        let header = sign(payload, 1_700_000_000);
        let result = verify_signature_at(payload, &header, SECRET, 1_700_000_000 + 301);
        assert!(matches!(result, Err(AppError::SignatureVerification)));
    }

    #[test]
    fn test_malformed_header_rejected() {
        let result = verify_signature_at(b"x", "not-a-signature", SECRET, 0);
        assert!(matches!(result, Err(AppError::SignatureVerification)));
    }

    fn envelope(event_type: &str, object: serde_json::Value) -> EventEnvelope {
        EventEnvelope {
            id: "evt_1".into(),
            event_type: event_type.into(),
            created: 1_700_000_000,
            data: EventData { object },
        }
    }

    #[test]
    fn test_decode_checkout_completed() {
        let env = envelope(
            "checkout.session.completed",
            serde_json::json!({
                "customer": "cus_123",
                "customer_details": { "email": "a@b.com" }
            }),
        );
        assert_eq!(
            decode_event(&env),
            Some(SubscriptionEvent::CheckoutCompleted {
                customer_id: "cus_123".into(),
                email: "a@b.com".into(),
            })
        );
    }

    #[test]
    fn test_decode_subscription_updated() {
        let env = envelope(
            "customer.subscription.updated",
            serde_json::json!({
                "customer": "cus_123",
                "status": "active",
                "items": { "data": [ { "price": { "id": "price_pro" } } ] }
            }),
        );
        assert_eq!(
            decode_event(&env),
            Some(SubscriptionEvent::SubscriptionChanged {
                customer_id: "cus_123".into(),
                status: "active".into(),
                price_id: "price_pro".into(),
                created: 1_700_000_000,
            })
        );
    }

    #[test]
    fn test_decode_subscription_deleted() {
        let env = envelope(
            "customer.subscription.deleted",
            serde_json::json!({ "customer": "cus_123", "status": "canceled" }),
        );
        assert_eq!(
            decode_event(&env),
            Some(SubscriptionEvent::SubscriptionDeleted {
                customer_id: "cus_123".into(),
                created: 1_700_000_000,
            })
        );
    }

    #[test]
    fn test_unhandled_event_type_ignored() {
        let env = envelope("invoice.paid", serde_json::json!({ "customer": "cus_123" }));
        assert_eq!(decode_event(&env), None);
    }

    #[test]
    fn test_missing_field_ignored() {
        let env = envelope(
            "customer.subscription.updated",
            serde_json::json!({ "customer": "cus_123" }),
        );
        assert_eq!(decode_event(&env), None);
    }
}
