use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use sqlx::PgPool;
use std::collections::HashMap;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::repo_types::SubscriptionTier;
use crate::error::AppError;
use crate::ledger::{self, repo::LedgerKind};

/// Maximum age of webhook events (5 minutes) to prevent replay attacks.
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Verify the processor's webhook signature (HMAC-SHA256).
/// Signature header format: t=<timestamp>,v1=<sig1>,v1=<sig2>,...
pub fn verify_webhook_signature(
    payload: &str,
    signature_header: &str,
    secret: &str,
    now_unix: i64,
) -> Result<(), &'static str> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in signature_header.split(',') {
        let mut kv = part.splitn(2, '=');
        let key = kv.next().ok_or("Invalid signature header format")?;
        let value = kv.next().ok_or("Invalid signature header format")?;

        match key {
            "t" => timestamp = Some(value),
            "v1" => signatures.push(value),
            _ => {} // Ignore unknown keys
        }
    }

    let timestamp_str = timestamp.ok_or("Missing timestamp in signature")?;
    if signatures.is_empty() {
        return Err("Missing signature in header");
    }

    let timestamp_secs: i64 = timestamp_str.parse().map_err(|_| "Invalid timestamp")?;
    if (now_unix - timestamp_secs).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err("Timestamp outside tolerance window");
    }

    // Expected signature: HMAC-SHA256(secret, "{timestamp}.{payload}")
    let signed_payload = format!("{}.{}", timestamp_str, payload);
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "Invalid webhook secret")?;
    mac.update(signed_payload.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());

    if signatures.iter().any(|sig| sig == &expected) {
        Ok(())
    } else {
        Err("Signature mismatch")
    }
}

/// Minimal webhook event structure for lenient parsing; only the fields the
/// bridge acts on are extracted.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

/// The nested object is kept raw here; which struct it deserializes into is
/// decided by the event type, never by which optional fields the payload
/// happens to include.
#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// Deserialize an event's object into the shape the event type calls for,
/// checking the embedded `object` discriminator first.
pub fn parse_event_object<T: serde::de::DeserializeOwned>(
    object: serde_json::Value,
    expected_kind: &str,
) -> Result<T, AppError> {
    let kind = object
        .get("object")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if kind != expected_kind {
        warn!(kind, expected_kind, "event object kind mismatch");
        return Err(AppError::Validation("Invalid event payload".into()));
    }
    serde_json::from_value(object).map_err(|e| {
        warn!("malformed event object: {e}");
        AppError::Validation("Invalid event payload".into())
    })
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionData {
    pub payment_intent: Option<String>,
    pub metadata: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionData {
    pub id: String,
    pub status: String,
    pub metadata: Option<HashMap<String, String>>,
}

fn metadata_user_id(metadata: Option<&HashMap<String, String>>) -> Result<Uuid, AppError> {
    metadata
        .and_then(|m| m.get("user_id"))
        .ok_or_else(|| AppError::Validation("Missing user_id metadata".into()))?
        .parse()
        .map_err(|_| AppError::Validation("Invalid user_id metadata".into()))
}

/// One-time ticket purchase: exactly one ledger credit per external payment
/// id, no matter how often the notification is delivered.
pub async fn handle_checkout_completed(
    db: &PgPool,
    session: &CheckoutSessionData,
) -> Result<(), AppError> {
    let user_id = metadata_user_id(session.metadata.as_ref())?;

    let tickets: i64 = session
        .metadata
        .as_ref()
        .and_then(|m| m.get("tickets"))
        .ok_or_else(|| AppError::Validation("Missing tickets metadata".into()))?
        .parse()
        .map_err(|_| AppError::Validation("Invalid tickets metadata".into()))?;
    if tickets <= 0 {
        return Err(AppError::Validation("Invalid tickets metadata".into()));
    }

    let payment_id = session
        .payment_intent
        .as_deref()
        .ok_or_else(|| AppError::Validation("Missing payment_intent".into()))?;

    let pack = session
        .metadata
        .as_ref()
        .and_then(|m| m.get("pack_type"))
        .map(String::as_str)
        .unwrap_or("tickets");

    let credited = ledger::repo::credit_purchase_idempotent(
        db,
        user_id,
        tickets,
        payment_id,
        &format!("Purchased {pack} pack ({tickets} tickets)"),
    )
    .await?;

    if credited {
        info!(user_id = %user_id, tickets, payment_id, "purchase credited");
    } else {
        info!(user_id = %user_id, payment_id, "duplicate payment notification ignored");
    }
    Ok(())
}

/// Subscription lifecycle: an activation moves the user to premium and
/// grants the recurring bonus once per free→premium transition; any other
/// status drops the user back to free with no credit.
pub async fn handle_subscription_event(
    db: &PgPool,
    sub: &SubscriptionData,
    bonus_tickets: i64,
) -> Result<(), AppError> {
    let user_id = metadata_user_id(sub.metadata.as_ref())?;

    let mut tx = db.begin().await?;

    let tier: SubscriptionTier =
        sqlx::query_scalar("SELECT subscription_status FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))?;

    if sub.status == "active" {
        if tier == SubscriptionTier::Free {
            sqlx::query("UPDATE users SET subscription_status = 'premium' WHERE id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            ledger::repo::append_in_tx(
                &mut tx,
                user_id,
                bonus_tickets,
                LedgerKind::Subscription,
                "Monthly membership bonus tickets",
            )
            .await?;
            info!(user_id = %user_id, subscription_id = %sub.id, "subscription activated");
        }
    } else if tier == SubscriptionTier::Premium {
        sqlx::query("UPDATE users SET subscription_status = 'free' WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        warn!(user_id = %user_id, subscription_id = %sub.id, status = %sub.status,
              "subscription deactivated");
    }

    tx.commit().await?;
    Ok(())
}

pub fn now_unix() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod signature_tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    fn sign(payload: &str, timestamp: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{timestamp}.{payload}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_a_valid_signature() {
        let payload = r#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;
        let header = format!("t={now},v1={}", sign(payload, now));
        assert!(verify_webhook_signature(payload, &header, SECRET, now).is_ok());
    }

    #[test]
    fn accepts_any_matching_v1_among_several() {
        let payload = r#"{"id":"evt_1"}"#;
        let now = 1_700_000_000;
        let header = format!("t={now},v1=deadbeef,v1={}", sign(payload, now));
        assert!(verify_webhook_signature(payload, &header, SECRET, now).is_ok());
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let now = 1_700_000_000;
        let header = format!("t={now},v1={}", sign(r#"{"id":"evt_1"}"#, now));
        let err = verify_webhook_signature(r#"{"id":"evt_2"}"#, &header, SECRET, now).unwrap_err();
        assert_eq!(err, "Signature mismatch");
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let payload = r#"{"id":"evt_1"}"#;
        let then = 1_700_000_000;
        let header = format!("t={then},v1={}", sign(payload, then));
        let err =
            verify_webhook_signature(payload, &header, SECRET, then + 301).unwrap_err();
        assert_eq!(err, "Timestamp outside tolerance window");
    }

    #[test]
    fn rejects_a_missing_timestamp() {
        let err = verify_webhook_signature("{}", "v1=abc", SECRET, 0).unwrap_err();
        assert_eq!(err, "Missing timestamp in signature");
    }
}

#[cfg(test)]
mod event_tests {
    use super::*;

    #[test]
    fn parses_a_realistic_checkout_session() {
        // Live checkout.session objects carry top-level id and status
        // alongside the fields the bridge uses; none of that may change how
        // the object is routed.
        let object = serde_json::json!({
            "object": "checkout.session",
            "id": "cs_test_1",
            "status": "complete",
            "payment_status": "paid",
            "payment_intent": "pi_123",
            "metadata": { "user_id": "7f1a0e8e-0000-4000-8000-000000000001", "tickets": "250" }
        });

        let session: CheckoutSessionData =
            parse_event_object(object, "checkout.session").expect("session");
        assert_eq!(session.payment_intent.as_deref(), Some("pi_123"));
        assert_eq!(
            session.metadata.as_ref().unwrap().get("tickets").unwrap(),
            "250"
        );
    }

    #[test]
    fn parses_a_subscription_object() {
        let object = serde_json::json!({
            "object": "subscription",
            "id": "sub_9",
            "status": "active",
            "current_period_end": 1_700_000_000,
            "metadata": { "user_id": "7f1a0e8e-0000-4000-8000-000000000001" }
        });

        let sub: SubscriptionData = parse_event_object(object, "subscription").expect("sub");
        assert_eq!(sub.id, "sub_9");
        assert_eq!(sub.status, "active");
    }

    #[test]
    fn rejects_an_object_kind_mismatch() {
        // A subscription payload handed to the checkout path is malformed,
        // not silently reinterpreted.
        let object = serde_json::json!({
            "object": "subscription",
            "id": "sub_9",
            "status": "active"
        });
        let err =
            parse_event_object::<CheckoutSessionData>(object, "checkout.session").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_a_missing_discriminator() {
        let object = serde_json::json!({ "total": 799 });
        let err = parse_event_object::<CheckoutSessionData>(object, "checkout.session").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn envelope_keeps_unknown_objects_raw() {
        let event: WebhookEvent = serde_json::from_value(serde_json::json!({
            "id": "evt_3",
            "type": "invoice.paid",
            "data": { "object": { "object": "invoice", "total": 799 } }
        }))
        .unwrap();
        assert_eq!(event.event_type, "invoice.paid");
        assert_eq!(event.data.object["object"], "invoice");
    }
}
