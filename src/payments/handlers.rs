use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use tracing::{debug, instrument, warn};

use crate::{
    error::AppError,
    payments::services::{self, CheckoutSessionData, SubscriptionData, WebhookEvent},
    state::AppState,
};

pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/payments/webhook", post(handle_webhook))
}

/// Entry point for payment-processor notifications. The raw body is needed
/// for signature verification, so this handler takes `Bytes` rather than a
/// typed JSON extractor.
#[instrument(skip_all)]
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let signature_header = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("Missing stripe-signature header".into()))?;

    let payload = std::str::from_utf8(&body)
        .map_err(|_| AppError::Validation("Invalid payload encoding".into()))?;

    services::verify_webhook_signature(
        payload,
        signature_header,
        &state.config.stripe_webhook_secret,
        services::now_unix(),
    )
    .map_err(|e| {
        warn!("webhook signature verification failed: {e}");
        AppError::Validation("Invalid webhook signature".into())
    })?;

    let event: WebhookEvent = serde_json::from_str(payload).map_err(|e| {
        warn!("failed to parse webhook event: {e}");
        AppError::Validation("Invalid event payload".into())
    })?;

    debug!(event_type = %event.event_type, event_id = %event.id, "webhook received");

    // The event type alone decides which shape the nested object must have.
    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSessionData =
                services::parse_event_object(event.data.object, "checkout.session")?;
            services::handle_checkout_completed(&state.db, &session).await?;
        }
        "customer.subscription.created"
        | "customer.subscription.updated"
        | "customer.subscription.deleted" => {
            let sub: SubscriptionData =
                services::parse_event_object(event.data.object, "subscription")?;
            services::handle_subscription_event(
                &state.db,
                &sub,
                state.config.tickets.subscription_bonus,
            )
            .await?;
        }
        other => {
            debug!(event_type = %other, "ignoring unhandled event type");
        }
    }

    Ok(Json(serde_json::json!({ "received": true })))
}
