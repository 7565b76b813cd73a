use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::repo_types::{SubscriptionTier, User};
use crate::auth::services::JwtKeys;
use crate::error::AppError;
use crate::ledger;
use crate::state::AppState;

/// Identity context established by the bearer-token gate. Every protected
/// handler takes this as an extractor; the balance is a snapshot derived
/// from the ledger at extraction time.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub ticket_balance: i64,
    pub subscription_status: SubscriptionTier,
    pub is_admin: bool,
}

fn bearer_token(parts: &Parts) -> Result<&str, AppError> {
    let auth = parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::unauthenticated("No token provided. Please login."))?;

    auth.strip_prefix("Bearer ")
        .or_else(|| auth.strip_prefix("bearer "))
        .ok_or_else(|| AppError::unauthenticated("Invalid Authorization header"))
}

async fn resolve_identity(state: &AppState, token: &str) -> Result<CurrentUser, AppError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify(token).map_err(|_| {
        warn!("invalid or expired token");
        AppError::unauthenticated("Invalid or expired token. Please login again.")
    })?;

    // A well-formed token for a deleted account is unauthenticated, not a
    // server error.
    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::unauthenticated("User not found. Please login again."))?;

    let ticket_balance = ledger::repo::balance(&state.db, user.id).await?;
    let is_admin = user.is_admin();

    Ok(CurrentUser {
        id: user.id,
        email: user.email,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        ticket_balance,
        subscription_status: user.subscription_status,
        is_admin,
    })
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;
        resolve_identity(state, token).await
    }
}

/// Never-failing variant of the identity gate: on any problem the request
/// proceeds anonymously instead of being rejected.
pub struct OptionalUser(pub Option<CurrentUser>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let identity = match bearer_token(parts) {
            Ok(token) => resolve_identity(state, token).await.ok(),
            Err(_) => None,
        };
        Ok(OptionalUser(identity))
    }
}

/// Gate for the admin surface: the identity gate first, then the role check.
pub struct AdminUser(pub CurrentUser);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            return Err(AppError::Forbidden(
                "Admin access required. This action is forbidden.".into(),
            ));
        }
        Ok(AdminUser(user))
    }
}
