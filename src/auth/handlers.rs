use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use time::{Date, OffsetDateTime};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, SignupRequest},
        repo_types::{Role, User},
        services::{hash_password, is_valid_email, is_valid_username, verify_password, JwtKeys},
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
}

const MIN_AGE_YEARS: i32 = 18;

fn age_on(date_of_birth: Date, today: Date) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month() as u8, today.day()) < (date_of_birth.month() as u8, date_of_birth.day()) {
        age -= 1;
    }
    age
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    Json(mut payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    payload.email = payload.email.trim().to_lowercase();
    payload.username = payload.username.trim().to_string();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }
    if !is_valid_username(&payload.username) {
        warn!(username = %payload.username, "invalid username");
        return Err(AppError::Validation(
            "Username must be 3-20 letters, digits or underscores".into(),
        ));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(AppError::Validation("Password too short".into()));
    }
    if payload.first_name.trim().is_empty() || payload.last_name.trim().is_empty() {
        return Err(AppError::Validation("Name is required".into()));
    }

    let today = OffsetDateTime::now_utc().date();
    if age_on(payload.date_of_birth, today) < MIN_AGE_YEARS {
        warn!("underage signup attempt");
        return Err(AppError::Validation(
            "Must be 18 or older to register".into(),
        ));
    }

    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(AppError::Conflict("Email already registered".into()));
    }
    if User::find_by_username(&state.db, &payload.username)
        .await?
        .is_some()
    {
        warn!(username = %payload.username, "username taken");
        return Err(AppError::Conflict("Username already taken".into()));
    }

    let hash = hash_password(&payload.password)?;

    // The role is fixed at registration; the identity gate only ever looks
    // at this column afterwards.
    let role = if payload.email == state.config.admin_email.to_lowercase() {
        Role::Admin
    } else {
        Role::User
    };

    let user = User::create(
        &state.db,
        &payload.email,
        &payload.username,
        &hash,
        payload.first_name.trim(),
        payload.last_name.trim(),
        payload.date_of_birth,
        role,
    )
    .await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: PublicUser {
                id: user.id,
                email: user.email,
                username: user.username,
                first_name: user.first_name,
                last_name: user.last_name,
                ticket_balance: 0,
                subscription_status: user.subscription_status,
            },
        }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(mut payload): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }

    let user = User::find_by_email(&state.db, &payload.email)
        .await?
        .ok_or_else(|| {
            warn!(email = %payload.email, "login unknown email");
            AppError::unauthenticated("Invalid email or password")
        })?;

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(email = %payload.email, user_id = %user.id, "login invalid password");
        return Err(AppError::unauthenticated("Invalid email or password"));
    }

    User::touch_last_login(&state.db, user.id).await?;

    let balance = crate::ledger::repo::balance(&state.db, user.id).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok(Json(AuthResponse {
        token,
        user: PublicUser {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            ticket_balance: balance,
            subscription_status: user.subscription_status,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn age_counts_completed_years_only() {
        let dob = date!(2000 - 06 - 15);
        assert_eq!(age_on(dob, date!(2018 - 06 - 14)), 17);
        assert_eq!(age_on(dob, date!(2018 - 06 - 15)), 18);
        assert_eq!(age_on(dob, date!(2018 - 12 - 01)), 18);
    }

    #[test]
    fn signup_request_parses_iso_date() {
        let payload: SignupRequest = serde_json::from_value(serde_json::json!({
            "email": "collector@example.com",
            "username": "grail_hunter",
            "password": "hunter2hunter2",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "date_of_birth": "1990-01-15"
        }))
        .expect("well-formed signup body");
        assert_eq!(payload.date_of_birth, date!(1990 - 01 - 15));
    }
}
