use axum::{
    extract::{Query, State},
    routing::{get, put},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::extractors::CurrentUser,
    auth::repo_types::User,
    error::AppError,
    ledger,
    state::AppState,
    users::{
        dto::{
            EntriesResponse, Pagination, ProfileResponse, TransactionsResponse,
            UpdateProfileRequest, WinsResponse,
        },
        repo,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/profile", get(get_profile).put(update_profile))
        .route("/user/entries", get(get_entries))
        .route("/user/entries/active", get(get_active_entries))
        .route("/user/wins", get(get_wins))
        .route("/user/transactions", get(get_transactions))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let total_entries = repo::entry_count_for_user(&state.db, user.id).await?;
    Ok(Json(ProfileResponse::new(user, total_entries)))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, AppError> {
    let first = payload
        .first_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let last = payload
        .last_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if first.is_none() && last.is_none() {
        return Err(AppError::Validation("No updates provided".into()));
    }

    let updated = User::update_names(&state.db, user.id, first, last).await?;
    info!(user_id = %user.id, "profile updated");

    let total_entries = repo::entry_count_for_user(&state.db, user.id).await?;
    Ok(Json(ProfileResponse::new(
        CurrentUser {
            first_name: updated.first_name,
            last_name: updated.last_name,
            ..user
        },
        total_entries,
    )))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_entries(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<EntriesResponse>, AppError> {
    let entries = repo::entries_for_user(&state.db, user.id).await?;
    Ok(Json(EntriesResponse {
        count: entries.len(),
        entries,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_active_entries(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<EntriesResponse>, AppError> {
    let entries = repo::active_entries_for_user(&state.db, user.id).await?;
    Ok(Json(EntriesResponse {
        count: entries.len(),
        entries,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_wins(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<WinsResponse>, AppError> {
    let wins = repo::wins_for_user(&state.db, user.id).await?;
    Ok(Json(WinsResponse {
        count: wins.len(),
        wins,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn get_transactions(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(page): Query<Pagination>,
) -> Result<Json<TransactionsResponse>, AppError> {
    let transactions = ledger::repo::list_by_user(
        &state.db,
        user.id,
        page.limit.clamp(1, 200),
        page.offset.max(0),
    )
    .await?;
    Ok(Json(TransactionsResponse {
        count: transactions.len(),
        transactions,
    }))
}
