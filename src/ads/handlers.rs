use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    ads::{
        dto::{AdStatsResponse, CheckLimitResponse, WatchAdResponse},
        repo, services,
    },
    auth::extractors::CurrentUser,
    error::AppError,
    ledger::{self, repo::LedgerKind},
    state::AppState,
};

pub fn ad_routes() -> Router<AppState> {
    Router::new()
        .route("/ads/watch", post(watch_ad))
        .route("/ads/check-limit", get(check_limit))
        .route("/ads/stats", get(stats))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn watch_ad(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<WatchAdResponse>, AppError> {
    let limit = state.config.tickets.ad_daily_limit;
    let reward = services::watch_ad(&state.db, user.id, limit).await?;

    Ok(Json(WatchAdResponse {
        message: "Ticket earned!".into(),
        tickets_earned: reward.tickets_earned,
        new_balance: reward.new_balance,
        ads_watched_today: reward.watched_today,
        ads_remaining_today: services::remaining_today(reward.watched_today, limit),
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn check_limit(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<CheckLimitResponse>, AppError> {
    let limit = state.config.tickets.ad_daily_limit;
    let watched_today = repo::count_last_day(&state.db, user.id).await?;

    Ok(Json(CheckLimitResponse {
        can_watch: watched_today < limit,
        watched_today,
        remaining: services::remaining_today(watched_today, limit),
        limit,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn stats(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<AdStatsResponse>, AppError> {
    let limit = state.config.tickets.ad_daily_limit;
    let total_ads_watched = repo::count_all(&state.db, user.id).await?;
    let ads_watched_today = repo::count_last_day(&state.db, user.id).await?;
    let total_tickets_from_ads =
        ledger::repo::sum_by_kind(&state.db, user.id, LedgerKind::AdReward).await?;

    Ok(Json(AdStatsResponse {
        total_ads_watched,
        ads_watched_today,
        total_tickets_from_ads,
        daily_limit: limit,
        remaining: services::remaining_today(ads_watched_today, limit),
    }))
}
