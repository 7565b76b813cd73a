use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    admin::{
        dto::{
            AdjustTicketsRequest, AdjustTicketsResponse, CreateRaffleRequest, DrawResponse,
            RaffleResponse, StatsResponse, UpdateRaffleRequest, UsersResponse,
        },
        repo,
    },
    auth::extractors::AdminUser,
    auth::repo_types::User,
    error::AppError,
    ledger::{self, repo::LedgerKind},
    raffles::repo::Raffle,
    raffles::services,
    state::AppState,
    users::dto::Pagination,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/raffles", post(create_raffle))
        .route(
            "/admin/raffles/:id",
            axum::routing::put(update_raffle).delete(delete_raffle),
        )
        .route("/admin/raffles/:id/draw", post(draw_raffle))
        .route("/admin/users", get(list_users))
        .route("/admin/users/:id/tickets", post(adjust_tickets))
        .route("/admin/stats", get(get_stats))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn create_raffle(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(payload): Json<CreateRaffleRequest>,
) -> Result<(StatusCode, Json<RaffleResponse>), AppError> {
    if payload.title.trim().is_empty()
        || payload.category.trim().is_empty()
        || payload.image_url.trim().is_empty()
    {
        return Err(AppError::Validation("Missing required fields".into()));
    }
    if payload.value <= 0 {
        return Err(AppError::Validation("Value must be positive".into()));
    }
    if payload.min_tickets < 1 {
        return Err(AppError::Validation("min_tickets must be at least 1".into()));
    }
    if let Some(max) = payload.max_tickets {
        if max < payload.min_tickets {
            return Err(AppError::Validation(
                "max_tickets must not be below min_tickets".into(),
            ));
        }
    }
    if payload.draw_date <= OffsetDateTime::now_utc() {
        return Err(AppError::Validation("Draw date must be in the future".into()));
    }

    let raffle = Raffle::create(&state.db, &payload.into_new_raffle()).await?;
    info!(raffle_id = %raffle.id, title = %raffle.title, "raffle created");

    Ok((
        StatusCode::CREATED,
        Json(RaffleResponse {
            message: "Raffle created successfully".into(),
            raffle,
        }),
    ))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn update_raffle(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRaffleRequest>,
) -> Result<Json<RaffleResponse>, AppError> {
    if payload.is_empty() {
        return Err(AppError::Validation("No updates provided".into()));
    }

    let raffle = Raffle::update(&state.db, id, &payload.into_changes())
        .await?
        .ok_or_else(|| AppError::not_found("Raffle not found"))?;

    info!(raffle_id = %raffle.id, "raffle updated");
    Ok(Json(RaffleResponse {
        message: "Raffle updated successfully".into(),
        raffle,
    }))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn delete_raffle(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if Raffle::has_entries(&state.db, id).await? {
        warn!(raffle_id = %id, "refused delete of raffle with entries");
        return Err(AppError::Conflict(
            "Cannot delete raffle with entries. Set status to \"cancelled\" instead.".into(),
        ));
    }

    if !Raffle::delete(&state.db, id).await? {
        return Err(AppError::not_found("Raffle not found"));
    }

    info!(raffle_id = %id, "raffle deleted");
    Ok(Json(serde_json::json!({
        "message": "Raffle deleted successfully"
    })))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn draw_raffle(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DrawResponse>, AppError> {
    let raffle = services::draw_raffle(&state.db, id).await?;

    let winner_id = raffle
        .winner_user_id
        .ok_or_else(|| anyhow::anyhow!("drawn raffle has no winner recorded"))?;
    let winner = User::find_by_id(&state.db, winner_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("winner {winner_id} has no user record"))?;

    Ok(Json(DrawResponse {
        message: "Draw completed successfully".into(),
        raffle,
        winner: winner.into(),
    }))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn list_users(
    State(state): State<AppState>,
    admin: AdminUser,
    Query(page): Query<Pagination>,
) -> Result<Json<UsersResponse>, AppError> {
    let users =
        repo::list_users_with_balance(&state.db, page.limit.clamp(1, 200), page.offset.max(0))
            .await?;
    Ok(Json(UsersResponse {
        count: users.len(),
        users,
    }))
}

#[instrument(skip(state, admin, payload), fields(admin_id = %admin.0.id))]
pub async fn adjust_tickets(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustTicketsRequest>,
) -> Result<Json<AdjustTicketsResponse>, AppError> {
    if payload.amount == 0 {
        return Err(AppError::Validation("Amount must be non-zero".into()));
    }
    if payload.reason.trim().is_empty() {
        return Err(AppError::Validation("Reason is required".into()));
    }

    let user = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    ledger::repo::append(
        &state.db,
        user.id,
        payload.amount,
        LedgerKind::AdminAdjustment,
        payload.reason.trim(),
    )
    .await?;
    let new_balance = ledger::repo::balance(&state.db, user.id).await?;

    info!(user_id = %user.id, amount = payload.amount, "balance adjusted");
    Ok(Json(AdjustTicketsResponse {
        message: "Balance adjusted".into(),
        amount: payload.amount,
        new_balance,
    }))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.0.id))]
pub async fn get_stats(
    State(state): State<AppState>,
    admin: AdminUser,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = repo::platform_stats(&state.db).await?;
    Ok(Json(StatsResponse {
        total_users: stats.total_users,
        active_raffles: stats.active_raffles,
        total_entries: stats.total_entries,
        premium_users: stats.premium_users,
    }))
}
