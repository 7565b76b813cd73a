use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::{CurrentUser, OptionalUser},
    error::AppError,
    raffles::{
        dto::{
            category_emoji, time_remaining, EnterRaffleRequest, EnterRaffleResponse, ListRafflesQuery,
            RaffleDetail, RaffleSummary, RafflesListResponse,
        },
        repo::{Raffle, RaffleEntry, RaffleFilter},
        services,
    },
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/raffles", get(list_raffles))
        .route("/raffles/:id", get(get_raffle))
}

pub fn write_routes() -> Router<AppState> {
    Router::new().route("/raffles/:id/enter", post(enter_raffle))
}

#[instrument(skip(state))]
pub async fn list_raffles(
    State(state): State<AppState>,
    Query(query): Query<ListRafflesQuery>,
) -> Result<Json<RafflesListResponse>, AppError> {
    let filter = RaffleFilter {
        status: query.status,
        // "all" from the category picker means no filter.
        category: query.category.filter(|c| c != "all"),
        featured: query.featured,
    };

    let raffles = Raffle::list(&state.db, &filter, query.limit.clamp(1, 500)).await?;

    let now = OffsetDateTime::now_utc();
    let raffles: Vec<RaffleSummary> = raffles
        .into_iter()
        .map(|r| RaffleSummary::from_raffle(r, now))
        .collect();

    Ok(Json(RafflesListResponse {
        count: raffles.len(),
        raffles,
    }))
}

#[instrument(skip(state, identity))]
pub async fn get_raffle(
    State(state): State<AppState>,
    OptionalUser(identity): OptionalUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RaffleDetail>, AppError> {
    let raffle = Raffle::find(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Raffle not found"))?;

    let (entry_count, total_tickets) = Raffle::entry_totals(&state.db, id).await?;

    let your_tickets = match identity {
        Some(user) => Some(RaffleEntry::user_ticket_total(&state.db, id, user.id).await?),
        None => None,
    };

    let now = OffsetDateTime::now_utc();
    Ok(Json(RaffleDetail {
        time_remaining: time_remaining(raffle.draw_date, now),
        category_emoji: category_emoji(&raffle.category),
        entry_count,
        total_tickets,
        your_tickets,
        raffle,
    }))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn enter_raffle(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<EnterRaffleRequest>,
) -> Result<Json<EnterRaffleResponse>, AppError> {
    let (entry, new_balance) =
        services::enter_raffle(&state.db, user.id, id, payload.tickets).await?;

    Ok(Json(EnterRaffleResponse {
        message: "Successfully entered raffle!".into(),
        entry_id: entry.id,
        ticket_count: entry.ticket_count,
        new_balance,
    }))
}
