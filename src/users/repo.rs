use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::raffles::repo::{Raffle, RaffleStatus};

/// A raffle entry joined with the raffle it belongs to, as shown on the
/// user's dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EntryWithRaffle {
    pub id: Uuid,
    pub ticket_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub entered_at: OffsetDateTime,
    pub raffle_id: Uuid,
    pub raffle_title: String,
    pub raffle_image_url: String,
    pub raffle_value: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub raffle_draw_date: OffsetDateTime,
    pub raffle_status: RaffleStatus,
}

const ENTRY_JOIN: &str = "SELECT e.id, e.ticket_count, e.entered_at, \
         r.id AS raffle_id, r.title AS raffle_title, r.image_url AS raffle_image_url, \
         r.value AS raffle_value, r.draw_date AS raffle_draw_date, r.status AS raffle_status \
     FROM raffle_entries e \
     JOIN raffles r ON r.id = e.raffle_id";

pub async fn entries_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<EntryWithRaffle>> {
    let rows = sqlx::query_as::<_, EntryWithRaffle>(&format!(
        "{ENTRY_JOIN} WHERE e.user_id = $1 ORDER BY e.entered_at DESC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Entries whose raffle is still accepting tickets, for the dashboard.
pub async fn active_entries_for_user(
    db: &PgPool,
    user_id: Uuid,
) -> anyhow::Result<Vec<EntryWithRaffle>> {
    let rows = sqlx::query_as::<_, EntryWithRaffle>(&format!(
        "{ENTRY_JOIN} WHERE e.user_id = $1 AND r.status = 'active' ORDER BY e.entered_at DESC"
    ))
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn entry_count_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM raffle_entries WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await?;
    Ok(count)
}

/// Completed raffles this user won.
pub async fn wins_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Raffle>> {
    let raffles = sqlx::query_as::<_, Raffle>(
        "SELECT id, title, description, category, year, grade, value, image_url, \
             status, draw_date, min_tickets, max_tickets, featured, winner_user_id, \
             winner_selected_at, created_at \
         FROM raffles \
         WHERE winner_user_id = $1 AND status = 'completed' \
         ORDER BY winner_selected_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(raffles)
}
