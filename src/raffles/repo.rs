use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RaffleStatus {
    ComingSoon,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Raffle {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub year: Option<i32>,
    pub grade: Option<String>,
    pub value: i64,
    pub image_url: String,
    pub status: RaffleStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub draw_date: OffsetDateTime,
    pub min_tickets: i64,
    pub max_tickets: Option<i64>,
    pub featured: bool,
    pub winner_user_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub winner_selected_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RaffleEntry {
    pub id: Uuid,
    pub raffle_id: Uuid,
    pub user_id: Uuid,
    pub ticket_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub entered_at: OffsetDateTime,
}

/// Fields accepted when creating a raffle. System-managed columns (winner,
/// timestamps) are not part of this.
#[derive(Debug)]
pub struct NewRaffle {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub year: Option<i32>,
    pub grade: Option<String>,
    pub value: i64,
    pub image_url: String,
    pub status: RaffleStatus,
    pub draw_date: OffsetDateTime,
    pub min_tickets: i64,
    pub max_tickets: Option<i64>,
    pub featured: bool,
}

/// Partial update; `None` leaves a column untouched.
#[derive(Debug, Default)]
pub struct RaffleChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub year: Option<i32>,
    pub grade: Option<String>,
    pub value: Option<i64>,
    pub image_url: Option<String>,
    pub status: Option<RaffleStatus>,
    pub draw_date: Option<OffsetDateTime>,
    pub min_tickets: Option<i64>,
    pub max_tickets: Option<i64>,
    pub featured: Option<bool>,
}

const RAFFLE_COLUMNS: &str = "id, title, description, category, year, grade, value, image_url, \
     status, draw_date, min_tickets, max_tickets, featured, winner_user_id, \
     winner_selected_at, created_at";

#[derive(Debug, Default)]
pub struct RaffleFilter {
    pub status: Option<RaffleStatus>,
    pub category: Option<String>,
    pub featured: Option<bool>,
}

impl Raffle {
    /// Listing order puts featured raffles first, then the soonest draw.
    pub async fn list(
        db: &PgPool,
        filter: &RaffleFilter,
        limit: i64,
    ) -> anyhow::Result<Vec<Raffle>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {RAFFLE_COLUMNS} FROM raffles WHERE true"));
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(ref category) = filter.category {
            qb.push(" AND category = ").push_bind(category.clone());
        }
        if let Some(featured) = filter.featured {
            qb.push(" AND featured = ").push_bind(featured);
        }
        qb.push(" ORDER BY featured DESC, draw_date ASC LIMIT ")
            .push_bind(limit);

        let raffles = qb.build_query_as::<Raffle>().fetch_all(db).await?;
        Ok(raffles)
    }

    pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Raffle>> {
        let raffle = sqlx::query_as::<_, Raffle>(&format!(
            "SELECT {RAFFLE_COLUMNS} FROM raffles WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(raffle)
    }

    /// Shared-locked read inside the entry transaction: blocks a concurrent
    /// draw from finalizing while an entry commit is in flight, without
    /// serializing entries against each other.
    pub async fn find_for_share(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> anyhow::Result<Option<Raffle>> {
        let raffle = sqlx::query_as::<_, Raffle>(&format!(
            "SELECT {RAFFLE_COLUMNS} FROM raffles WHERE id = $1 FOR SHARE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(raffle)
    }

    /// Exclusive lock for the draw transition; a second concurrent draw
    /// blocks here and then observes `completed`.
    pub async fn lock_for_update(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> anyhow::Result<Option<Raffle>> {
        let raffle = sqlx::query_as::<_, Raffle>(&format!(
            "SELECT {RAFFLE_COLUMNS} FROM raffles WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(raffle)
    }

    pub async fn create(db: &PgPool, new: &NewRaffle) -> anyhow::Result<Raffle> {
        let raffle = sqlx::query_as::<_, Raffle>(&format!(
            "INSERT INTO raffles (title, description, category, year, grade, value, \
                 image_url, status, draw_date, min_tickets, max_tickets, featured)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {RAFFLE_COLUMNS}"
        ))
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.category)
        .bind(new.year)
        .bind(&new.grade)
        .bind(new.value)
        .bind(&new.image_url)
        .bind(new.status)
        .bind(new.draw_date)
        .bind(new.min_tickets)
        .bind(new.max_tickets)
        .bind(new.featured)
        .fetch_one(db)
        .await?;
        Ok(raffle)
    }

    pub async fn update(
        db: &PgPool,
        id: Uuid,
        changes: &RaffleChanges,
    ) -> anyhow::Result<Option<Raffle>> {
        let raffle = sqlx::query_as::<_, Raffle>(&format!(
            "UPDATE raffles SET
                 title = COALESCE($2, title),
                 description = COALESCE($3, description),
                 category = COALESCE($4, category),
                 year = COALESCE($5, year),
                 grade = COALESCE($6, grade),
                 value = COALESCE($7, value),
                 image_url = COALESCE($8, image_url),
                 status = COALESCE($9, status),
                 draw_date = COALESCE($10, draw_date),
                 min_tickets = COALESCE($11, min_tickets),
                 max_tickets = COALESCE($12, max_tickets),
                 featured = COALESCE($13, featured)
             WHERE id = $1
             RETURNING {RAFFLE_COLUMNS}"
        ))
        .bind(id)
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(&changes.category)
        .bind(changes.year)
        .bind(&changes.grade)
        .bind(changes.value)
        .bind(&changes.image_url)
        .bind(changes.status)
        .bind(changes.draw_date)
        .bind(changes.min_tickets)
        .bind(changes.max_tickets)
        .bind(changes.featured)
        .fetch_optional(db)
        .await?;
        Ok(raffle)
    }

    pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM raffles WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn has_entries(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM raffle_entries WHERE raffle_id = $1")
                .bind(id)
                .fetch_one(db)
                .await?;
        Ok(count > 0)
    }

    /// (entry rows, total tickets) across all entries of a raffle.
    pub async fn entry_totals(db: &PgPool, id: Uuid) -> anyhow::Result<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(ticket_count), 0)::BIGINT \
             FROM raffle_entries WHERE raffle_id = $1",
        )
        .bind(id)
        .fetch_one(db)
        .await?;
        Ok(row)
    }

    pub async fn mark_completed(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        winner_user_id: Uuid,
    ) -> anyhow::Result<Raffle> {
        let raffle = sqlx::query_as::<_, Raffle>(&format!(
            "UPDATE raffles
             SET winner_user_id = $2, winner_selected_at = now(), status = 'completed'
             WHERE id = $1
             RETURNING {RAFFLE_COLUMNS}"
        ))
        .bind(id)
        .bind(winner_user_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(raffle)
    }
}

impl RaffleEntry {
    pub async fn insert_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        raffle_id: Uuid,
        user_id: Uuid,
        ticket_count: i64,
    ) -> anyhow::Result<RaffleEntry> {
        let entry = sqlx::query_as::<_, RaffleEntry>(
            r#"
            INSERT INTO raffle_entries (raffle_id, user_id, ticket_count)
            VALUES ($1, $2, $3)
            RETURNING id, raffle_id, user_id, ticket_count, entered_at
            "#,
        )
        .bind(raffle_id)
        .bind(user_id)
        .bind(ticket_count)
        .fetch_one(&mut **tx)
        .await?;
        Ok(entry)
    }

    /// Per-user ticket totals for a raffle, the weighted pool the draw
    /// selects from.
    pub async fn pool_for_raffle(
        tx: &mut Transaction<'_, Postgres>,
        raffle_id: Uuid,
    ) -> anyhow::Result<Vec<(Uuid, i64)>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT user_id, SUM(ticket_count)::BIGINT \
             FROM raffle_entries WHERE raffle_id = $1 GROUP BY user_id",
        )
        .bind(raffle_id)
        .fetch_all(&mut **tx)
        .await?;
        Ok(rows)
    }

    /// The caller's own ticket total in one raffle.
    pub async fn user_ticket_total(
        db: &PgPool,
        raffle_id: Uuid,
        user_id: Uuid,
    ) -> anyhow::Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(ticket_count), 0)::BIGINT \
             FROM raffle_entries WHERE raffle_id = $1 AND user_id = $2",
        )
        .bind(raffle_id)
        .bind(user_id)
        .fetch_one(db)
        .await?;
        Ok(total)
    }
}
