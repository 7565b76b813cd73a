use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

/// One completed ad watch. Only used to enforce the rolling daily cap.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AdView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tickets_earned: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub viewed_at: OffsetDateTime,
}

/// Views in the trailing 24-hour window, counted inside the transaction
/// that holds the per-user lock.
pub async fn count_last_day_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ad_views \
         WHERE user_id = $1 AND viewed_at >= now() - INTERVAL '24 hours'",
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(count)
}

pub async fn count_last_day(db: &PgPool, user_id: Uuid) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM ad_views \
         WHERE user_id = $1 AND viewed_at >= now() - INTERVAL '24 hours'",
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}

pub async fn count_all(db: &PgPool, user_id: Uuid) -> anyhow::Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ad_views WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await?;
    Ok(count)
}

pub async fn insert_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    tickets_earned: i64,
) -> anyhow::Result<AdView> {
    let view = sqlx::query_as::<_, AdView>(
        r#"
        INSERT INTO ad_views (user_id, tickets_earned)
        VALUES ($1, $2)
        RETURNING id, user_id, tickets_earned, viewed_at
        "#,
    )
    .bind(user_id)
    .bind(tickets_earned)
    .fetch_one(&mut **tx)
    .await?;
    Ok(view)
}
