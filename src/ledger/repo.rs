//! Append-only ticket ledger. A user's balance is the sum of their entries;
//! no mutable counter exists anywhere, so the log can never diverge from the
//! balance reported to clients. Rows are inserted and read, never updated or
//! deleted.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    Purchase,
    AdReward,
    RaffleEntry,
    Subscription,
    AdminAdjustment,
}

/// One signed ledger movement. Positive amounts credit tickets, negative
/// amounts spend them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub kind: LedgerKind,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_payment_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn balance(db: &PgPool, user_id: Uuid) -> anyhow::Result<i64> {
    let balance: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM ticket_transactions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(balance)
}

/// Balance read inside an open transaction, after the caller has taken the
/// per-user row lock.
pub async fn balance_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> anyhow::Result<i64> {
    let balance: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM ticket_transactions WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(balance)
}

pub async fn append(
    db: &PgPool,
    user_id: Uuid,
    amount: i64,
    kind: LedgerKind,
    description: &str,
) -> anyhow::Result<LedgerEntry> {
    let entry = sqlx::query_as::<_, LedgerEntry>(
        r#"
        INSERT INTO ticket_transactions (user_id, amount, kind, description)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, amount, kind, description, stripe_payment_id, created_at
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(kind)
    .bind(description)
    .fetch_one(db)
    .await?;
    Ok(entry)
}

pub async fn append_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    amount: i64,
    kind: LedgerKind,
    description: &str,
) -> anyhow::Result<LedgerEntry> {
    let entry = sqlx::query_as::<_, LedgerEntry>(
        r#"
        INSERT INTO ticket_transactions (user_id, amount, kind, description)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, amount, kind, description, stripe_payment_id, created_at
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(kind)
    .bind(description)
    .fetch_one(&mut **tx)
    .await?;
    Ok(entry)
}

/// Credit keyed by the external payment identifier. Replaying the same
/// payment hits the unique index and inserts nothing; the return value says
/// whether a credit was actually applied.
pub async fn credit_purchase_idempotent(
    db: &PgPool,
    user_id: Uuid,
    amount: i64,
    stripe_payment_id: &str,
    description: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO ticket_transactions (user_id, amount, kind, description, stripe_payment_id)
        VALUES ($1, $2, 'purchase', $3, $4)
        ON CONFLICT (stripe_payment_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(description)
    .bind(stripe_payment_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<LedgerEntry>> {
    let rows = sqlx::query_as::<_, LedgerEntry>(
        r#"
        SELECT id, user_id, amount, kind, description, stripe_payment_id, created_at
        FROM ticket_transactions
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Sum of credits of one kind, used by the ad statistics endpoint.
pub async fn sum_by_kind(db: &PgPool, user_id: Uuid, kind: LedgerKind) -> anyhow::Result<i64> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0)::BIGINT FROM ticket_transactions \
         WHERE user_id = $1 AND kind = $2",
    )
    .bind(user_id)
    .bind(kind)
    .fetch_one(db)
    .await?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(LedgerKind::AdReward).unwrap(),
            serde_json::json!("ad_reward")
        );
        assert_eq!(
            serde_json::to_value(LedgerKind::RaffleEntry).unwrap(),
            serde_json::json!("raffle_entry")
        );
    }

    #[test]
    fn entry_json_omits_absent_payment_id() {
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            amount: -5,
            kind: LedgerKind::RaffleEntry,
            description: "Entered raffle: 1952 Mantle".into(),
            stripe_payment_id: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json.get("stripe_payment_id").is_none());
        assert_eq!(json["amount"], -5);
    }
}
