use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::ads::repo;
use crate::error::AppError;
use crate::ledger::{self, repo::LedgerKind};

const AD_REWARD_TICKETS: i64 = 1;

pub fn remaining_today(watched: i64, limit: i64) -> i64 {
    (limit - watched).max(0)
}

/// Outcome of a successful ad watch.
pub struct AdReward {
    pub tickets_earned: i64,
    pub new_balance: i64,
    pub watched_today: i64,
}

/// Count-then-insert under the per-user lock: a burst of concurrent watch
/// requests serializes here, so the rolling cap cannot be exceeded.
pub async fn watch_ad(db: &PgPool, user_id: Uuid, daily_limit: i64) -> Result<AdReward, AppError> {
    let mut tx = db.begin().await?;

    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let watched = repo::count_last_day_in_tx(&mut tx, user_id).await?;
    if watched >= daily_limit {
        return Err(AppError::DailyLimitReached { limit: daily_limit });
    }

    repo::insert_in_tx(&mut tx, user_id, AD_REWARD_TICKETS).await?;
    let balance = ledger::repo::balance_in_tx(&mut tx, user_id).await?;
    ledger::repo::append_in_tx(
        &mut tx,
        user_id,
        AD_REWARD_TICKETS,
        LedgerKind::AdReward,
        "Watched advertisement",
    )
    .await?;

    tx.commit().await?;

    info!(user_id = %user_id, watched_today = watched + 1, "ad reward granted");
    Ok(AdReward {
        tickets_earned: AD_REWARD_TICKETS,
        new_balance: balance + AD_REWARD_TICKETS,
        watched_today: watched + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_never_goes_negative() {
        assert_eq!(remaining_today(0, 5), 5);
        assert_eq!(remaining_today(4, 5), 1);
        assert_eq!(remaining_today(5, 5), 0);
        assert_eq!(remaining_today(9, 5), 0);
    }
}
