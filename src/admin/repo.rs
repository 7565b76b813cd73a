use sqlx::PgPool;

use crate::admin::dto::AdminUserSummary;

/// User roster with ledger-derived balances, one aggregate query rather
/// than a balance lookup per row.
pub async fn list_users_with_balance(
    db: &PgPool,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<AdminUserSummary>> {
    let users = sqlx::query_as::<_, AdminUserSummary>(
        "SELECT u.id, u.email, u.username, u.first_name, u.last_name, \
                COALESCE(SUM(t.amount), 0)::BIGINT AS ticket_balance, \
                u.subscription_status, u.created_at \
         FROM users u \
         LEFT JOIN ticket_transactions t ON t.user_id = u.id \
         GROUP BY u.id \
         ORDER BY u.created_at DESC \
         LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(users)
}

pub struct PlatformStats {
    pub total_users: i64,
    pub active_raffles: i64,
    pub total_entries: i64,
    pub premium_users: i64,
}

pub async fn platform_stats(db: &PgPool) -> anyhow::Result<PlatformStats> {
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(db)
        .await?;
    let active_raffles: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM raffles WHERE status = 'active'")
            .fetch_one(db)
            .await?;
    let total_entries: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM raffle_entries")
        .fetch_one(db)
        .await?;
    let premium_users: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE subscription_status = 'premium'")
            .fetch_one(db)
            .await?;

    Ok(PlatformStats {
        total_users,
        active_raffles,
        total_entries,
        premium_users,
    })
}
