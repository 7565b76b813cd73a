use crate::auth::repo_types::{Role, User};
use sqlx::PgPool;
use time::Date;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, username, password_hash, first_name, last_name, \
     date_of_birth, role, subscription_status, created_at, last_login";

impl User {
    pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Handle lookup is case-insensitive, matching the unique index.
    pub async fn find_by_username(db: &PgPool, username: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(username) = lower($1)"
        ))
        .bind(username)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        db: &PgPool,
        email: &str,
        username: &str,
        password_hash: &str,
        first_name: &str,
        last_name: &str,
        date_of_birth: Date,
        role: Role,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, username, password_hash, first_name, last_name, \
                 date_of_birth, role)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(email)
        .bind(username)
        .bind(password_hash)
        .bind(first_name)
        .bind(last_name)
        .bind(date_of_birth)
        .bind(role)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    pub async fn touch_last_login(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET last_login = now() WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(())
    }

    pub async fn update_names(
        db: &PgPool,
        id: Uuid,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET first_name = COALESCE($2, first_name),
                 last_name = COALESCE($3, last_name)
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(first_name)
        .bind(last_name)
        .fetch_one(db)
        .await?;
        Ok(user)
    }
}
