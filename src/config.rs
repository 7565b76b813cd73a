use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketConfig {
    pub ad_daily_limit: i64,
    pub subscription_bonus: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub admin_email: String,
    pub stripe_webhook_secret: String,
    pub tickets: TicketConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "vaultgrails".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "vaultgrails-users".into()),
            ttl_days: std::env::var("JWT_TTL_DAYS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(30),
        };
        let tickets = TicketConfig {
            ad_daily_limit: std::env::var("AD_DAILY_LIMIT")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(5),
            subscription_bonus: std::env::var("SUBSCRIPTION_BONUS_TICKETS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(100),
        };
        Ok(Self {
            database_url,
            jwt,
            admin_email: std::env::var("ADMIN_EMAIL")?,
            stripe_webhook_secret: std::env::var("STRIPE_WEBHOOK_SECRET")?,
            tickets,
        })
    }
}
