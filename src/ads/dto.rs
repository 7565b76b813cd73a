use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct WatchAdResponse {
    pub message: String,
    pub tickets_earned: i64,
    pub new_balance: i64,
    pub ads_watched_today: i64,
    pub ads_remaining_today: i64,
}

#[derive(Debug, Serialize)]
pub struct CheckLimitResponse {
    pub can_watch: bool,
    pub watched_today: i64,
    pub remaining: i64,
    pub limit: i64,
}

#[derive(Debug, Serialize)]
pub struct AdStatsResponse {
    pub total_ads_watched: i64,
    pub ads_watched_today: i64,
    pub total_tickets_from_ads: i64,
    pub daily_limit: i64,
    pub remaining: i64,
}
