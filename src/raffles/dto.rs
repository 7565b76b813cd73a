use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::raffles::repo::{Raffle, RaffleStatus};

#[derive(Debug, Deserialize)]
pub struct ListRafflesQuery {
    pub status: Option<RaffleStatus>,
    pub category: Option<String>,
    pub featured: Option<bool>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Serialize)]
pub struct RaffleSummary {
    #[serde(flatten)]
    pub raffle: Raffle,
    pub time_remaining: String,
    pub category_emoji: &'static str,
}

#[derive(Debug, Serialize)]
pub struct RafflesListResponse {
    pub count: usize,
    pub raffles: Vec<RaffleSummary>,
}

#[derive(Debug, Serialize)]
pub struct RaffleDetail {
    #[serde(flatten)]
    pub raffle: Raffle,
    pub time_remaining: String,
    pub category_emoji: &'static str,
    pub entry_count: i64,
    pub total_tickets: i64,
    /// Present only for identified callers: their own tickets in this raffle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub your_tickets: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct EnterRaffleRequest {
    pub tickets: i64,
}

#[derive(Debug, Serialize)]
pub struct EnterRaffleResponse {
    pub message: String,
    pub entry_id: Uuid,
    pub ticket_count: i64,
    pub new_balance: i64,
}

impl RaffleSummary {
    pub fn from_raffle(raffle: Raffle, now: OffsetDateTime) -> Self {
        let time_remaining = time_remaining(raffle.draw_date, now);
        let category_emoji = category_emoji(&raffle.category);
        Self {
            raffle,
            time_remaining,
            category_emoji,
        }
    }
}

/// Human-readable countdown to the draw, clamped to "Ended" once the draw
/// date has passed. Presentation only, never persisted.
pub fn time_remaining(draw_date: OffsetDateTime, now: OffsetDateTime) -> String {
    let remaining = draw_date - now;
    if !remaining.is_positive() {
        return "Ended".to_string();
    }
    let days = remaining.whole_days();
    let hours = remaining.whole_hours() % 24;
    let minutes = remaining.whole_minutes() % 60;
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{}m", minutes.max(1))
    }
}

pub fn category_emoji(category: &str) -> &'static str {
    match category {
        "pokemon" => "⚡",
        "sports" => "⚾",
        "comics" => "📚",
        "coins" => "🪙",
        "watches" => "⌚",
        "vintage" => "🕰️",
        _ => "🎁",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn at(now: OffsetDateTime, delta: Duration) -> String {
        time_remaining(now + delta, now)
    }

    #[test]
    fn countdown_formats_by_magnitude() {
        let now = OffsetDateTime::UNIX_EPOCH;
        assert_eq!(at(now, Duration::days(3) + Duration::hours(4)), "3d 4h");
        assert_eq!(at(now, Duration::hours(2) + Duration::minutes(15)), "2h 15m");
        assert_eq!(at(now, Duration::minutes(12)), "12m");
        assert_eq!(at(now, Duration::seconds(30)), "1m");
    }

    #[test]
    fn countdown_clamps_to_ended() {
        let now = OffsetDateTime::UNIX_EPOCH;
        assert_eq!(at(now, Duration::ZERO), "Ended");
        assert_eq!(at(now, Duration::hours(-5)), "Ended");
    }

    #[test]
    fn unknown_category_falls_back_to_default() {
        assert_eq!(category_emoji("sports"), "⚾");
        assert_eq!(category_emoji("beanie-babies"), "🎁");
    }
}
