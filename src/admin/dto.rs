use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::repo_types::{SubscriptionTier, User};
use crate::raffles::repo::{NewRaffle, Raffle, RaffleChanges, RaffleStatus};

#[derive(Debug, Deserialize)]
pub struct CreateRaffleRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub year: Option<i32>,
    pub grade: Option<String>,
    pub value: i64,
    pub image_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub draw_date: OffsetDateTime,
    #[serde(default = "default_min_tickets")]
    pub min_tickets: i64,
    pub max_tickets: Option<i64>,
    #[serde(default)]
    pub featured: bool,
    pub status: Option<RaffleStatus>,
}

fn default_min_tickets() -> i64 {
    1
}

impl CreateRaffleRequest {
    pub fn into_new_raffle(self) -> NewRaffle {
        NewRaffle {
            title: self.title,
            description: self.description,
            category: self.category,
            year: self.year,
            grade: self.grade,
            value: self.value,
            image_url: self.image_url,
            status: self.status.unwrap_or(RaffleStatus::Active),
            draw_date: self.draw_date,
            min_tickets: self.min_tickets,
            max_tickets: self.max_tickets,
            featured: self.featured,
        }
    }
}

/// Partial raffle update. Unknown fields are rejected outright, which is
/// what keeps system-managed columns (winner, totals, creation timestamp)
/// out of reach of this endpoint: they simply are not part of the schema.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateRaffleRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub year: Option<i32>,
    pub grade: Option<String>,
    pub value: Option<i64>,
    pub image_url: Option<String>,
    pub status: Option<RaffleStatus>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub draw_date: Option<OffsetDateTime>,
    pub min_tickets: Option<i64>,
    pub max_tickets: Option<i64>,
    pub featured: Option<bool>,
}

impl UpdateRaffleRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.year.is_none()
            && self.grade.is_none()
            && self.value.is_none()
            && self.image_url.is_none()
            && self.status.is_none()
            && self.draw_date.is_none()
            && self.min_tickets.is_none()
            && self.max_tickets.is_none()
            && self.featured.is_none()
    }

    pub fn into_changes(self) -> RaffleChanges {
        RaffleChanges {
            title: self.title,
            description: self.description,
            category: self.category,
            year: self.year,
            grade: self.grade,
            value: self.value,
            image_url: self.image_url,
            status: self.status,
            draw_date: self.draw_date,
            min_tickets: self.min_tickets,
            max_tickets: self.max_tickets,
            featured: self.featured,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RaffleResponse {
    pub message: String,
    pub raffle: Raffle,
}

/// Winner identity attached to a draw result.
#[derive(Debug, Serialize)]
pub struct WinnerSummary {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for WinnerSummary {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DrawResponse {
    pub message: String,
    pub raffle: Raffle,
    pub winner: WinnerSummary,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct AdminUserSummary {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub ticket_balance: i64,
    pub subscription_status: SubscriptionTier,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct UsersResponse {
    pub count: usize,
    pub users: Vec<AdminUserSummary>,
}

/// Manual balance correction applied by an administrator. Negative amounts
/// claw tickets back.
#[derive(Debug, Deserialize)]
pub struct AdjustTicketsRequest {
    pub amount: i64,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct AdjustTicketsResponse {
    pub message: String,
    pub amount: i64,
    pub new_balance: i64,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total_users: i64,
    pub active_raffles: i64,
    pub total_entries: i64,
    pub premium_users: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_rejects_system_managed_fields() {
        for field in ["winner_user_id", "winner_selected_at", "created_at", "id"] {
            let body = serde_json::json!({ field: null });
            let parsed = serde_json::from_value::<UpdateRaffleRequest>(body);
            assert!(parsed.is_err(), "{field} must not be updatable");
        }
    }

    #[test]
    fn update_accepts_managed_fields() {
        let parsed: UpdateRaffleRequest = serde_json::from_value(serde_json::json!({
            "title": "1999 Charizard Holo PSA 10",
            "featured": true
        }))
        .unwrap();
        assert_eq!(parsed.title.as_deref(), Some("1999 Charizard Holo PSA 10"));
        assert_eq!(parsed.featured, Some(true));
        assert!(!parsed.is_empty());
    }

    #[test]
    fn empty_update_is_detected() {
        let parsed: UpdateRaffleRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(parsed.is_empty());
    }
}
