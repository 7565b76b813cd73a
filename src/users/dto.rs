use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractors::CurrentUser;
use crate::auth::repo_types::SubscriptionTier;
use crate::ledger::repo::LedgerEntry;
use crate::raffles::repo::Raffle;
use crate::users::repo::EntryWithRaffle;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub ticket_balance: i64,
    pub subscription_status: SubscriptionTier,
    pub is_admin: bool,
    pub total_entries: i64,
}

impl ProfileResponse {
    pub fn new(user: CurrentUser, total_entries: i64) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            ticket_balance: user.ticket_balance,
            subscription_status: user.subscription_status,
            is_admin: user.is_admin,
            total_entries,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Debug, Serialize)]
pub struct EntriesResponse {
    pub count: usize,
    pub entries: Vec<EntryWithRaffle>,
}

#[derive(Debug, Serialize)]
pub struct WinsResponse {
    pub count: usize,
    pub wins: Vec<Raffle>,
}

#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    pub count: usize,
    pub transactions: Vec<LedgerEntry>,
}
