use axum::{routing::get, Json, Router};
use serde::Serialize;
use tracing::instrument;

use crate::{
    auth::extractors::CurrentUser, auth::repo_types::SubscriptionTier, error::AppError,
    state::AppState,
};

pub fn ticket_routes() -> Router<AppState> {
    Router::new()
        .route("/tickets/balance", get(get_balance))
        .route("/tickets/packages", get(get_packages))
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
    pub subscription_status: SubscriptionTier,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketPackage {
    pub id: &'static str,
    pub name: &'static str,
    pub tickets: i64,
    /// Price in cents.
    pub price: i64,
    pub price_display: String,
}

/// The fixed purchase catalog. Checkout itself happens against the payment
/// processor; this endpoint only describes what can be bought.
fn packages() -> Vec<TicketPackage> {
    const CATALOG: [(&str, &str, i64, i64); 5] = [
        ("package_100", "Starter Pack", 100, 499),
        ("package_250", "Value Pack", 250, 999),
        ("package_600", "Power Pack", 600, 1999),
        ("package_1500", "Mega Pack", 1500, 4999),
        ("package_25000", "Whale Pack", 25000, 13999),
    ];
    CATALOG
        .into_iter()
        .map(|(id, name, tickets, price)| TicketPackage {
            id,
            name,
            tickets,
            price,
            price_display: format!("${}.{:02}", price / 100, price % 100),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct PackagesResponse {
    pub packages: Vec<TicketPackage>,
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn get_balance(user: CurrentUser) -> Result<Json<BalanceResponse>, AppError> {
    Ok(Json(BalanceResponse {
        balance: user.ticket_balance,
        subscription_status: user.subscription_status,
    }))
}

pub async fn get_packages() -> Json<PackagesResponse> {
    Json(PackagesResponse {
        packages: packages(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_display_formats_cents() {
        let catalog = packages();
        let starter = catalog.iter().find(|p| p.id == "package_100").unwrap();
        assert_eq!(starter.price_display, "$4.99");
        let whale = catalog.iter().find(|p| p.id == "package_25000").unwrap();
        assert_eq!(whale.price_display, "$139.99");
    }

    #[test]
    fn package_ids_encode_their_ticket_counts() {
        for pkg in packages() {
            assert_eq!(pkg.id, format!("package_{}", pkg.tickets));
        }
    }
}
