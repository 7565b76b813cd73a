use rand::Rng;
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::ledger::{self, repo::LedgerKind};
use crate::raffles::repo::{Raffle, RaffleEntry, RaffleStatus};

/// State and bounds checks for an entry attempt, in contract order. The
/// caller has already established that the ticket count is positive and the
/// raffle exists.
pub fn validate_entry(
    raffle: &Raffle,
    now: OffsetDateTime,
    requested: i64,
    balance: i64,
) -> Result<(), AppError> {
    match raffle.status {
        RaffleStatus::Active => {}
        RaffleStatus::ComingSoon => {
            return Err(AppError::Conflict("Raffle is not open yet".into()));
        }
        _ => return Err(AppError::Conflict("Raffle is not active".into())),
    }

    if now >= raffle.draw_date {
        return Err(AppError::Conflict("Raffle has ended".into()));
    }

    if requested < raffle.min_tickets {
        return Err(AppError::Validation(format!(
            "Minimum {} tickets required",
            raffle.min_tickets
        )));
    }
    if let Some(max) = raffle.max_tickets {
        if requested > max {
            return Err(AppError::Validation(format!(
                "Maximum {max} tickets per entry"
            )));
        }
    }

    if balance < requested {
        return Err(AppError::InsufficientBalance {
            required: requested,
            available: balance,
        });
    }

    Ok(())
}

/// Atomically validate and commit a raffle entry: one entry record plus a
/// ledger debit of the same magnitude, inside a single transaction holding
/// the per-user row lock. Two racing requests for the same user serialize on
/// that lock, so both cannot pass the balance check.
pub async fn enter_raffle(
    db: &PgPool,
    user_id: Uuid,
    raffle_id: Uuid,
    requested: i64,
) -> Result<(RaffleEntry, i64), AppError> {
    if requested < 1 {
        return Err(AppError::Validation("Invalid ticket count".into()));
    }

    let mut tx = db.begin().await?;

    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let raffle = Raffle::find_for_share(&mut tx, raffle_id)
        .await?
        .ok_or_else(|| AppError::not_found("Raffle not found"))?;

    let balance = ledger::repo::balance_in_tx(&mut tx, user_id).await?;
    validate_entry(&raffle, OffsetDateTime::now_utc(), requested, balance)?;

    let entry = RaffleEntry::insert_in_tx(&mut tx, raffle_id, user_id, requested).await?;
    ledger::repo::append_in_tx(
        &mut tx,
        user_id,
        -requested,
        LedgerKind::RaffleEntry,
        &format!("Entered raffle: {}", raffle.title),
    )
    .await?;

    tx.commit().await?;

    info!(
        user_id = %user_id,
        raffle_id = %raffle_id,
        tickets = requested,
        "raffle entered"
    );
    Ok((entry, balance - requested))
}

/// Weighted selection: each ticket is one slot, a slot is drawn uniformly.
/// Equivalent to materializing one array element per ticket without building
/// the array. Returns `None` on an empty pool.
pub fn pick_winner<R: Rng>(pool: &[(Uuid, i64)], rng: &mut R) -> Option<Uuid> {
    let total: i64 = pool.iter().map(|(_, count)| count).sum();
    if total <= 0 {
        return None;
    }
    let mut slot = rng.gen_range(0..total);
    for (user_id, count) in pool {
        if slot < *count {
            return Some(*user_id);
        }
        slot -= count;
    }
    None
}

/// Select a winner and finalize the raffle as one transition. The raffle row
/// is exclusively locked first, so a second concurrent draw blocks and then
/// fails on the status check; a completed raffle can never be observed with
/// a null winner.
pub async fn draw_raffle(db: &PgPool, raffle_id: Uuid) -> Result<Raffle, AppError> {
    let mut tx = db.begin().await?;

    let raffle = Raffle::lock_for_update(&mut tx, raffle_id)
        .await?
        .ok_or_else(|| AppError::not_found("Raffle not found"))?;

    match raffle.status {
        RaffleStatus::Completed => {
            return Err(AppError::Conflict("Raffle already drawn".into()));
        }
        RaffleStatus::Cancelled => {
            return Err(AppError::Conflict("Raffle is cancelled".into()));
        }
        RaffleStatus::ComingSoon | RaffleStatus::Active => {}
    }

    let pool = RaffleEntry::pool_for_raffle(&mut tx, raffle_id).await?;
    if pool.is_empty() {
        return Err(AppError::Conflict("No entries for this raffle".into()));
    }

    let winner_user_id = {
        let mut rng = rand::thread_rng();
        pick_winner(&pool, &mut rng)
            .ok_or_else(|| anyhow::anyhow!("weighted pool was empty after entry check"))?
    };

    let raffle = Raffle::mark_completed(&mut tx, raffle_id, winner_user_id).await?;
    tx.commit().await?;

    info!(
        raffle_id = %raffle_id,
        winner_user_id = %winner_user_id,
        "raffle drawn"
    );
    Ok(raffle)
}

#[cfg(test)]
mod validate_tests {
    use super::*;
    use time::Duration;

    fn raffle(status: RaffleStatus) -> Raffle {
        let now = OffsetDateTime::UNIX_EPOCH;
        Raffle {
            id: Uuid::new_v4(),
            title: "1952 Topps Mickey Mantle PSA 8".into(),
            description: None,
            category: "sports".into(),
            year: Some(1952),
            grade: Some("PSA 8".into()),
            value: 250_000,
            image_url: "https://img.example/mantle.jpg".into(),
            status,
            draw_date: now + Duration::days(7),
            min_tickets: 5,
            max_tickets: Some(100),
            featured: false,
            winner_user_id: None,
            winner_selected_at: None,
            created_at: now,
        }
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::days(1)
    }

    #[test]
    fn accepts_a_valid_entry() {
        assert!(validate_entry(&raffle(RaffleStatus::Active), now(), 10, 50).is_ok());
    }

    #[test]
    fn coming_soon_gets_a_distinct_message() {
        let err = validate_entry(&raffle(RaffleStatus::ComingSoon), now(), 10, 50).unwrap_err();
        assert!(err.to_string().contains("not open yet"));
    }

    #[test]
    fn rejects_inactive_states() {
        for status in [RaffleStatus::Completed, RaffleStatus::Cancelled] {
            let err = validate_entry(&raffle(status), now(), 10, 50).unwrap_err();
            assert!(err.to_string().contains("not active"));
        }
    }

    #[test]
    fn rejects_after_draw_date() {
        let r = raffle(RaffleStatus::Active);
        let late = r.draw_date + Duration::minutes(1);
        let err = validate_entry(&r, late, 10, 50).unwrap_err();
        assert!(err.to_string().contains("ended"));
    }

    #[test]
    fn state_checks_run_before_bound_checks() {
        // Below-minimum count on an ended raffle reports the ended state.
        let r = raffle(RaffleStatus::Active);
        let late = r.draw_date + Duration::minutes(1);
        let err = validate_entry(&r, late, 1, 0).unwrap_err();
        assert!(err.to_string().contains("ended"));
    }

    #[test]
    fn enforces_ticket_bounds() {
        let r = raffle(RaffleStatus::Active);
        let err = validate_entry(&r, now(), 4, 50).unwrap_err();
        assert!(err.to_string().contains("Minimum 5"));
        let err = validate_entry(&r, now(), 101, 500).unwrap_err();
        assert!(err.to_string().contains("Maximum 100"));
    }

    #[test]
    fn insufficient_balance_reports_both_amounts() {
        let err = validate_entry(&raffle(RaffleStatus::Active), now(), 20, 7).unwrap_err();
        match err {
            AppError::InsufficientBalance {
                required,
                available,
            } => {
                assert_eq!(required, 20);
                assert_eq!(available, 7);
            }
            other => panic!("expected InsufficientBalance, got {other:?}"),
        }
    }

    #[test]
    fn bounds_checked_before_balance() {
        // Below minimum with zero balance reports the minimum, not the balance.
        let err = validate_entry(&raffle(RaffleStatus::Active), now(), 2, 0).unwrap_err();
        assert!(err.to_string().contains("Minimum 5"));
    }
}

#[cfg(test)]
mod draw_tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn empty_pool_yields_no_winner() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(pick_winner(&[], &mut rng), None);
    }

    #[test]
    fn single_entrant_always_wins() {
        let user = Uuid::new_v4();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            assert_eq!(pick_winner(&[(user, 3)], &mut rng), Some(user));
        }
    }

    #[test]
    fn win_probability_tracks_ticket_share() {
        // 3:1 ticket split should win roughly 75% of 10,000 seeded draws.
        let heavy = Uuid::new_v4();
        let light = Uuid::new_v4();
        let pool = [(heavy, 3), (light, 1)];

        let mut rng = StdRng::seed_from_u64(42);
        let mut heavy_wins = 0u32;
        for _ in 0..10_000 {
            if pick_winner(&pool, &mut rng) == Some(heavy) {
                heavy_wins += 1;
            }
        }

        let share = f64::from(heavy_wins) / 10_000.0;
        assert!(
            (0.70..=0.80).contains(&share),
            "heavy entrant won {share} of draws, expected ~0.75"
        );
    }

    #[test]
    fn split_entries_match_one_big_entry() {
        // A user holding 4 tickets across several records has the same odds
        // as one record of 4; the pool is aggregated per user upstream, so
        // selection over equal totals must be uniform across slot layout.
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let pool = [(a, 2), (b, 2)];

        let mut rng = StdRng::seed_from_u64(9);
        let mut a_wins = 0u32;
        for _ in 0..10_000 {
            if pick_winner(&pool, &mut rng) == Some(a) {
                a_wins += 1;
            }
        }
        let share = f64::from(a_wins) / 10_000.0;
        assert!((0.45..=0.55).contains(&share), "even split drifted: {share}");
    }
}
