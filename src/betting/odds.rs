//! Odds math for placement and settlement.
//!
//! Odds are decimal (European) and frozen at placement time. Express and
//! system bets multiply their legs; a voided or pushed leg collapses to 1.0
//! when winnings are recomputed at settlement.

use crate::error::BetError;
use crate::models::{BetSelection, BetType, SelectionStatus};

/// Parse a quoted odds string, enforcing the configured floor.
pub fn parse_odds(raw: &str, min_odds: f64) -> Result<f64, BetError> {
    let odds: f64 = raw
        .trim()
        .parse()
        .map_err(|_| BetError::InvalidOdds(raw.to_string()))?;
    if !odds.is_finite() || odds < min_odds {
        return Err(BetError::InvalidOdds(raw.to_string()));
    }
    Ok(odds)
}

/// Combined odds for a bet: passthrough for singles, product for
/// express/system legs.
pub fn total_odds(bet_type: BetType, leg_odds: &[f64]) -> f64 {
    match bet_type {
        BetType::Single => leg_odds.first().copied().unwrap_or(0.0),
        BetType::Express | BetType::System => leg_odds.iter().product(),
    }
}

/// Gross payout on a winning bet, rounded to whole cents.
pub fn potential_winnings_cents(stake_cents: i64, total_odds: f64) -> i64 {
    (stake_cents as f64 * total_odds).round() as i64
}

/// Recompute the payout from the legs that actually ran: void/push legs
/// contribute odds of 1.0, shrinking the product accordingly.
pub fn surviving_winnings_cents(stake_cents: i64, selections: &[BetSelection]) -> i64 {
    let surviving_odds: f64 = selections
        .iter()
        .map(|s| if s.status.is_voided() { 1.0 } else { s.odds })
        .product();
    potential_winnings_cents(stake_cents, surviving_odds)
}

/// Leg-count sanity per bet type: singles carry exactly one selection,
/// combination bets at least two.
pub fn validate_leg_count(bet_type: BetType, count: usize) -> Result<(), BetError> {
    let ok = match bet_type {
        BetType::Single => count == 1,
        BetType::Express | BetType::System => count >= 2,
    };
    if ok {
        Ok(())
    } else {
        Err(BetError::InvalidOdds(format!(
            "{} bet with {} selections",
            bet_type.as_str(),
            count
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn selection(odds: f64, status: SelectionStatus) -> BetSelection {
        BetSelection {
            id: Uuid::new_v4().to_string(),
            bet_id: "b".into(),
            match_id: "m".into(),
            market_id: "mk".into(),
            outcome_id: "o".into(),
            odds,
            status,
        }
    }

    #[test]
    fn parse_enforces_floor_and_finiteness() {
        assert_eq!(parse_odds("2.50", 1.01).unwrap(), 2.50);
        assert!(parse_odds("1.00", 1.01).is_err());
        assert!(parse_odds("inf", 1.01).is_err());
        assert!(parse_odds("NaN", 1.01).is_err());
        assert!(parse_odds("two", 1.01).is_err());
    }

    #[test]
    fn express_odds_multiply() {
        let total = total_odds(BetType::Express, &[2.00, 1.80]);
        assert!((total - 3.60).abs() < 1e-9);
        assert_eq!(potential_winnings_cents(500, total), 1_800);
    }

    #[test]
    fn single_odds_pass_through() {
        assert_eq!(total_odds(BetType::Single, &[2.50]), 2.50);
        assert_eq!(potential_winnings_cents(1_000, 2.50), 2_500);
    }

    #[test]
    fn void_leg_collapses_to_evens() {
        let legs = vec![
            selection(2.00, SelectionStatus::Win),
            selection(1.80, SelectionStatus::Void),
        ];
        // 500 * 2.00 * 1.0 = 1000
        assert_eq!(surviving_winnings_cents(500, &legs), 1_000);

        let pushed = vec![
            selection(2.00, SelectionStatus::Push),
            selection(1.80, SelectionStatus::Push),
        ];
        // All legs voided: payout equals the stake (refund path)
        assert_eq!(surviving_winnings_cents(500, &pushed), 500);
    }

    #[test]
    fn leg_count_per_type() {
        assert!(validate_leg_count(BetType::Single, 1).is_ok());
        assert!(validate_leg_count(BetType::Single, 2).is_err());
        assert!(validate_leg_count(BetType::Express, 2).is_ok());
        assert!(validate_leg_count(BetType::Express, 1).is_err());
    }
}
