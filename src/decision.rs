use crate::config::TradingConfig;
use crate::ranking::Candidate;

/// What the decision layer wants done with one ranked candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Passed the high-confidence gate; place a market buy for `quantity`.
    Buy { quantity: u32 },
    /// Passed the gate but available cash is below the target allocation.
    FundsShort,
    /// Listed in the brief only.
    Advisory,
}

#[derive(Debug, Clone)]
pub struct Decision {
    pub candidate: Candidate,
    pub action: Action,
}

/// Outcome of planning one brief: per-candidate decisions plus the cash
/// remaining after all planned fills.
#[derive(Debug, Clone)]
pub struct Plan {
    pub decisions: Vec<Decision>,
    pub remaining_cash: i64,
}

/// Turn ranked candidates into buy decisions under a fixed per-symbol
/// target allocation.
///
/// Only candidates clearing the high-confidence gate (`score >=
/// auto_buy_min_score` and `rsi <= auto_buy_max_rsi`) are considered for
/// orders; the rest stay advisory. Quantity is `target_buy_amount / price`
/// rounded down, skipped when it lands on zero. Cash is reduced by
/// `quantity * price` after each planned fill; this running subtraction is
/// an approximation, real settlement belongs to the broker.
pub fn plan(candidates: &[Candidate], available_cash: i64, config: &TradingConfig) -> Plan {
    let mut cash = available_cash;
    let decisions = candidates
        .iter()
        .map(|candidate| {
            let action = decide_one(candidate, cash, config);
            if let Action::Buy { quantity } = action {
                cash -= i64::from(quantity) * candidate.price;
            }
            Decision {
                candidate: candidate.clone(),
                action,
            }
        })
        .collect();

    Plan {
        decisions,
        remaining_cash: cash,
    }
}

fn decide_one(candidate: &Candidate, cash: i64, config: &TradingConfig) -> Action {
    let gated = candidate.score >= config.auto_buy_min_score
        && candidate.rsi <= config.auto_buy_max_rsi;
    if !gated {
        return Action::Advisory;
    }

    if cash < config.target_buy_amount {
        return Action::FundsShort;
    }

    if candidate.price <= 0 {
        return Action::Advisory;
    }
    let quantity = config.target_buy_amount / candidate.price;
    if quantity == 0 {
        return Action::Advisory;
    }

    Action::Buy {
        quantity: quantity as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(code: &str, score: u8, price: i64, rsi: f64) -> Candidate {
        Candidate {
            code: code.into(),
            name: format!("Stock {code}"),
            score,
            price,
            rsi,
        }
    }

    fn config() -> TradingConfig {
        TradingConfig::default()
    }

    #[test]
    fn quantity_is_target_over_price_rounded_down() {
        let plan = plan(&[candidate("A", 95, 30_000, 50.0)], 5_000_000, &config());
        // 1_000_000 / 30_000 = 33.3 -> 33 shares
        assert_eq!(plan.decisions[0].action, Action::Buy { quantity: 33 });
        assert_eq!(plan.remaining_cash, 5_000_000 - 33 * 30_000);
    }

    #[test]
    fn below_gate_score_stays_advisory() {
        let plan = plan(&[candidate("A", 89, 30_000, 50.0)], 5_000_000, &config());
        assert_eq!(plan.decisions[0].action, Action::Advisory);
        assert_eq!(plan.remaining_cash, 5_000_000);
    }

    #[test]
    fn high_rsi_stays_advisory() {
        let plan = plan(&[candidate("A", 95, 30_000, 55.1)], 5_000_000, &config());
        assert_eq!(plan.decisions[0].action, Action::Advisory);
    }

    #[test]
    fn gate_boundaries_are_inclusive() {
        let plan = plan(&[candidate("A", 90, 30_000, 55.0)], 5_000_000, &config());
        assert!(matches!(plan.decisions[0].action, Action::Buy { .. }));
    }

    #[test]
    fn insufficient_cash_reported_not_bought() {
        let plan = plan(&[candidate("A", 95, 30_000, 50.0)], 999_999, &config());
        assert_eq!(plan.decisions[0].action, Action::FundsShort);
        assert_eq!(plan.remaining_cash, 999_999);
    }

    #[test]
    fn price_above_target_yields_zero_quantity_skip() {
        let plan = plan(&[candidate("A", 95, 1_500_000, 50.0)], 5_000_000, &config());
        assert_eq!(plan.decisions[0].action, Action::Advisory);
        assert_eq!(plan.remaining_cash, 5_000_000);
    }

    #[test]
    fn cash_drains_across_successive_buys() {
        let candidates = vec![
            candidate("A", 95, 500_000, 50.0),
            candidate("B", 94, 500_000, 50.0),
            candidate("C", 93, 500_000, 50.0),
        ];
        // 2_100_000 covers two full allocations, then falls short.
        let plan = plan(&candidates, 2_100_000, &config());
        assert_eq!(plan.decisions[0].action, Action::Buy { quantity: 2 });
        assert_eq!(plan.decisions[1].action, Action::Buy { quantity: 2 });
        assert_eq!(plan.decisions[2].action, Action::FundsShort);
        assert_eq!(plan.remaining_cash, 100_000);
    }
}
