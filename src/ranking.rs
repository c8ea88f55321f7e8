use crate::config::RankingConfig;
use crate::model::StockSnapshot;

/// One symbol that passed every filter, in the shape downstream consumers
/// (notification, trading) receive. No detector internals leak past here.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub code: String,
    pub name: String,
    pub score: u8,
    pub price: i64,
    pub rsi: f64,
}

/// Filter snapshots down to tradable double-bottom candidates and rank them.
///
/// Base filter: the cached pattern flag. Secondary filter: short-term trend
/// above medium-term (`ma5 > ma20`) and RSI inside the configured band;
/// rows with any of those indicators absent are excluded rather than
/// defaulted. Ordering is score descending with ties broken by code
/// ascending, so identical inputs always rank identically. Truncation to
/// `limit` happens only after sorting.
pub fn select_candidates(
    snapshots: &[StockSnapshot],
    config: &RankingConfig,
    limit: usize,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = snapshots
        .iter()
        .filter(|s| s.is_double_bottom)
        .filter_map(|s| {
            let ma5 = s.ma5?;
            let ma20 = s.ma20?;
            let rsi = s.rsi?;
            if ma5 > ma20 && rsi >= config.rsi_low && rsi <= config.rsi_high {
                Some(Candidate {
                    code: s.code.clone(),
                    name: s.name.clone(),
                    score: s.score,
                    price: s.close,
                    rsi,
                })
            } else {
                None
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.code.cmp(&b.code)));
    candidates.truncate(limit);
    candidates
}
