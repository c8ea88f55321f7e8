use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use error_stack::Report;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::PatternConfig;
use crate::error::StorageError;
use crate::indicator;
use crate::model::IndicatorSet;
use crate::pattern;
use crate::storage::Storage;

/// Indicator rows written back per symbol. Older bars keep whatever values
/// they already have; only the recent window matters downstream.
const INDICATOR_ROWS_PERSISTED: usize = 30;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisSummary {
    /// Symbols that produced a classification (positive or negative).
    pub analyzed: usize,
    /// Symbols classified as a double bottom.
    pub found: usize,
    /// Symbols with too little history to classify.
    pub skipped: usize,
    /// Symbols that hit a storage error.
    pub failed: usize,
}

enum Outcome {
    Found,
    NotFound,
    Skipped,
    Failed,
}

/// Run indicator computation and pattern classification over every tracked
/// symbol, at most `concurrency` symbols in flight. One symbol failing or
/// lacking history never stops the batch.
pub async fn analyze_all(
    storage: Arc<dyn Storage>,
    pattern_config: &PatternConfig,
    concurrency: usize,
) -> Result<AnalysisSummary, Report<StorageError>> {
    let stocks = storage.list_stocks().await?;
    info!(symbols = stocks.len(), concurrency, "analysis batch started");

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(stocks.len());

    for stock in stocks {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let storage = Arc::clone(&storage);
        let pattern_config = pattern_config.clone();
        handles.push(tokio::spawn(async move {
            let outcome = analyze_one(storage.as_ref(), &pattern_config, &stock.code).await;
            drop(permit);
            outcome
        }));
    }

    let mut summary = AnalysisSummary::default();
    for handle in handles {
        match handle.await {
            Ok(Outcome::Found) => {
                summary.analyzed += 1;
                summary.found += 1;
            }
            Ok(Outcome::NotFound) => summary.analyzed += 1,
            Ok(Outcome::Skipped) => summary.skipped += 1,
            Ok(Outcome::Failed) | Err(_) => summary.failed += 1,
        }
    }

    info!(
        analyzed = summary.analyzed,
        found = summary.found,
        skipped = summary.skipped,
        failed = summary.failed,
        "analysis batch finished"
    );
    Ok(summary)
}

async fn analyze_one(
    storage: &dyn Storage,
    pattern_config: &PatternConfig,
    code: &str,
) -> Outcome {
    let history = match storage.get_price_history(code).await {
        Ok(history) => history,
        Err(e) => {
            warn!(code, error = ?e, "failed to load price history");
            return Outcome::Failed;
        }
    };
    if history.is_empty() {
        return Outcome::Skipped;
    }

    let sets = indicator::compute_sets(&history);
    let rows: Vec<(NaiveDate, IndicatorSet)> = history
        .iter()
        .zip(sets)
        .map(|(bar, set)| (bar.date, set))
        .collect();
    let tail_start = rows.len().saturating_sub(INDICATOR_ROWS_PERSISTED);
    if let Err(e) = storage.update_indicators(code, &rows[tail_start..]).await {
        warn!(code, error = ?e, "failed to store indicators");
        return Outcome::Failed;
    }

    let closes = indicator::close_prices(&history);
    match pattern::detect(&closes, pattern_config) {
        Ok(result) => {
            if let Err(e) = storage.update_pattern(code, &result, Utc::now()).await {
                warn!(code, error = ?e, "failed to store classification");
                return Outcome::Failed;
            }
            if result.is_double_bottom {
                debug!(code, score = result.score, "double bottom detected");
                Outcome::Found
            } else {
                Outcome::NotFound
            }
        }
        // Too little history is not a negative classification; the cached
        // flag stays as it was.
        Err(e) => {
            debug!(code, error = %e.current_context(), "symbol skipped");
            Outcome::Skipped
        }
    }
}
