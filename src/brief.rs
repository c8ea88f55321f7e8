use chrono::{DateTime, Utc};
use error_stack::{Report, ResultExt};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::decision::{self, Action};
use crate::error::BriefError;
use crate::model::{TradeLog, TradeSide};
use crate::notifier::Notifier;
use crate::ranking::{self, Candidate};
use crate::storage::Storage;
use crate::trading::Broker;

/// One line of the morning brief.
#[derive(Debug, Clone)]
pub struct BriefEntry {
    pub code: String,
    pub name: String,
    pub score: u8,
    pub price: i64,
    pub rsi: f64,
    pub note: String,
}

/// The morning brief sent to the configured notifier. `available_cash` is
/// `None` when the balance inquiry failed or no broker is configured; in
/// that case every entry is advisory.
#[derive(Debug, Clone)]
pub struct BriefReport {
    pub generated_at: DateTime<Utc>,
    pub available_cash: Option<i64>,
    pub entries: Vec<BriefEntry>,
}

impl BriefReport {
    pub fn render_text(&self) -> String {
        let mut out = format!(
            "Morning brief {}\n",
            self.generated_at.format("%Y-%m-%d %H:%M UTC")
        );
        match self.available_cash {
            Some(cash) => out.push_str(&format!("available cash: {cash} KRW\n")),
            None => out.push_str("available cash: unknown (advisory only)\n"),
        }
        if self.entries.is_empty() {
            out.push_str("no candidates today\n");
        }
        for (rank, e) in self.entries.iter().enumerate() {
            out.push_str(&format!(
                "{:>2}. {} ({}) score {} price {} rsi {:.1} - {}\n",
                rank + 1,
                e.name,
                e.code,
                e.score,
                e.price,
                e.rsi,
                e.note,
            ));
        }
        out
    }
}

/// Assemble and deliver the morning brief: rank the cached double-bottom
/// snapshots, plan buys against the broker balance, place the planned
/// orders when trading is enabled, and notify the top candidates.
///
/// A failed balance inquiry downgrades the brief to advisory instead of
/// aborting it; a failed individual order is logged and reflected in the
/// entry note, and the remaining entries still go out.
pub async fn run_brief(
    storage: &dyn Storage,
    broker: Option<&dyn Broker>,
    notifier: &dyn Notifier,
    config: &AppConfig,
) -> Result<BriefReport, Report<BriefError>> {
    let snapshots = storage
        .pattern_snapshots(config.ranking.trading_pool)
        .await
        .change_context(BriefError::Snapshot)?;
    let candidates =
        ranking::select_candidates(&snapshots, &config.ranking, config.ranking.trading_pool);

    let available_cash = match broker {
        Some(broker) => match broker.available_cash().await {
            Ok(cash) => Some(cash),
            Err(e) => {
                warn!(error = ?e, "balance inquiry failed, brief degrades to advisory");
                None
            }
        },
        None => None,
    };

    let plan = decision::plan(
        &candidates,
        available_cash.unwrap_or(0),
        &config.trading,
    );

    let mut entries = Vec::with_capacity(plan.decisions.len());
    for decision in &plan.decisions {
        let candidate = &decision.candidate;
        let note = match decision.action {
            Action::Buy { quantity } => {
                execute_buy(storage, broker, config, candidate, quantity).await
            }
            Action::FundsShort => "buy signal, insufficient funds".to_owned(),
            Action::Advisory => "watch".to_owned(),
        };

        entries.push(BriefEntry {
            code: candidate.code.clone(),
            name: candidate.name.clone(),
            score: candidate.score,
            price: candidate.price,
            rsi: candidate.rsi,
            note,
        });
    }
    entries.truncate(config.ranking.alert_top_n);

    let report = BriefReport {
        generated_at: Utc::now(),
        available_cash,
        entries,
    };

    notifier
        .send_brief(&report)
        .await
        .change_context(BriefError::Deliver)?;

    info!(
        candidates = report.entries.len(),
        trading_enabled = config.trading.enabled,
        "morning brief delivered"
    );
    Ok(report)
}

async fn execute_buy(
    storage: &dyn Storage,
    broker: Option<&dyn Broker>,
    config: &AppConfig,
    candidate: &Candidate,
    quantity: u32,
) -> String {
    if !config.trading.enabled {
        return format!("buy signal, would order {quantity} shares");
    }
    let Some(broker) = broker else {
        return format!("buy signal, would order {quantity} shares");
    };

    let (message, note) = match broker.buy(&candidate.code, quantity).await {
        Ok(receipt) if receipt.accepted => (
            format!("order {} accepted", receipt.order_no),
            format!("bought {quantity} shares (order {})", receipt.order_no),
        ),
        Ok(receipt) => (
            format!("order rejected: {}", receipt.message),
            format!("order rejected: {}", receipt.message),
        ),
        Err(e) => {
            warn!(code = %candidate.code, error = ?e, "buy order failed");
            (
                "order request failed".to_owned(),
                "order request failed".to_owned(),
            )
        }
    };

    let entry = TradeLog {
        code: candidate.code.clone(),
        side: TradeSide::Buy,
        price: candidate.price,
        quantity,
        message,
        created_at: Utc::now(),
    };
    if let Err(e) = storage.log_trade(&entry).await {
        warn!(code = %candidate.code, error = ?e, "failed to log trade");
    }

    note
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use error_stack::Report;
    use futures::future::BoxFuture;

    use crate::error::NotifyError;
    use crate::model::IndicatorSet;
    use crate::storage::sqlite::SqliteStorage;

    struct RecordingNotifier {
        sent: Mutex<Vec<BriefReport>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl Notifier for RecordingNotifier {
        fn send_brief(
            &self,
            report: &BriefReport,
        ) -> BoxFuture<'_, Result<(), Report<NotifyError>>> {
            let report = report.clone();
            Box::pin(async move {
                self.sent.lock().unwrap().push(report);
                Ok(())
            })
        }
    }

    async fn seeded_storage() -> SqliteStorage {
        use chrono::NaiveDate;

        use crate::model::{Market, PriceBar, SymbolInfo};
        use crate::pattern::{CriticalPoints, PatternResult};

        let storage = SqliteStorage::open_in_memory().await.unwrap();
        storage
            .upsert_symbols(&[SymbolInfo {
                code: "005930".into(),
                name: "Samsung Electronics".into(),
                market: Market::Kospi,
            }])
            .await
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        storage
            .upsert_daily_prices(
                "005930",
                &[PriceBar {
                    date,
                    open: 72_000,
                    high: 73_000,
                    low: 71_500,
                    close: 72_500,
                    volume: 1_000_000,
                }],
            )
            .await
            .unwrap();
        storage
            .update_indicators(
                "005930",
                &[(
                    date,
                    IndicatorSet {
                        ma5: Some(72_000.0),
                        ma20: Some(71_000.0),
                        ma60: Some(70_000.0),
                        rsi: Some(50.0),
                    },
                )],
            )
            .await
            .unwrap();
        storage
            .update_pattern(
                "005930",
                &PatternResult {
                    is_double_bottom: true,
                    score: 95,
                    points: CriticalPoints {
                        low1_idx: 0,
                        low1_price: 0.0,
                        peak_idx: 0,
                        peak_price: 0.0,
                        low2_idx: 0,
                        low2_price: 0.0,
                    },
                },
                Utc::now(),
            )
            .await
            .unwrap();
        storage
    }

    #[tokio::test]
    async fn brief_without_broker_is_advisory() {
        let storage = seeded_storage().await;
        let notifier = RecordingNotifier::new();
        let config = AppConfig::default();

        let report = run_brief(&storage, None, &notifier, &config).await.unwrap();

        assert_eq!(report.available_cash, None);
        assert_eq!(report.entries.len(), 1);
        // Gate passes (score 95, rsi 50) but without cash nothing is bought.
        assert_eq!(report.entries[0].note, "buy signal, insufficient funds");
        assert_eq!(notifier.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn render_text_lists_ranked_entries() {
        let report = BriefReport {
            generated_at: Utc::now(),
            available_cash: Some(1_500_000),
            entries: vec![BriefEntry {
                code: "005930".into(),
                name: "Samsung Electronics".into(),
                score: 95,
                price: 72_500,
                rsi: 50.0,
                note: "watch".into(),
            }],
        };
        let text = report.render_text();
        assert!(text.contains("available cash: 1500000 KRW"));
        assert!(text.contains("1. Samsung Electronics (005930) score 95"));
    }

    #[test]
    fn render_text_notes_unknown_cash() {
        let report = BriefReport {
            generated_at: Utc::now(),
            available_cash: None,
            entries: Vec::new(),
        };
        let text = report.render_text();
        assert!(text.contains("unknown (advisory only)"));
        assert!(text.contains("no candidates today"));
    }
}
