use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode},
};

use crate::error::StorageError;
use crate::model::{
    IndicatorSet, Market, PriceBar, StockRecord, StockSnapshot, SymbolInfo, TradeLog,
};
use crate::pattern::PatternResult;
use crate::storage::Storage;

type StockRow = (String, String, String, i64, i64, Option<DateTime<Utc>>);

type SnapshotRow = (
    String,
    String,
    i64,
    i64,
    Option<f64>,
    Option<f64>,
    Option<f64>,
    Option<f64>,
);

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) a SQLite database at `path` and run migrations.
    pub async fn open(path: &Path) -> Result<Self, Report<StorageError>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .change_context(StorageError::Migration)
                .attach_with(|| format!("cannot create data directory: {}", parent.display()))?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .change_context(StorageError::Migration)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePool::connect_with(opts)
            .await
            .change_context(StorageError::Migration)
            .attach_with(|| format!("database path: {}", path.display()))?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .change_context(StorageError::Migration)?;

        Ok(Self { pool })
    }

    /// In-memory database for tests; same schema, no file.
    #[cfg(test)]
    pub async fn open_in_memory() -> Result<Self, Report<StorageError>> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")
            .change_context(StorageError::Migration)?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(opts)
            .await
            .change_context(StorageError::Migration)?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .change_context(StorageError::Migration)?;
        Ok(Self { pool })
    }
}

impl Storage for SqliteStorage {
    fn upsert_symbols(
        &self,
        symbols: &[SymbolInfo],
    ) -> BoxFuture<'_, Result<(), Report<StorageError>>> {
        let symbols = symbols.to_vec();
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .change_context(StorageError::Insert)?;

            for s in &symbols {
                // Classification columns keep their previous values; only
                // the listing data refreshes.
                sqlx::query(
                    "INSERT INTO stocks (code, name, market) VALUES (?, ?, ?) \
                     ON CONFLICT(code) DO UPDATE SET \
                     name = excluded.name, market = excluded.market",
                )
                .bind(&s.code)
                .bind(&s.name)
                .bind(s.market.as_str())
                .execute(&mut *tx)
                .await
                .change_context(StorageError::Insert)?;
            }

            tx.commit().await.change_context(StorageError::Insert)?;
            Ok(())
        })
    }

    fn list_stocks(&self) -> BoxFuture<'_, Result<Vec<StockRecord>, Report<StorageError>>> {
        Box::pin(async move {
            let rows: Vec<StockRow> = sqlx::query_as(
                "SELECT code, name, market, is_double_bottom, score, last_analyzed \
                 FROM stocks ORDER BY code ASC",
            )
            .fetch_all(&self.pool)
            .await
            .change_context(StorageError::Query)?;

            Ok(rows.into_iter().map(map_stock_row).collect())
        })
    }

    fn update_stock_name(
        &self,
        code: &str,
        name: &str,
    ) -> BoxFuture<'_, Result<(), Report<StorageError>>> {
        let code = code.to_string();
        let name = name.to_string();
        Box::pin(async move {
            sqlx::query("UPDATE stocks SET name = ? WHERE code = ?")
                .bind(&name)
                .bind(&code)
                .execute(&self.pool)
                .await
                .change_context(StorageError::Insert)?;
            Ok(())
        })
    }

    fn upsert_daily_prices(
        &self,
        code: &str,
        bars: &[PriceBar],
    ) -> BoxFuture<'_, Result<usize, Report<StorageError>>> {
        let code = code.to_string();
        let bars = bars.to_vec();
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .change_context(StorageError::Insert)?;

            let mut inserted = 0usize;
            for b in &bars {
                // IGNORE keeps already-computed indicator columns intact
                // when a bar is re-crawled.
                let result = sqlx::query(
                    "INSERT OR IGNORE INTO daily_prices \
                     (code, date, open, high, low, close, volume) \
                     VALUES (?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&code)
                .bind(b.date)
                .bind(b.open)
                .bind(b.high)
                .bind(b.low)
                .bind(b.close)
                .bind(b.volume)
                .execute(&mut *tx)
                .await
                .change_context(StorageError::Insert)?;
                inserted += result.rows_affected() as usize;
            }

            tx.commit().await.change_context(StorageError::Insert)?;
            Ok(inserted)
        })
    }

    fn get_price_history(
        &self,
        code: &str,
    ) -> BoxFuture<'_, Result<Vec<PriceBar>, Report<StorageError>>> {
        let code = code.to_string();
        Box::pin(async move {
            let rows: Vec<(NaiveDate, i64, i64, i64, i64, i64)> = sqlx::query_as(
                "SELECT date, open, high, low, close, volume \
                 FROM daily_prices WHERE code = ? ORDER BY date ASC",
            )
            .bind(&code)
            .fetch_all(&self.pool)
            .await
            .change_context(StorageError::Query)?;

            Ok(rows
                .into_iter()
                .map(|(date, open, high, low, close, volume)| PriceBar {
                    date,
                    open,
                    high,
                    low,
                    close,
                    volume,
                })
                .collect())
        })
    }

    fn update_indicators(
        &self,
        code: &str,
        rows: &[(NaiveDate, IndicatorSet)],
    ) -> BoxFuture<'_, Result<(), Report<StorageError>>> {
        let code = code.to_string();
        let rows = rows.to_vec();
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .change_context(StorageError::Insert)?;

            for (date, set) in &rows {
                sqlx::query(
                    "UPDATE daily_prices SET ma5 = ?, ma20 = ?, ma60 = ?, rsi = ? \
                     WHERE code = ? AND date = ?",
                )
                .bind(set.ma5)
                .bind(set.ma20)
                .bind(set.ma60)
                .bind(set.rsi)
                .bind(&code)
                .bind(date)
                .execute(&mut *tx)
                .await
                .change_context(StorageError::Insert)?;
            }

            tx.commit().await.change_context(StorageError::Insert)?;
            Ok(())
        })
    }

    fn update_pattern(
        &self,
        code: &str,
        result: &PatternResult,
        analyzed_at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<(), Report<StorageError>>> {
        let code = code.to_string();
        let is_double_bottom = result.is_double_bottom;
        let score = result.score;
        Box::pin(async move {
            sqlx::query(
                "UPDATE stocks SET is_double_bottom = ?, score = ?, last_analyzed = ? \
                 WHERE code = ?",
            )
            .bind(is_double_bottom)
            .bind(i64::from(score))
            .bind(analyzed_at)
            .bind(&code)
            .execute(&self.pool)
            .await
            .change_context(StorageError::Insert)?;
            Ok(())
        })
    }

    fn pattern_snapshots(
        &self,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<StockSnapshot>, Report<StorageError>>> {
        Box::pin(async move {
            let rows: Vec<SnapshotRow> = sqlx::query_as(
                "SELECT s.code, s.name, s.score, p.close, p.ma5, p.ma20, p.ma60, p.rsi \
                 FROM stocks s \
                 JOIN daily_prices p ON p.code = s.code \
                 WHERE s.is_double_bottom = 1 \
                 AND p.date = (SELECT MAX(date) FROM daily_prices WHERE code = s.code) \
                 ORDER BY s.score DESC, s.code ASC \
                 LIMIT ?",
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .change_context(StorageError::Query)?;

            Ok(rows
                .into_iter()
                .map(|(code, name, score, close, ma5, ma20, ma60, rsi)| StockSnapshot {
                    code,
                    name,
                    is_double_bottom: true,
                    score: score.clamp(0, 100) as u8,
                    close,
                    ma5,
                    ma20,
                    ma60,
                    rsi,
                })
                .collect())
        })
    }

    fn log_trade(&self, entry: &TradeLog) -> BoxFuture<'_, Result<(), Report<StorageError>>> {
        let entry = entry.clone();
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO trade_log (code, side, price, quantity, message, created_at) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&entry.code)
            .bind(entry.side.as_str())
            .bind(entry.price)
            .bind(i64::from(entry.quantity))
            .bind(&entry.message)
            .bind(entry.created_at)
            .execute(&self.pool)
            .await
            .change_context(StorageError::Insert)?;
            Ok(())
        })
    }
}

fn map_stock_row((code, name, market, is_double_bottom, score, last_analyzed): StockRow) -> StockRecord {
    StockRecord {
        code,
        name,
        market: Market::from_str(&market),
        is_double_bottom: is_double_bottom != 0,
        score: score.clamp(0, 100) as u8,
        last_analyzed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TradeSide;
    use crate::pattern::CriticalPoints;

    async fn in_memory_storage() -> SqliteStorage {
        SqliteStorage::open_in_memory().await.unwrap()
    }

    fn symbol(code: &str, name: &str) -> SymbolInfo {
        SymbolInfo {
            code: code.into(),
            name: name.into(),
            market: Market::Kospi,
        }
    }

    fn bar(date: NaiveDate, close: i64) -> PriceBar {
        PriceBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn pattern_result(found: bool, score: u8) -> PatternResult {
        PatternResult {
            is_double_bottom: found,
            score,
            points: CriticalPoints {
                low1_idx: 0,
                low1_price: 0.0,
                peak_idx: 0,
                peak_price: 0.0,
                low2_idx: 0,
                low2_price: 0.0,
            },
        }
    }

    #[tokio::test]
    async fn symbol_upsert_preserves_classification() {
        let storage = in_memory_storage().await;
        storage
            .upsert_symbols(&[symbol("005930", "Samsung Electronics")])
            .await
            .unwrap();
        storage
            .update_pattern("005930", &pattern_result(true, 92), Utc::now())
            .await
            .unwrap();

        // Re-sync the listing with a renamed entry.
        storage
            .upsert_symbols(&[symbol("005930", "Samsung Elec")])
            .await
            .unwrap();

        let stocks = storage.list_stocks().await.unwrap();
        assert_eq!(stocks.len(), 1);
        assert_eq!(stocks[0].name, "Samsung Elec");
        assert!(stocks[0].is_double_bottom);
        assert_eq!(stocks[0].score, 92);
        assert!(stocks[0].last_analyzed.is_some());
    }

    #[tokio::test]
    async fn daily_prices_dedupe_per_date() {
        let storage = in_memory_storage().await;
        storage.upsert_symbols(&[symbol("005930", "A")]).await.unwrap();

        let inserted = storage
            .upsert_daily_prices("005930", &[bar(day(4), 100), bar(day(5), 110)])
            .await
            .unwrap();
        assert_eq!(inserted, 2);

        // Re-crawl overlaps one existing date.
        let inserted = storage
            .upsert_daily_prices("005930", &[bar(day(5), 999), bar(day(6), 120)])
            .await
            .unwrap();
        assert_eq!(inserted, 1);

        let history = storage.get_price_history("005930").await.unwrap();
        assert_eq!(history.len(), 3);
        // Ascending order, first insert wins on the duplicate date.
        assert_eq!(history[0].close, 100);
        assert_eq!(history[1].close, 110);
        assert_eq!(history[2].close, 120);
    }

    #[tokio::test]
    async fn indicators_update_in_place() {
        let storage = in_memory_storage().await;
        storage.upsert_symbols(&[symbol("005930", "A")]).await.unwrap();
        storage
            .upsert_daily_prices("005930", &[bar(day(4), 100)])
            .await
            .unwrap();

        let set = IndicatorSet {
            ma5: Some(101.5),
            ma20: None,
            ma60: None,
            rsi: Some(48.0),
        };
        storage
            .update_indicators("005930", &[(day(4), set)])
            .await
            .unwrap();
        storage
            .update_pattern("005930", &pattern_result(true, 80), Utc::now())
            .await
            .unwrap();

        let snapshots = storage.pattern_snapshots(10).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].ma5, Some(101.5));
        assert_eq!(snapshots[0].ma20, None);
        assert_eq!(snapshots[0].rsi, Some(48.0));
    }

    #[tokio::test]
    async fn snapshots_use_latest_bar_and_score_order() {
        let storage = in_memory_storage().await;
        storage
            .upsert_symbols(&[symbol("000100", "A"), symbol("000200", "B"), symbol("000300", "C")])
            .await
            .unwrap();

        for code in ["000100", "000200"] {
            storage
                .upsert_daily_prices(code, &[bar(day(4), 100), bar(day(5), 110)])
                .await
                .unwrap();
        }
        storage
            .upsert_daily_prices("000300", &[bar(day(4), 100)])
            .await
            .unwrap();

        storage
            .update_pattern("000100", &pattern_result(true, 70), Utc::now())
            .await
            .unwrap();
        storage
            .update_pattern("000200", &pattern_result(true, 90), Utc::now())
            .await
            .unwrap();
        // Not flagged: must not appear.
        storage
            .update_pattern("000300", &pattern_result(false, 0), Utc::now())
            .await
            .unwrap();

        let snapshots = storage.pattern_snapshots(10).await.unwrap();
        let codes: Vec<&str> = snapshots.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, ["000200", "000100"]);
        // Latest bar, not the first one.
        assert_eq!(snapshots[0].close, 110);
    }

    #[tokio::test]
    async fn trade_log_insert() {
        let storage = in_memory_storage().await;
        storage.upsert_symbols(&[symbol("005930", "A")]).await.unwrap();
        storage
            .log_trade(&TradeLog {
                code: "005930".into(),
                side: TradeSide::Buy,
                price: 70_000,
                quantity: 14,
                message: "order accepted".into(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
    }
}
