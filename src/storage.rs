pub mod sqlite;

use chrono::{DateTime, NaiveDate, Utc};
use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::StorageError;
use crate::model::{IndicatorSet, PriceBar, StockRecord, StockSnapshot, SymbolInfo, TradeLog};
use crate::pattern::PatternResult;

/// Persistence boundary. The analyzers never touch storage directly; they
/// compute values and the orchestration layer stores them through this
/// trait, which keeps every computation testable without a database.
///
/// Uses `BoxFuture` instead of `async fn` in trait to keep the trait
/// object-safe (`dyn Storage`).
pub trait Storage: Send + Sync {
    /// Insert or refresh listing entries; existing classification fields
    /// are left untouched.
    fn upsert_symbols(&self, symbols: &[SymbolInfo])
    -> BoxFuture<'_, Result<(), Report<StorageError>>>;

    fn list_stocks(&self) -> BoxFuture<'_, Result<Vec<StockRecord>, Report<StorageError>>>;

    /// Update a stock's display name (resolved during crawling).
    fn update_stock_name(
        &self,
        code: &str,
        name: &str,
    ) -> BoxFuture<'_, Result<(), Report<StorageError>>>;

    /// Insert bars that are not stored yet; returns how many were new.
    /// One bar per (code, date) is enforced by the schema.
    fn upsert_daily_prices(
        &self,
        code: &str,
        bars: &[PriceBar],
    ) -> BoxFuture<'_, Result<usize, Report<StorageError>>>;

    /// Full price history for one symbol, ascending by date.
    fn get_price_history(
        &self,
        code: &str,
    ) -> BoxFuture<'_, Result<Vec<PriceBar>, Report<StorageError>>>;

    /// Store derived indicator values for the given dates.
    fn update_indicators(
        &self,
        code: &str,
        rows: &[(NaiveDate, IndicatorSet)],
    ) -> BoxFuture<'_, Result<(), Report<StorageError>>>;

    /// Overwrite the symbol's cached classification with a fresh result.
    fn update_pattern(
        &self,
        code: &str,
        result: &PatternResult,
        analyzed_at: DateTime<Utc>,
    ) -> BoxFuture<'_, Result<(), Report<StorageError>>>;

    /// Flagged symbols joined with their latest bar and indicators, score
    /// descending, at most `limit` rows.
    fn pattern_snapshots(
        &self,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<StockSnapshot>, Report<StorageError>>>;

    fn log_trade(&self, entry: &TradeLog) -> BoxFuture<'_, Result<(), Report<StorageError>>>;
}
