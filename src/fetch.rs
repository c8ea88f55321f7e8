pub mod krx;
pub mod naver;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::FetchError;
use crate::model::{PriceBar, SymbolInfo};

/// Source of daily quotes for a single symbol.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn PriceFetcher`).
pub trait PriceFetcher: Send + Sync {
    /// Fetch up to `pages` pages of daily bars, oldest first. Implementations
    /// stop early when the source runs out of history.
    fn fetch_daily_bars(
        &self,
        code: &str,
        pages: usize,
    ) -> BoxFuture<'_, Result<Vec<PriceBar>, Report<FetchError>>>;

    /// Resolve the display name for a symbol code.
    fn fetch_stock_name(&self, code: &str) -> BoxFuture<'_, Result<String, Report<FetchError>>>;
}

/// Source of the full exchange listing (code, name, market).
pub trait ListingFetcher: Send + Sync {
    fn fetch_listing(&self) -> BoxFuture<'_, Result<Vec<SymbolInfo>, Report<FetchError>>>;
}
