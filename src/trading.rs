pub mod kis;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::TradingError;

/// Broker response to one order request. A rejection from the broker is a
/// normal receipt with `accepted == false`; only transport and auth failures
/// surface as errors.
#[derive(Debug, Clone)]
pub struct OrderReceipt {
    pub accepted: bool,
    pub order_no: String,
    pub message: String,
}

/// Brokerage connection used by the decision layer.
///
/// Uses `BoxFuture` instead of `async fn` in trait to keep the trait
/// object-safe (`dyn Broker`).
pub trait Broker: Send + Sync {
    /// Cash available for new orders, in KRW.
    fn available_cash(&self) -> BoxFuture<'_, Result<i64, Report<TradingError>>>;

    /// Place a market buy order.
    fn buy(
        &self,
        code: &str,
        quantity: u32,
    ) -> BoxFuture<'_, Result<OrderReceipt, Report<TradingError>>>;

    /// Place a market sell order.
    #[allow(dead_code)]
    fn sell(
        &self,
        code: &str,
        quantity: u32,
    ) -> BoxFuture<'_, Result<OrderReceipt, Report<TradingError>>>;
}
