pub mod discord;
pub mod terminal;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::brief::BriefReport;
use crate::error::NotifyError;

/// Sink for the morning brief.
///
/// Uses `BoxFuture` instead of `async fn` in trait to keep the trait
/// object-safe (`dyn Notifier`).
pub trait Notifier: Send + Sync {
    fn send_brief(&self, report: &BriefReport) -> BoxFuture<'_, Result<(), Report<NotifyError>>>;
}
