use error_stack::Report;
use futures::future::BoxFuture;

use crate::brief::BriefReport;
use crate::error::NotifyError;
use crate::notifier::Notifier;

pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn send_brief(&self, report: &BriefReport) -> BoxFuture<'_, Result<(), Report<NotifyError>>> {
        let text = report.render_text();
        Box::pin(async move {
            for line in text.lines() {
                tracing::info!("{line}");
            }
            Ok(())
        })
    }
}
