use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use serde_json::{Value, json};

use crate::brief::BriefReport;
use crate::error::NotifyError;
use crate::notifier::Notifier;

/// Discord embeds cap at 25 fields.
const MAX_EMBED_FIELDS: usize = 25;

pub struct DiscordNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl DiscordNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url: webhook_url.into(),
        }
    }
}

impl Notifier for DiscordNotifier {
    fn send_brief(&self, report: &BriefReport) -> BoxFuture<'_, Result<(), Report<NotifyError>>> {
        let payload = build_payload(report);
        Box::pin(async move {
            let response = self
                .client
                .post(&self.webhook_url)
                .json(&payload)
                .send()
                .await
                .change_context(NotifyError::Delivery)?;

            if !response.status().is_success() {
                return Err(Report::new(NotifyError::Delivery)
                    .attach(format!("HTTP status: {}", response.status())));
            }
            Ok(())
        })
    }
}

fn build_payload(report: &BriefReport) -> Value {
    let description = match report.available_cash {
        Some(cash) => format!("available cash: {cash} KRW"),
        None => "available cash: unknown (advisory only)".to_owned(),
    };

    let fields: Vec<Value> = report
        .entries
        .iter()
        .take(MAX_EMBED_FIELDS)
        .enumerate()
        .map(|(rank, e)| {
            json!({
                "name": format!("{}. {} ({})", rank + 1, e.name, e.code),
                "value": format!(
                    "score {} | price {} | rsi {:.1}\n{}",
                    e.score, e.price, e.rsi, e.note
                ),
                "inline": false,
            })
        })
        .collect();

    json!({
        "embeds": [{
            "title": "Morning brief",
            "description": description,
            "fields": fields,
            "timestamp": report.generated_at.to_rfc3339(),
        }]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::brief::BriefEntry;

    fn entry(code: &str) -> BriefEntry {
        BriefEntry {
            code: code.into(),
            name: format!("Stock {code}"),
            score: 92,
            price: 15_000,
            rsi: 48.3,
            note: "watch".into(),
        }
    }

    #[test]
    fn payload_carries_entries_as_embed_fields() {
        let report = BriefReport {
            generated_at: Utc::now(),
            available_cash: Some(2_000_000),
            entries: vec![entry("005930"), entry("035720")],
        };
        let payload = build_payload(&report);
        let fields = payload["embeds"][0]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields[0]["name"].as_str().unwrap().contains("005930"));
        assert!(fields[0]["value"].as_str().unwrap().contains("score 92"));
        assert!(
            payload["embeds"][0]["description"]
                .as_str()
                .unwrap()
                .contains("2000000 KRW")
        );
    }

    #[test]
    fn payload_respects_field_cap() {
        let entries: Vec<BriefEntry> = (0..30).map(|i| entry(&format!("{i:06}"))).collect();
        let report = BriefReport {
            generated_at: Utc::now(),
            available_cash: None,
            entries,
        };
        let payload = build_payload(&report);
        let fields = payload["embeds"][0]["fields"].as_array().unwrap();
        assert_eq!(fields.len(), MAX_EMBED_FIELDS);
    }
}
