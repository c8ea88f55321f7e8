use std::sync::Arc;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use scraper::{Html, Selector};
use tracing::info;

use crate::error::FetchError;
use crate::fetch::ListingFetcher;
use crate::model::{Market, SymbolInfo};

const KIND_LIST_URL: &str = "https://kind.krx.co.kr/corpgeneral/corpList.do";
const KRX_REQUESTS_PER_SECOND: u32 = 2;

/// Listing fetcher backed by the KRX KIND corporation list download, which
/// returns the full roster of one market as an HTML table.
pub struct KrxFetcher {
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl KrxFetcher {
    pub fn new() -> Self {
        let quota = Quota::per_second(nonzero!(KRX_REQUESTS_PER_SECOND));
        Self {
            client: reqwest::Client::new(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    async fn fetch_market(&self, market: Market) -> Result<Vec<SymbolInfo>, Report<FetchError>> {
        self.rate_limiter.until_ready().await;

        let market_type = match market {
            Market::Kospi => "stockMkt",
            Market::Kosdaq => "kosdaqMkt",
            Market::Unknown => {
                return Err(Report::new(FetchError::Request {
                    origin: "krx".into(),
                })
                .attach("cannot download listing for an unknown market"));
            }
        };

        let response = self
            .client
            .get(KIND_LIST_URL)
            .query(&[
                ("method", "download"),
                ("searchType", "13"),
                ("marketType", market_type),
            ])
            .send()
            .await
            .change_context(FetchError::Request {
                origin: "krx".into(),
            })?;

        if !response.status().is_success() {
            return Err(Report::new(FetchError::Request {
                origin: "krx".into(),
            })
            .attach(format!("HTTP status: {}", response.status())));
        }

        let html = response.text().await.change_context(FetchError::Request {
            origin: "krx".into(),
        })?;

        let symbols = parse_listing_table(&html, market);
        info!(market = %market, count = symbols.len(), "krx listing downloaded");
        Ok(symbols)
    }
}

impl Default for KrxFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ListingFetcher for KrxFetcher {
    fn fetch_listing(&self) -> BoxFuture<'_, Result<Vec<SymbolInfo>, Report<FetchError>>> {
        Box::pin(async move {
            let mut symbols = self.fetch_market(Market::Kospi).await?;
            symbols.extend(self.fetch_market(Market::Kosdaq).await?);

            if symbols.is_empty() {
                return Err(Report::new(FetchError::NoData {
                    origin: "krx".into(),
                }));
            }
            Ok(symbols)
        })
    }
}

/// Extract (name, code) pairs from the KIND download table. The download
/// serves codes as bare integers, so leading zeros must be restored to the
/// canonical six-digit form.
fn parse_listing_table(html: &str, market: Market) -> Vec<SymbolInfo> {
    let document = Html::parse_document(html);
    let (Ok(tr_selector), Ok(td_selector)) = (Selector::parse("tr"), Selector::parse("td")) else {
        return Vec::new();
    };

    let mut symbols = Vec::new();
    for row in document.select(&tr_selector) {
        let cells: Vec<String> = row
            .select(&td_selector)
            .map(|td| td.text().collect::<String>().trim().to_owned())
            .collect();
        if cells.len() < 2 {
            continue;
        }

        let name = cells[0].clone();
        let Some(code) = normalize_code(&cells[1]) else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        symbols.push(SymbolInfo { code, name, market });
    }
    symbols
}

fn normalize_code(raw: &str) -> Option<String> {
    if raw.is_empty() || raw.len() > 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(format!("{raw:0>6}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_page(rows: &str) -> String {
        format!(
            "<html><body><table>\
             <tr><th>회사명</th><th>종목코드</th><th>업종</th></tr>\
             {rows}\
             </table></body></html>"
        )
    }

    #[test]
    fn parses_rows_and_restores_leading_zeros() {
        let html = listing_page(
            "<tr><td>삼성전자</td><td>5930</td><td>전자</td></tr>\
             <tr><td>카카오</td><td>35720</td><td>서비스</td></tr>",
        );
        let symbols = parse_listing_table(&html, Market::Kospi);
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].code, "005930");
        assert_eq!(symbols[0].name, "삼성전자");
        assert_eq!(symbols[0].market, Market::Kospi);
        assert_eq!(symbols[1].code, "035720");
    }

    #[test]
    fn header_and_malformed_rows_skipped() {
        let html = listing_page(
            "<tr><td>유효</td><td>123456</td></tr>\
             <tr><td>코드없음</td><td>abc123</td></tr>\
             <tr><td></td><td>111111</td></tr>",
        );
        let symbols = parse_listing_table(&html, Market::Kosdaq);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].code, "123456");
        assert_eq!(symbols[0].market, Market::Kosdaq);
    }

    #[test]
    fn overlong_codes_rejected() {
        assert_eq!(normalize_code("1234567"), None);
        assert_eq!(normalize_code("5930"), Some("005930".into()));
        assert_eq!(normalize_code(""), None);
    }

    /// Integration test: requires network access. Run with `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn integration_fetch_listing() {
        let fetcher = KrxFetcher::new();
        let symbols = fetcher.fetch_listing().await.unwrap();
        assert!(symbols.len() > 1000);
    }
}
