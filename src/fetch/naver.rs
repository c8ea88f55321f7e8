use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use scraper::{Html, Selector};
use tracing::debug;

use crate::error::FetchError;
use crate::fetch::PriceFetcher;
use crate::model::PriceBar;

const NAVER_BASE_URL: &str = "https://finance.naver.com";
/// Unofficial endpoint; keep request volume modest.
const NAVER_REQUESTS_PER_SECOND: u32 = 5;
/// Naver serves an empty quote table to clients without a browser UA.
const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36";

/// Daily-quote fetcher backed by the Naver Finance quote pages
/// (`item/sise_day.naver`, ten bars per page, newest first).
pub struct NaverFetcher {
    client: reqwest::Client,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl NaverFetcher {
    pub fn new() -> Self {
        let quota = Quota::per_second(nonzero!(NAVER_REQUESTS_PER_SECOND));
        Self {
            client: reqwest::Client::new(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    async fn fetch_page(&self, code: &str, page: usize) -> Result<String, Report<FetchError>> {
        // Wait for rate limiter before making the request
        self.rate_limiter.until_ready().await;

        let url = format!("{NAVER_BASE_URL}/item/sise_day.naver");
        let page = page.to_string();
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(&[("code", code), ("page", page.as_str())])
            .send()
            .await
            .change_context(FetchError::Request {
                origin: "naver".into(),
            })?;

        if !response.status().is_success() {
            return Err(Report::new(FetchError::Request {
                origin: "naver".into(),
            })
            .attach(format!("HTTP status: {}", response.status())));
        }

        // The page is served as EUC-KR; reqwest transcodes from the
        // Content-Type charset.
        response.text().await.change_context(FetchError::Request {
            origin: "naver".into(),
        })
    }
}

impl Default for NaverFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceFetcher for NaverFetcher {
    fn fetch_daily_bars(
        &self,
        code: &str,
        pages: usize,
    ) -> BoxFuture<'_, Result<Vec<PriceBar>, Report<FetchError>>> {
        let code = code.to_owned();
        Box::pin(async move {
            let mut bars: Vec<PriceBar> = Vec::with_capacity(pages * 10);
            let mut seen: HashSet<NaiveDate> = HashSet::new();

            for page in 1..=pages {
                let html = self.fetch_page(&code, page).await?;
                let page_bars = parse_daily_page(&html);

                // Past the last page Naver repeats the final page, so a page
                // contributing nothing new means the history is exhausted.
                let before = bars.len();
                for bar in page_bars {
                    if seen.insert(bar.date) {
                        bars.push(bar);
                    }
                }
                if bars.len() == before {
                    break;
                }

                debug!(code = %code, page, fetched = bars.len(), "naver quote fetch progress");
            }

            if bars.is_empty() {
                return Err(Report::new(FetchError::NoData {
                    origin: "naver".into(),
                })
                .attach(format!("code: {code}")));
            }

            // Pages arrive newest-first; callers expect ascending dates.
            bars.sort_by_key(|b| b.date);
            Ok(bars)
        })
    }

    fn fetch_stock_name(&self, code: &str) -> BoxFuture<'_, Result<String, Report<FetchError>>> {
        let code = code.to_owned();
        Box::pin(async move {
            self.rate_limiter.until_ready().await;

            let url = format!("{NAVER_BASE_URL}/item/main.naver");
            let response = self
                .client
                .get(&url)
                .header(reqwest::header::USER_AGENT, USER_AGENT)
                .query(&[("code", code.as_str())])
                .send()
                .await
                .change_context(FetchError::Request {
                    origin: "naver".into(),
                })?;

            let html = response.text().await.change_context(FetchError::Request {
                origin: "naver".into(),
            })?;

            parse_company_name(&html).ok_or_else(|| {
                Report::new(FetchError::ResponseParse {
                    origin: "naver".into(),
                })
                .attach(format!("company name not found for code: {code}"))
            })
        })
    }
}

/// Extract daily bars from one `sise_day` page. Header rows, separator rows
/// and the pager row have fewer than seven cells and are skipped.
fn parse_daily_page(html: &str) -> Vec<PriceBar> {
    let document = Html::parse_document(html);
    let (Ok(tr_selector), Ok(td_selector)) = (Selector::parse("tr"), Selector::parse("td")) else {
        return Vec::new();
    };

    let mut bars = Vec::new();
    for row in document.select(&tr_selector) {
        let cells: Vec<String> = row
            .select(&td_selector)
            .map(|td| td.text().collect::<String>().trim().to_owned())
            .collect();
        if cells.len() < 7 {
            continue;
        }

        // Columns: date, close, change, open, high, low, volume.
        let Some(date) = parse_quote_date(&cells[0]) else {
            continue;
        };
        let (Some(close), Some(open), Some(high), Some(low), Some(volume)) = (
            parse_quote_number(&cells[1]),
            parse_quote_number(&cells[3]),
            parse_quote_number(&cells[4]),
            parse_quote_number(&cells[5]),
            parse_quote_number(&cells[6]),
        ) else {
            continue;
        };

        bars.push(PriceBar {
            date,
            open,
            high,
            low,
            close,
            volume,
        });
    }
    bars
}

fn parse_company_name(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("div.wrap_company h2 a").ok()?;
    let element = document.select(&selector).next()?;
    let name = element.text().collect::<String>().trim().to_owned();
    if name.is_empty() { None } else { Some(name) }
}

fn parse_quote_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text, "%Y.%m.%d").ok()
}

fn parse_quote_number(text: &str) -> Option<i64> {
    let digits = text.replace(',', "");
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}
