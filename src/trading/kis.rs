use chrono::{DateTime, Duration, Utc};
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::TradingError;
use crate::trading::{Broker, OrderReceipt};

const KIS_REAL_BASE_URL: &str = "https://openapi.koreainvestment.com:9443";
const KIS_VIRTUAL_BASE_URL: &str = "https://openapivts.koreainvestment.com:29443";
/// Refresh the access token this long before it actually expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KisMode {
    Real,
    Virtual,
}

impl KisMode {
    fn base_url(self) -> &'static str {
        match self {
            Self::Real => KIS_REAL_BASE_URL,
            Self::Virtual => KIS_VIRTUAL_BASE_URL,
        }
    }

    /// Transaction ids differ between the production and the paper-trading
    /// environment for the same endpoint.
    fn tr_id_buy(self) -> &'static str {
        match self {
            Self::Real => "TTTC0802U",
            Self::Virtual => "VTTC0802U",
        }
    }

    fn tr_id_sell(self) -> &'static str {
        match self {
            Self::Real => "TTTC0801U",
            Self::Virtual => "VTTC0801U",
        }
    }

    fn tr_id_balance(self) -> &'static str {
        match self {
            Self::Real => "TTTC8908R",
            Self::Virtual => "VTTC8908R",
        }
    }
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Korea Investment & Securities open-API broker. Defaults to the
/// paper-trading environment; set `KIS_MODE=real` to place live orders.
pub struct KisBroker {
    client: reqwest::Client,
    mode: KisMode,
    app_key: String,
    app_secret: String,
    account_no: String,
    account_product_code: String,
    token: Mutex<Option<CachedToken>>,
}

impl KisBroker {
    /// Build a broker from `KIS_*` environment variables.
    pub fn from_env() -> Result<Self, Report<TradingError>> {
        let mode = match std::env::var("KIS_MODE").as_deref() {
            Ok("real") => KisMode::Real,
            _ => KisMode::Virtual,
        };

        Ok(Self {
            client: reqwest::Client::new(),
            mode,
            app_key: read_env("KIS_APP_KEY")?,
            app_secret: read_env("KIS_APP_SECRET")?,
            account_no: read_env("KIS_ACCOUNT_NO")?,
            account_product_code: read_env("KIS_ACCOUNT_PRDT_CODE")?,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, Report<TradingError>> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref()
            && token.expires_at > Utc::now()
        {
            return Ok(token.access_token.clone());
        }

        let url = format!("{}/oauth2/tokenP", self.mode.base_url());
        let response: TokenResponse = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "grant_type": "client_credentials",
                "appkey": self.app_key,
                "appsecret": self.app_secret,
            }))
            .send()
            .await
            .change_context(TradingError::Auth)?
            .json()
            .await
            .change_context(TradingError::Auth)?;

        let expires_at = Utc::now()
            + Duration::seconds((response.expires_in - TOKEN_EXPIRY_MARGIN_SECS).max(0));
        info!(mode = ?self.mode, "kis access token issued");

        let access_token = response.access_token.clone();
        *cached = Some(CachedToken {
            access_token: response.access_token,
            expires_at,
        });
        Ok(access_token)
    }

    async fn place_order(
        &self,
        tr_id: &str,
        code: &str,
        quantity: u32,
    ) -> Result<OrderReceipt, Report<TradingError>> {
        let token = self.access_token().await?;
        let url = format!(
            "{}/uapi/domestic-stock/v1/trading/order-cash",
            self.mode.base_url()
        );

        // ORD_DVSN 01 with unit price 0 is a market order.
        let response: OrderResponse = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {token}"))
            .header("appkey", &self.app_key)
            .header("appsecret", &self.app_secret)
            .header("tr_id", tr_id)
            .header("custtype", "P")
            .json(&serde_json::json!({
                "CANO": self.account_no,
                "ACNT_PRDT_CD": self.account_product_code,
                "PDNO": code,
                "ORD_DVSN": "01",
                "ORD_QTY": quantity.to_string(),
                "ORD_UNPR": "0",
            }))
            .send()
            .await
            .change_context(TradingError::Order { code: code.into() })?
            .json()
            .await
            .change_context(TradingError::Order { code: code.into() })?;

        let receipt = order_receipt(response);
        if !receipt.accepted {
            warn!(code, message = %receipt.message, "kis order rejected");
        }
        Ok(receipt)
    }
}

impl Broker for KisBroker {
    fn available_cash(&self) -> BoxFuture<'_, Result<i64, Report<TradingError>>> {
        Box::pin(async move {
            let token = self.access_token().await?;
            let url = format!(
                "{}/uapi/domestic-stock/v1/trading/inquire-psbl-order",
                self.mode.base_url()
            );

            let response: BalanceResponse = self
                .client
                .get(&url)
                .header("authorization", format!("Bearer {token}"))
                .header("appkey", &self.app_key)
                .header("appsecret", &self.app_secret)
                .header("tr_id", self.mode.tr_id_balance())
                .header("custtype", "P")
                .query(&[
                    ("CANO", self.account_no.as_str()),
                    ("ACNT_PRDT_CD", self.account_product_code.as_str()),
                    ("PDNO", ""),
                    ("ORD_UNPR", ""),
                    ("ORD_DVSN", "01"),
                    ("CMA_EVLU_AMT_ICLD_YN", "Y"),
                    ("OVRS_ICLD_YN", "N"),
                ])
                .send()
                .await
                .change_context(TradingError::Balance)?
                .json()
                .await
                .change_context(TradingError::Balance)?;

            if response.rt_cd != "0" {
                return Err(Report::new(TradingError::Balance).attach(response.msg1));
            }

            let output = response
                .output
                .ok_or_else(|| Report::new(TradingError::Balance).attach("empty output"))?;
            output
                .ord_psbl_cash
                .parse()
                .change_context(TradingError::Balance)
                .attach_with(|| format!("unparsable cash amount: {}", output.ord_psbl_cash))
        })
    }

    fn buy(
        &self,
        code: &str,
        quantity: u32,
    ) -> BoxFuture<'_, Result<OrderReceipt, Report<TradingError>>> {
        let code = code.to_owned();
        Box::pin(async move { self.place_order(self.mode.tr_id_buy(), &code, quantity).await })
    }

    fn sell(
        &self,
        code: &str,
        quantity: u32,
    ) -> BoxFuture<'_, Result<OrderReceipt, Report<TradingError>>> {
        let code = code.to_owned();
        Box::pin(async move { self.place_order(self.mode.tr_id_sell(), &code, quantity).await })
    }
}

fn read_env(name: &str) -> Result<String, Report<TradingError>> {
    let value = std::env::var(name)
        .map(|v| v.trim().to_owned())
        .unwrap_or_default();
    if value.is_empty() {
        return Err(Report::new(TradingError::Credentials { name: name.into() }));
    }
    Ok(value)
}

fn order_receipt(response: OrderResponse) -> OrderReceipt {
    OrderReceipt {
        accepted: response.rt_cd == "0",
        order_no: response.output.map(|o| o.odno).unwrap_or_default(),
        message: response.msg1,
    }
}

// ── API response types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    rt_cd: String,
    #[serde(default)]
    msg1: String,
    output: Option<OrderOutput>,
}

#[derive(Debug, Deserialize)]
struct OrderOutput {
    #[serde(rename = "ODNO", default)]
    odno: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    rt_cd: String,
    #[serde(default)]
    msg1: String,
    output: Option<BalanceOutput>,
}

#[derive(Debug, Deserialize)]
struct BalanceOutput {
    ord_psbl_cash: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tr_ids_differ_per_mode() {
        assert_eq!(KisMode::Virtual.tr_id_buy(), "VTTC0802U");
        assert_eq!(KisMode::Real.tr_id_buy(), "TTTC0802U");
        assert_eq!(KisMode::Virtual.tr_id_sell(), "VTTC0801U");
        assert_eq!(KisMode::Real.tr_id_sell(), "TTTC0801U");
        assert_ne!(KisMode::Virtual.base_url(), KisMode::Real.base_url());
    }

    #[test]
    fn accepted_order_response_maps_to_receipt() {
        let response: OrderResponse = serde_json::from_str(
            r#"{"rt_cd":"0","msg1":"주문 전송 완료 되었습니다.","output":{"ODNO":"0000117057"}}"#,
        )
        .unwrap();
        let receipt = order_receipt(response);
        assert!(receipt.accepted);
        assert_eq!(receipt.order_no, "0000117057");
    }

    #[test]
    fn rejected_order_is_receipt_not_error() {
        let response: OrderResponse = serde_json::from_str(
            r#"{"rt_cd":"1","msg1":"주문가능금액을 초과 했습니다."}"#,
        )
        .unwrap();
        let receipt = order_receipt(response);
        assert!(!receipt.accepted);
        assert!(receipt.order_no.is_empty());
        assert!(!receipt.message.is_empty());
    }

    #[test]
    fn balance_output_parses_cash_string() {
        let response: BalanceResponse = serde_json::from_str(
            r#"{"rt_cd":"0","msg1":"ok","output":{"ord_psbl_cash":"10000000"}}"#,
        )
        .unwrap();
        let cash: i64 = response.output.unwrap().ord_psbl_cash.parse().unwrap();
        assert_eq!(cash, 10_000_000);
    }
}
