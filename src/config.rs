use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_data_dir() -> String {
    "./data".into()
}

fn default_concurrency() -> usize {
    8
}

fn default_price_pages() -> usize {
    10
}

fn default_min_bars() -> usize {
    40
}

fn default_search_window() -> f64 {
    0.7
}

fn default_trough_tolerance() -> f64 {
    0.05
}

fn default_min_rebound() -> f64 {
    0.03
}

fn default_min_after_low1() -> usize {
    2
}

fn default_min_after_peak() -> usize {
    5
}

fn default_rsi_low() -> f64 {
    40.0
}

fn default_rsi_high() -> f64 {
    65.0
}

fn default_alert_top_n() -> usize {
    10
}

fn default_trading_pool() -> usize {
    30
}

fn default_target_buy_amount() -> i64 {
    1_000_000
}

fn default_auto_buy_min_score() -> u8 {
    90
}

fn default_auto_buy_max_rsi() -> f64 {
    55.0
}

fn default_notifier_kind() -> String {
    "terminal".into()
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pattern: PatternConfig,
    #[serde(default)]
    pub ranking: RankingConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Upper bound on concurrently processed symbols in batch commands.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            data_dir: default_data_dir(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FetchConfig {
    /// Daily-quote pages fetched per symbol (10 bars per page).
    #[serde(default = "default_price_pages")]
    pub price_pages: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            price_pages: default_price_pages(),
        }
    }
}

/// Double-bottom detector thresholds. The defaults are the tuned values the
/// detector shipped with; they are exposed as configuration, not derived.
#[derive(Debug, Clone, Deserialize)]
pub struct PatternConfig {
    #[serde(default = "default_min_bars")]
    pub min_bars: usize,
    /// Fraction of the series searched for the first trough.
    #[serde(default = "default_search_window")]
    pub search_window: f64,
    /// Maximum relative gap between the two troughs.
    #[serde(default = "default_trough_tolerance")]
    pub trough_tolerance: f64,
    /// Minimum relative rise of the neckline above the first trough.
    #[serde(default = "default_min_rebound")]
    pub min_rebound: f64,
    #[serde(default = "default_min_after_low1")]
    pub min_after_low1: usize,
    #[serde(default = "default_min_after_peak")]
    pub min_after_peak: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_bars: default_min_bars(),
            search_window: default_search_window(),
            trough_tolerance: default_trough_tolerance(),
            min_rebound: default_min_rebound(),
            min_after_low1: default_min_after_low1(),
            min_after_peak: default_min_after_peak(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    #[serde(default = "default_rsi_low")]
    pub rsi_low: f64,
    #[serde(default = "default_rsi_high")]
    pub rsi_high: f64,
    /// Candidates included in the notification.
    #[serde(default = "default_alert_top_n")]
    pub alert_top_n: usize,
    /// Candidates considered by the decision layer.
    #[serde(default = "default_trading_pool")]
    pub trading_pool: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            rsi_low: default_rsi_low(),
            rsi_high: default_rsi_high(),
            alert_top_n: default_alert_top_n(),
            trading_pool: default_trading_pool(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// When false the decision layer still runs, but no orders are sent.
    #[serde(default)]
    pub enabled: bool,
    /// Target KRW notional per bought symbol.
    #[serde(default = "default_target_buy_amount")]
    pub target_buy_amount: i64,
    #[serde(default = "default_auto_buy_min_score")]
    pub auto_buy_min_score: u8,
    #[serde(default = "default_auto_buy_max_rsi")]
    pub auto_buy_max_rsi: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_buy_amount: default_target_buy_amount(),
            auto_buy_min_score: default_auto_buy_min_score(),
            auto_buy_max_rsi: default_auto_buy_max_rsi(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationConfig {
    /// Accepted values: `"terminal"` | `"discord"`
    #[serde(default = "default_notifier_kind")]
    pub kind: String,
    #[serde(default)]
    pub webhook_url: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            kind: default_notifier_kind(),
            webhook_url: String::new(),
        }
    }
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_NOTIFIER_KINDS: &[&str] = &["terminal", "discord"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(config)?;
    validate_pattern(config)?;
    validate_ranking(config)?;
    validate_trading(config)?;
    validate_notification(config)?;
    Ok(())
}

fn invalid(field: impl Into<String>) -> Report<ConfigError> {
    Report::new(ConfigError::Validation {
        field: field.into(),
    })
}

fn validate_general(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    if config.general.concurrency == 0 {
        return Err(invalid("general.concurrency must be > 0"));
    }
    if config.fetch.price_pages == 0 {
        return Err(invalid("fetch.price_pages must be > 0"));
    }
    Ok(())
}

fn validate_pattern(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let p = &config.pattern;
    if !(p.search_window > 0.0 && p.search_window < 1.0) {
        return Err(invalid("pattern.search_window must be in (0, 1)"));
    }
    if p.trough_tolerance <= 0.0 {
        return Err(invalid("pattern.trough_tolerance must be > 0"));
    }
    if p.min_rebound < 0.0 {
        return Err(invalid("pattern.min_rebound must be >= 0"));
    }
    if p.min_bars < 2 {
        return Err(invalid("pattern.min_bars must be >= 2"));
    }
    if p.min_after_low1 < 2 {
        return Err(invalid("pattern.min_after_low1 must be >= 2"));
    }
    if p.min_after_peak < 2 {
        return Err(invalid("pattern.min_after_peak must be >= 2"));
    }
    Ok(())
}

fn validate_ranking(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let r = &config.ranking;
    if r.rsi_low >= r.rsi_high {
        return Err(invalid("ranking.rsi_low must be below ranking.rsi_high"));
    }
    if r.alert_top_n == 0 {
        return Err(invalid("ranking.alert_top_n must be > 0"));
    }
    if r.trading_pool == 0 {
        return Err(invalid("ranking.trading_pool must be > 0"));
    }
    Ok(())
}

fn validate_trading(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let t = &config.trading;
    if t.target_buy_amount <= 0 {
        return Err(invalid("trading.target_buy_amount must be > 0"));
    }
    if t.auto_buy_min_score > 100 {
        return Err(invalid("trading.auto_buy_min_score must be <= 100"));
    }
    Ok(())
}

fn validate_notification(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let n = &config.notification;
    if !VALID_NOTIFIER_KINDS.contains(&n.kind.as_str()) {
        return Err(invalid(format!(
            "notification.kind \"{}\" is not valid",
            n.kind
        )));
    }
    if n.kind == "discord" && n.webhook_url.is_empty() {
        return Err(invalid(
            "notification.webhook_url is required for kind \"discord\"",
        ));
    }
    Ok(())
}
