use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum FetchError {
    #[display("request to {origin} failed")]
    Request { origin: String },
    #[display("failed to parse response from {origin}")]
    ResponseParse { origin: String },
    #[display("no data returned from {origin}")]
    NoData { origin: String },
}

#[derive(Debug, Display, Error)]
pub enum StorageError {
    #[display("database migration failed")]
    Migration,
    #[display("failed to insert data")]
    Insert,
    #[display("failed to query data")]
    Query,
}

/// Both "series too short overall" and "too few bars after a located
/// critical point" surface as `InsufficientData`. Callers skip the symbol;
/// neither case may be reported as a negative pattern result.
#[derive(Debug, Display, Error)]
pub enum PatternError {
    #[display("insufficient data: need {required}, got {available}")]
    InsufficientData { required: usize, available: usize },
}

#[derive(Debug, Display, Error)]
pub enum TradingError {
    #[display("broker credentials missing: {name}")]
    Credentials { name: String },
    #[display("token issuance failed")]
    Auth,
    #[display("balance inquiry failed")]
    Balance,
    #[display("order request for {code} failed")]
    Order { code: String },
}

#[derive(Debug, Display, Error)]
pub enum NotifyError {
    #[display("failed to deliver notification")]
    Delivery,
}

#[derive(Debug, Display, Error)]
pub enum BriefError {
    #[display("failed to load candidate snapshots")]
    Snapshot,
    #[display("failed to deliver the brief")]
    Deliver,
}
