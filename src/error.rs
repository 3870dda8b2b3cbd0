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
pub enum UniverseError {
    #[display("failed to read universe file")]
    ReadFile,
}

#[derive(Debug, Display, Error)]
pub enum SourceError {
    #[display("request for {symbol} failed")]
    Request { symbol: String },
    #[display("failed to parse response for {symbol}")]
    ResponseParse { symbol: String },
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
}

#[derive(Debug, Display, Error)]
pub enum ScreenerError {
    #[display("screener run cancelled")]
    Cancelled,
}
