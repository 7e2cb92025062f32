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
pub enum SourceError {
    #[display("invalid bar request: {reason}")]
    InvalidRequest { reason: String },
    #[display("no bars available for {ticker}")]
    DataUnavailable { ticker: String },
    #[display("bar {index}: field `{field}` is not a number")]
    MalformedField { index: usize, field: String },
    #[display("request to {provider} failed")]
    Request { provider: String },
    #[display("failed to parse response from {provider}")]
    ResponseParse { provider: String },
    #[display("failed to read bar file")]
    ReadFile,
}

#[derive(Debug, Display, Error)]
pub enum IndicatorError {
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
    #[display("{indicator} is not implemented")]
    NotImplemented { indicator: String },
}

#[derive(Debug, Display, Error)]
pub enum EngineError {
    #[display("indicator {name} failed")]
    Indicator { name: String },
    #[display("indicator task {name} did not complete")]
    TaskFailed { name: String },
    #[display("record field {field} written by more than one indicator")]
    FieldConflict { field: String },
}

#[derive(Debug, Display, Error)]
pub enum RenderError {
    #[display("failed to write records")]
    Write,
}
