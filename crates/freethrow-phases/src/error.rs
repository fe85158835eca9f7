#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PhaseError {
    #[error("the series has no frames")]
    EmptySeries,
    #[error("elbow and shoulder series differ in length ({elbow} vs {shoulder})")]
    LengthMismatch { elbow: usize, shoulder: usize },
    #[error("{signal} signal has no tracked frame")]
    AllMissing { signal: &'static str },
    #[error("invalid phase parameters: {0}")]
    InvalidParams(String),
}

#[derive(thiserror::Error, Debug)]
pub enum MotError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("no column header line starting with `time`")]
    MissingHeader,
    #[error("line {line}: `{token}` is not a number")]
    Parse { line: usize, token: String },
    #[error("line {line}: expected {expected} values, found {found}")]
    RaggedRow {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("column `{0}` not found")]
    MissingColumn(String),
    #[error(transparent)]
    Phase(#[from] PhaseError),
}
