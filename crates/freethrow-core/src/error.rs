/// Errors raised while constructing core values.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("unknown joint name `{0}`")]
    UnknownJoint(String),

    #[error("pattern needs at least 2x2 inner corners (got {cols}x{rows})")]
    PatternTooSmall { cols: usize, rows: usize },

    #[error("pattern square size must be positive and finite (got {0})")]
    InvalidSquareSize(f64),

    #[error("joint {joint} listed more than once")]
    DuplicateJoint { joint: &'static str },
}
