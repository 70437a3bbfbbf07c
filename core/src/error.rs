use thiserror::Error;

/// Errors surfaced by the fuzzy-match adapter.
#[derive(Debug, Error)]
pub enum FzfError {
    #[error("unknown matcher flag: {0}")]
    UnknownFlag(String),

    #[error("missing value for matcher flag: {0}")]
    MissingValue(String),

    #[error("unsupported scoring algorithm: {0}")]
    UnknownAlgo(String),
}
