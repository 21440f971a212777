use thiserror::Error;

/// Errors raised while compiling filters, before any listing is read
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid {kind} filter '{spec}': {reason}")]
    Validation {
        kind: &'static str,
        spec: String,
        reason: String,
    },

    #[error("Conflicting filters: {0}")]
    Conflict(String),

    #[error("Invalid regex '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid glob '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}
