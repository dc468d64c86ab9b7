/// Why a candidate record was refused.
///
/// Ingestion never surfaces these to the caller; they are logged and the
/// candidate is dropped. `append` and `update_rating` wrap them in
/// [`StoreError::Invalid`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record has no id")]
    MissingId,

    #[error("record '{0}' has no issue text")]
    MissingIssue(String),

    #[error("record '{0}' has an empty suggestion body")]
    EmptySuggestion(String),

    #[error("record '{0}' has no timestamp")]
    MissingTimestamp(String),

    #[error("record '{id}' has an unreadable timestamp '{raw}'")]
    InvalidTimestamp { id: String, raw: String },

    #[error("unknown status '{0}' (expected success, error, pending or user)")]
    UnknownStatus(String),

    #[error("rating {0} is outside 1-5")]
    RatingOutOfRange(i64),

    #[error("record id '{0}' appears more than once")]
    DuplicateId(String),

    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Failures of by-id store mutations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("No suggestion with id '{0}'")]
    NotFound(String),

    #[error("A suggestion with id '{0}' already exists")]
    DuplicateId(String),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
