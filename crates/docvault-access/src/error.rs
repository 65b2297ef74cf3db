//! Access error types.

/// Error raised by a [`LibraryStore`](crate::store::LibraryStore) or the
/// policy layer on top of it.
///
/// The policy evaluator converts these into an [`AccessDecision`](crate::AccessDecision)
/// with reason `error`; callers of the store traits see them directly.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// Backend error (database, network, etc.).
    #[error("backend error: {0}")]
    Backend(String),

    /// The backend requires an index or schema object that does not exist.
    #[error("missing index: {0}")]
    MissingIndex(String),

    /// Stored data could not be decoded.
    #[error("malformed record: {0}")]
    Malformed(String),

    /// A concurrent writer won every attempt of a conditional update.
    #[error("contention on {0}")]
    Contention(String),

    /// Invalid argument (empty id, bad date key, ...).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl AccessError {
    /// Create a backend error from any error type.
    #[inline]
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }

    /// Create a malformed-record error from any error type.
    #[inline]
    pub fn malformed<E: std::fmt::Display>(err: E) -> Self {
        Self::Malformed(err.to_string())
    }
}

#[cfg(feature = "sql")]
impl From<sqlx::Error> for AccessError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

#[cfg(feature = "firestore")]
impl From<reqwest::Error> for AccessError {
    fn from(err: reqwest::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
