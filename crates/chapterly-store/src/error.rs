//! Store error types.

use chapterly_common::{ChapterId, Error};

/// Error type for chapter store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("chapter not found: {0}")]
    NotFound(ChapterId),
    #[error("chapter already exists: {0}")]
    Conflict(String),
    #[error("unsupported store URI: {0}")]
    InvalidUri(String),
    #[error("redb error: {0}")]
    Redb(#[from] redb::DatabaseError),
    #[error("redb storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("redb transaction error: {0}")]
    Transaction(Box<redb::TransactionError>),
    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<redb::TransactionError> for StoreError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Transaction(Box::new(e))
    }
}

impl StoreError {
    /// Check if this is a not-found error
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(_) => Self::NotFound("Chapter not found".to_string()),
            StoreError::Conflict(key) => {
                Self::Conflict(format!("A chapter with this subject, chapter, class and unit already exists: {key}"))
            }
            StoreError::InvalidUri(uri) => Self::Configuration(format!("unsupported store URI: {uri}")),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_api_errors() {
        let id = ChapterId::new();
        let err: Error = StoreError::NotFound(id).into();
        assert_eq!(err.http_status_code(), 404);

        let err: Error = StoreError::Conflict("Math / Algebra / 10 / 1".into()).into();
        assert_eq!(err.http_status_code(), 409);

        let err: Error = StoreError::Io(std::io::Error::other("disk gone")).into();
        assert_eq!(err.http_status_code(), 503);
    }
}
