//! Store error taxonomy.

use std::fmt;

/// Errors returned by the SQLite store
#[derive(Debug)]
pub enum StoreError {
    /// The username is already tracked
    AlreadyExists(String),
    /// The username is not tracked
    NotFound(String),
    /// The underlying database rejected or failed the operation
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::AlreadyExists(user) => write!(f, "{} is already being tracked", user),
            StoreError::NotFound(user) => write!(f, "{} is not being tracked", user),
            StoreError::Unavailable(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            StoreError::AlreadyExists("alice".into()).to_string(),
            "alice is already being tracked"
        );
        assert_eq!(
            StoreError::NotFound("bob".into()).to_string(),
            "bob is not being tracked"
        );
    }

    #[test]
    fn test_from_rusqlite() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert!(!err.is_not_found());
    }
}
