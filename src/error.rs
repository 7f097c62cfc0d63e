//! Error types for catalog operations

use thiserror::Error;

/// Broad category of a catalog failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A book title or username is already taken
    DuplicateEntity,
    /// A book, user or session does not exist
    NotFound,
    /// The book is not in the state the operation requires
    InvalidState,
}

/// Expected, recoverable failure of a catalog operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// A book with this exact title is already in the catalog
    #[error("'{0}' already exists.")]
    DuplicateBook(String),

    /// The username is already registered
    #[error("User '{0}' already exists.")]
    DuplicateUser(String),

    /// No book with this exact title
    #[error("'{0}' not found.")]
    UnknownBook(String),

    /// No user with this username
    #[error("User '{0}' not found.")]
    UnknownUser(String),

    /// Borrow of a book that is already out
    #[error("'{0}' is already borrowed.")]
    AlreadyOnLoan(String),

    /// Return of a book that is on the shelf
    #[error("'{0}' is not borrowed.")]
    NotOnLoan(String),

    /// Session operation without a logged-in user
    #[error("No user is logged in.")]
    NoActiveSession,
}

impl CatalogError {
    /// Map the error onto the coarse taxonomy
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DuplicateBook(_) | Self::DuplicateUser(_) => ErrorKind::DuplicateEntity,
            Self::UnknownBook(_) | Self::UnknownUser(_) | Self::NoActiveSession => {
                ErrorKind::NotFound
            }
            Self::AlreadyOnLoan(_) | Self::NotOnLoan(_) => ErrorKind::InvalidState,
        }
    }
}

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
