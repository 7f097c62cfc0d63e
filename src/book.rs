use serde::{Deserialize, Serialize};

/// Loan state of a single book
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum LoanState {
    /// Book is on the shelf and can be borrowed
    #[default]
    Available,
    /// Book is on loan; the borrower is kept for display only
    OnLoan {
        /// Username that borrowed the book
        borrower: String,
    },
}

impl LoanState {
    /// Get a human-readable label for the state
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::OnLoan { .. } => "Borrowed",
        }
    }
}

/// A single catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Book {
    /// Title, unique within a catalog
    title: String,
    /// Author as entered
    author: String,
    /// Optional free-form category
    category: Option<String>,
    /// Current loan state
    state: LoanState,
}

impl Book {
    /// Create a new, available book
    #[must_use]
    pub fn new(title: &str, author: &str, category: Option<&str>) -> Self {
        Self {
            title: title.to_string(),
            author: author.to_string(),
            category: category.map(str::to_string),
            state: LoanState::Available,
        }
    }

    /// Exact title, the book's identity
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Author as entered
    #[must_use]
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Category, if one was given
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Current loan state
    #[must_use]
    pub fn state(&self) -> &LoanState {
        &self.state
    }

    /// Whether the book can currently be borrowed
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.state == LoanState::Available
    }

    /// Username recorded by the last borrow, while the book is on loan
    #[must_use]
    pub fn borrower(&self) -> Option<&str> {
        match &self.state {
            LoanState::Available => None,
            LoanState::OnLoan { borrower } => Some(borrower),
        }
    }

    /// Case-insensitive substring match on title or author
    pub(crate) fn matches_query(&self, needle_lower: &str) -> bool {
        self.title.to_lowercase().contains(needle_lower)
            || self.author.to_lowercase().contains(needle_lower)
    }

    /// Move the book to `state`; transition rules live in the catalog
    pub(crate) fn set_state(&mut self, state: LoanState) {
        self.state = state;
    }
}
