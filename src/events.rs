use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action recorded in a user's loan history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanAction {
    /// The user took the book out
    Borrow,
    /// The book was handed back
    Return,
}

impl fmt::Display for LoanAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Borrow => write!(f, "borrow"),
            Self::Return => write!(f, "return"),
        }
    }
}

/// Immutable entry of a user's history
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LoanEvent {
    /// Title of the book involved
    pub title: String,
    /// What happened to it
    pub action: LoanAction,
    /// When it happened
    pub timestamp: DateTime<Utc>,
}

impl LoanEvent {
    /// Create an event stamped with the current time
    #[must_use]
    pub fn now(title: &str, action: LoanAction) -> Self {
        Self { title: title.to_string(), action, timestamp: Utc::now() }
    }
}

impl fmt::Display for LoanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} '{}'",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.action,
            self.title
        )
    }
}
