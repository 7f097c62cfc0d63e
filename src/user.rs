use serde::{Deserialize, Serialize};

use crate::events::LoanEvent;

/// Registered patron and their loan history
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct User {
    /// Unique identity
    username: String,
    /// Append-only, oldest first
    history: Vec<LoanEvent>,
}

impl User {
    /// Create a user with an empty history
    #[must_use]
    pub fn new(username: &str) -> Self {
        Self { username: username.to_string(), history: Vec::new() }
    }

    /// Unique username
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Loan events, oldest first
    #[must_use]
    pub fn history(&self) -> &[LoanEvent] {
        &self.history
    }

    /// Append `event` to the history
    pub(crate) fn record(&mut self, event: LoanEvent) {
        self.history.push(event);
    }
}
