use std::fmt;

use crate::{
    book::{Book, LoanState},
    error::{CatalogError, Result},
    events::{LoanAction, LoanEvent},
    observers::{AuditRecord, AuditSink, Operation, Outcome},
    user::User,
};

/// In-memory library catalog: books, users, loans and the session user
#[derive(Default)]
pub struct Catalog {
    /// Books in insertion order
    books: Vec<Book>,
    /// Users in registration order
    users: Vec<User>,
    /// Username set by the last successful login
    current_user: Option<String>,
    /// Sinks notified after every mutation attempt
    sinks: Vec<Box<dyn AuditSink>>,
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalog")
            .field("books", &self.books)
            .field("users", &self.users)
            .field("current_user", &self.current_user)
            .field("sinks_count", &self.sinks.len())
            .finish()
    }
}

impl Catalog {
    /// Create an empty catalog with no sinks attached
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink to be notified of every mutation attempt
    pub fn register_sink(&mut self, sink: Box<dyn AuditSink>) {
        self.sinks.push(sink);
    }

    /// Notify every sink about the outcome of `operation`
    fn audit<T>(&self, operation: Operation, parameters: &[(&str, &str)], result: &Result<T>) {
        if self.sinks.is_empty() {
            return;
        }
        let record = AuditRecord::new(operation, parameters, Outcome::from(result));
        for sink in &self.sinks {
            sink.record(&record);
        }
    }

    // ----- books -----

    /// Add a new, available book
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateBook` if a book with the exact same title exists
    pub fn add_book(&mut self, title: &str, author: &str, category: Option<&str>) -> Result<()> {
        let result = if self.book(title).is_some() {
            Err(CatalogError::DuplicateBook(title.to_string()))
        } else {
            self.books.push(Book::new(title, author, category));
            tracing::debug!(title, author, ?category, "book added");
            Ok(())
        };
        let mut parameters = vec![("title", title), ("author", author)];
        if let Some(category) = category {
            parameters.push(("category", category));
        }
        self.audit(Operation::AddBook, &parameters, &result);
        result
    }

    /// Remove the book with exactly this title and hand back its record
    ///
    /// Books on loan are removed as well.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownBook` if no such book exists
    pub fn remove_book(&mut self, title: &str) -> Result<Book> {
        let position = self.books.iter().position(|book| book.title() == title);
        let result = position
            .map(|idx| self.books.remove(idx))
            .ok_or_else(|| CatalogError::UnknownBook(title.to_string()));
        if result.is_ok() {
            tracing::debug!(title, "book removed");
        }
        self.audit(Operation::RemoveBook, &[("title", title)], &result);
        result
    }

    /// Look up a book by exact title
    #[must_use]
    pub fn book(&self, title: &str) -> Option<&Book> {
        self.books.iter().find(|book| book.title() == title)
    }

    /// All books in insertion order
    #[must_use]
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// Number of books in the catalog
    #[must_use]
    pub fn len(&self) -> usize {
        self.books.len()
    }

    /// Whether the catalog holds no books
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Books whose title or author contains `query`, ignoring case
    ///
    /// An empty query matches every book.
    #[must_use]
    pub fn search_book(&self, query: &str) -> Vec<&Book> {
        let needle = query.to_lowercase();
        self.books.iter().filter(|book| book.matches_query(&needle)).collect()
    }

    /// Books whose title contains `title` and, when given, whose author and
    /// category contain the respective filters; all comparisons ignore case
    #[must_use]
    pub fn search_filtered(
        &self,
        title: &str,
        author: Option<&str>,
        category: Option<&str>,
    ) -> Vec<&Book> {
        let title = title.to_lowercase();
        let author = author.map(str::to_lowercase);
        let category = category.map(str::to_lowercase);
        self.books
            .iter()
            .filter(|book| book.title().to_lowercase().contains(&title))
            .filter(|book| {
                author.as_ref().is_none_or(|a| book.author().to_lowercase().contains(a))
            })
            .filter(|book| {
                category.as_ref().is_none_or(|c| {
                    book.category().is_some_and(|bc| bc.to_lowercase().contains(c))
                })
            })
            .collect()
    }

    /// Books that can be borrowed right now
    #[must_use]
    pub fn get_available_books(&self) -> Vec<&Book> {
        self.books.iter().filter(|book| book.is_available()).collect()
    }

    /// Books whose category equals `category` exactly
    #[must_use]
    pub fn filter_by_category(&self, category: &str) -> Vec<&Book> {
        self.books.iter().filter(|book| book.category() == Some(category)).collect()
    }

    // ----- users -----

    /// Register a new user with an empty history
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateUser` if the username is taken
    pub fn add_user(&mut self, username: &str) -> Result<()> {
        let result = if self.user(username).is_some() {
            Err(CatalogError::DuplicateUser(username.to_string()))
        } else {
            self.users.push(User::new(username));
            tracing::debug!(username, "user registered");
            Ok(())
        };
        self.audit(Operation::AddUser, &[("username", username)], &result);
        result
    }

    /// Make `username` the session user, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownUser` if the username is not registered
    pub fn login(&mut self, username: &str) -> Result<()> {
        let result = if self.user(username).is_some() {
            self.current_user = Some(username.to_string());
            tracing::debug!(username, "session user changed");
            Ok(())
        } else {
            Err(CatalogError::UnknownUser(username.to_string()))
        };
        self.audit(Operation::Login, &[("username", username)], &result);
        result
    }

    /// Forget the session user
    pub fn logout(&mut self) {
        self.current_user = None;
    }

    /// Username of the session user, if anyone is logged in
    #[must_use]
    pub fn current_user(&self) -> Option<&str> {
        self.current_user.as_deref()
    }

    /// Look up a registered user
    #[must_use]
    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.iter().find(|user| user.username() == username)
    }

    /// Usernames in registration order
    #[must_use]
    pub fn list_users(&self) -> Vec<&str> {
        self.users.iter().map(User::username).collect()
    }

    // ----- loans -----

    /// Lend `title` to `username`
    ///
    /// # Errors
    ///
    /// Returns, checked in this order:
    /// - `CatalogError::UnknownUser` if the user is not registered
    /// - `CatalogError::UnknownBook` if the book does not exist
    /// - `CatalogError::AlreadyOnLoan` if the book is already out
    pub fn borrow_book(&mut self, username: &str, title: &str) -> Result<&Book> {
        self.loan(Operation::Borrow, LoanAction::Borrow, username, title)
    }

    /// Take `title` back; any registered user may return any book on loan
    ///
    /// # Errors
    ///
    /// Returns, checked in this order:
    /// - `CatalogError::UnknownUser` if the user is not registered
    /// - `CatalogError::UnknownBook` if the book does not exist
    /// - `CatalogError::NotOnLoan` if the book is on the shelf
    pub fn return_book(&mut self, username: &str, title: &str) -> Result<&Book> {
        self.loan(Operation::Return, LoanAction::Return, username, title)
    }

    /// [`Catalog::borrow_book`] on behalf of the session user
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NoActiveSession` if nobody is logged in, otherwise
    /// the errors of [`Catalog::borrow_book`]
    pub fn borrow_as_current(&mut self, title: &str) -> Result<&Book> {
        let username = self.session_user(Operation::Borrow, title)?;
        self.borrow_book(&username, title)
    }

    /// [`Catalog::return_book`] on behalf of the session user
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NoActiveSession` if nobody is logged in, otherwise
    /// the errors of [`Catalog::return_book`]
    pub fn return_as_current(&mut self, title: &str) -> Result<&Book> {
        let username = self.session_user(Operation::Return, title)?;
        self.return_book(&username, title)
    }

    /// Loan history of `username`, oldest first
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::UnknownUser` if the user is not registered
    pub fn get_history(&self, username: &str) -> Result<&[LoanEvent]> {
        self.user(username)
            .map(User::history)
            .ok_or_else(|| CatalogError::UnknownUser(username.to_string()))
    }

    /// Current session user; a missing session is audited as a failed `operation`
    fn session_user(&self, operation: Operation, title: &str) -> Result<String> {
        let result = self.current_user.clone().ok_or(CatalogError::NoActiveSession);
        if result.is_err() {
            self.audit(operation, &[("title", title)], &result);
        }
        result
    }

    /// Run one loan transition, audit it and return the affected book
    fn loan(
        &mut self,
        operation: Operation,
        action: LoanAction,
        username: &str,
        title: &str,
    ) -> Result<&Book> {
        let result = self.apply_transition(action, username, title);
        self.audit(operation, &[("username", username), ("title", title)], &result);
        result?;
        self.book(title).ok_or_else(|| CatalogError::UnknownBook(title.to_string()))
    }

    /// Validate and apply `action`, then append it to the user's history
    fn apply_transition(&mut self, action: LoanAction, username: &str, title: &str) -> Result<()> {
        let user = self
            .users
            .iter_mut()
            .find(|user| user.username() == username)
            .ok_or_else(|| CatalogError::UnknownUser(username.to_string()))?;
        let book = self
            .books
            .iter_mut()
            .find(|book| book.title() == title)
            .ok_or_else(|| CatalogError::UnknownBook(title.to_string()))?;

        let next = match (action, book.is_available()) {
            (LoanAction::Borrow, true) => LoanState::OnLoan { borrower: username.to_string() },
            (LoanAction::Borrow, false) => {
                return Err(CatalogError::AlreadyOnLoan(title.to_string()));
            }
            (LoanAction::Return, false) => LoanState::Available,
            (LoanAction::Return, true) => return Err(CatalogError::NotOnLoan(title.to_string())),
        };

        tracing::debug!(username, title, from = ?book.state(), to = ?next, "loan transition");
        book.set_state(next);
        user.record(LoanEvent::now(title, action));
        Ok(())
    }
}

#[cfg(test)]
mod tests;
