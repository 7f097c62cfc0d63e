//! Text front end: parses command lines and renders catalog outcomes.

use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::{
    book::Book,
    catalog::Catalog,
    observers::{AuditRecord, MemoryAuditSink},
};

/// Number of audit lines `logs` shows without an argument
pub const DEFAULT_LOG_LINES: usize = 200;

/// Usage line for `add`
const ADD_USAGE: &str = "add <title> <author> [category]";
/// Usage line for `remove`
const REMOVE_USAGE: &str = "remove <title>";
/// Usage line for `search`
const SEARCH_USAGE: &str = "search <title> [author] [category]";
/// Usage line for `borrow`
const BORROW_USAGE: &str = "borrow <title>";
/// Usage line for `return`
const RETURN_USAGE: &str = "return <title>";
/// Usage line for `add_user`
const ADD_USER_USAGE: &str = "add_user <username>";
/// Usage line for `login`
const LOGIN_USAGE: &str = "login <username>";
/// Usage line for `logs`
const LOGS_USAGE: &str = "logs [n|all]";

/// Text printed by `help`
pub const HELP: &str = "\
Commands:
  add <title> <author> [category]     - add a book
  remove <title>                      - remove a book
  search <title> [author] [category]  - search books
  borrow <title>                      - borrow as the current user
  return <title>                      - return as the current user
  list [category]                     - list available books (or a category)
  add_user <username>                 - register a user
  login <username>                    - switch the current user
  logout                              - forget the current user
  users                               - list registered users
  history                             - show the current user's history
  logs [n|all]                        - show the last n audit records (default 200)
  help                                - show this text
  quit                                - exit";

/// Failure to turn a line into a [`Command`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A quote was opened and never closed
    #[error("Failed to parse command: unterminated quote")]
    UnterminatedQuote,

    /// Known command with the wrong arguments
    #[error("Invalid command format. Usage: {0}")]
    Usage(&'static str),

    /// `logs` argument that is neither a number nor `all`
    #[error("Invalid line count '{0}'. Use a number or 'all', e.g. logs 100")]
    InvalidCount(String),

    /// Keyword not recognised
    #[error("Invalid command '{0}'. Type 'help' for a list of commands.")]
    UnknownCommand(String),
}

/// How many audit records `logs` shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogsWindow {
    /// The most recent `n`
    Last(usize),
    /// Everything recorded this session
    All,
}

/// A parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { title: String, author: String, category: Option<String> },
    Remove(String),
    Search { title: String, author: Option<String>, category: Option<String> },
    Borrow(String),
    Return(String),
    List(Option<String>),
    AddUser(String),
    Login(String),
    Logout,
    Users,
    History,
    Logs(LogsWindow),
    Help,
    Quit,
}

/// Split a line into words, honouring single and double quotes
///
/// Outside quotes a backslash escapes the next character. Inside double
/// quotes it only escapes a double quote or another backslash.
///
/// # Errors
///
/// Returns `ParseError::UnterminatedQuote` if a quote is left open
pub fn tokenize(line: &str) -> Result<Vec<String>, ParseError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') => {
                let escaped = chars.next_if(|next| matches!(*next, '"' | '\\')).unwrap_or('\\');
                current.push(escaped);
            }
            (None, '\\') => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
                in_token = true;
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if quote.is_some() {
        return Err(ParseError::UnterminatedQuote);
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

/// Text after the keyword of a single-argument command
///
/// Quotes are only special when they wrap the whole argument, so titles like
/// `Ender's Game` need no quoting. Unquoted words are joined by one space.
fn rest_of_line(rest: &str) -> Option<String> {
    let quoted = ['"', '\''].into_iter().find_map(|q| rest.strip_prefix(q)?.strip_suffix(q));
    let text = quoted.map_or_else(
        || rest.split_whitespace().collect::<Vec<_>>().join(" "),
        str::to_string,
    );
    (!text.is_empty()).then_some(text)
}

/// [`rest_of_line`] for commands that require an argument
fn required(rest: &str, usage: &'static str) -> Result<String, ParseError> {
    rest_of_line(rest).ok_or(ParseError::Usage(usage))
}

impl Command {
    /// Parse a line; blank lines yield `None`
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` describing why the line is not a valid command
    pub fn parse(line: &str) -> Result<Option<Self>, ParseError> {
        let line = line.trim();
        let Some(keyword) = line.split_whitespace().next() else {
            return Ok(None);
        };
        let rest = line.get(keyword.len()..).unwrap_or_default().trim();

        let command = match keyword.to_lowercase().as_str() {
            "add" => match tokenize(rest)?.as_slice() {
                [title, author] => {
                    Self::Add { title: title.clone(), author: author.clone(), category: None }
                }
                [title, author, category] => Self::Add {
                    title: title.clone(),
                    author: author.clone(),
                    category: Some(category.clone()),
                },
                _ => return Err(ParseError::Usage(ADD_USAGE)),
            },
            "remove" => Self::Remove(required(rest, REMOVE_USAGE)?),
            "search" => match tokenize(rest)?.as_slice() {
                [title] => Self::Search { title: title.clone(), author: None, category: None },
                [title, author] => Self::Search {
                    title: title.clone(),
                    author: Some(author.clone()),
                    category: None,
                },
                [title, author, category] => Self::Search {
                    title: title.clone(),
                    author: Some(author.clone()),
                    category: Some(category.clone()),
                },
                _ => return Err(ParseError::Usage(SEARCH_USAGE)),
            },
            "borrow" => Self::Borrow(required(rest, BORROW_USAGE)?),
            "return" => Self::Return(required(rest, RETURN_USAGE)?),
            "list" => Self::List(rest_of_line(rest)),
            "add_user" => Self::AddUser(required(rest, ADD_USER_USAGE)?),
            "login" => Self::Login(required(rest, LOGIN_USAGE)?),
            "logout" => Self::Logout,
            "users" => Self::Users,
            "history" => Self::History,
            "logs" => Self::Logs(match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
                [] => LogsWindow::Last(DEFAULT_LOG_LINES),
                [n] if n.eq_ignore_ascii_case("all") => LogsWindow::All,
                [n] => LogsWindow::Last(
                    n.parse().map_err(|_| ParseError::InvalidCount((*n).to_string()))?,
                ),
                _ => return Err(ParseError::Usage(LOGS_USAGE)),
            }),
            "help" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ => return Err(ParseError::UnknownCommand(keyword.to_string())),
        };
        Ok(Some(command))
    }
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)?.ok_or(ParseError::Usage("<command> [arguments]"))
    }
}

/// Asks the operator before destructive commands run
pub trait ConfirmationGate {
    /// Return `true` to go ahead
    fn confirm(&mut self, prompt: &str) -> bool;
}

/// Gate that approves everything
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeYes;

impl ConfirmationGate for AssumeYes {
    fn confirm(&mut self, _prompt: &str) -> bool {
        true
    }
}

/// Rendered answer to one command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Output lines, without trailing newlines
    pub lines: Vec<String>,
    /// Whether the lines describe a failure
    pub is_error: bool,
    /// Whether the session should end
    pub quit: bool,
}

impl Reply {
    /// Single-line, successful reply
    fn line(text: impl Into<String>) -> Self {
        Self { lines: vec![text.into()], ..Self::default() }
    }

    /// Multi-line, successful reply
    fn lines(lines: Vec<String>) -> Self {
        Self { lines, ..Self::default() }
    }

    /// `Error: ...` line flagged as a failure
    fn error(err: impl fmt::Display) -> Self {
        Self { lines: vec![format!("Error: {err}")], is_error: true, quit: false }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines.join("\n"))
    }
}

/// `- 'Title' by Author` with an optional ` in Category` suffix
fn shelf_line(book: &Book) -> String {
    book.category().map_or_else(
        || format!("- '{}' by {}", book.title(), book.author()),
        |category| format!("- '{}' by {} in {category}", book.title(), book.author()),
    )
}

/// Interactive session over a catalog
pub struct Console<G> {
    /// The catalog being driven
    catalog: Catalog,
    /// Consulted before `remove`
    gate: G,
    /// Audit records shown by `logs`
    audit: MemoryAuditSink,
}

impl<G> fmt::Debug for Console<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Console").field("catalog", &self.catalog).finish_non_exhaustive()
    }
}

impl<G: ConfirmationGate> Console<G> {
    /// Wrap `catalog`, attaching an in-memory audit sink for `logs`
    pub fn new(mut catalog: Catalog, gate: G) -> Self {
        let audit = MemoryAuditSink::new();
        catalog.register_sink(Box::new(audit.clone()));
        Self { catalog, gate, audit }
    }

    /// The catalog driven by this console
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Parse and run one line of input
    pub fn handle_line(&mut self, line: &str) -> Reply {
        match Command::parse(line) {
            Ok(Some(command)) => self.execute(command),
            Ok(None) => Reply::default(),
            Err(err) => Reply::error(err),
        }
    }

    /// Run a parsed command against the catalog
    pub fn execute(&mut self, command: Command) -> Reply {
        match command {
            Command::Add { title, author, category } => {
                match self.catalog.add_book(&title, &author, category.as_deref()) {
                    Ok(()) => Reply::line(category.map_or_else(
                        || format!("Added '{title}' by {author}."),
                        |category| format!("Added '{title}' by {author} in {category}."),
                    )),
                    Err(err) => Reply::error(err),
                }
            }
            Command::Remove(title) => self.remove(&title),
            Command::Search { title, author, category } => {
                let found = if author.is_none() && category.is_none() {
                    self.catalog.search_book(&title)
                } else {
                    self.catalog.search_filtered(&title, author.as_deref(), category.as_deref())
                };
                if found.is_empty() {
                    Reply::line("No books found.")
                } else {
                    Reply::lines(
                        found
                            .iter()
                            .map(|book| {
                                format!(
                                    "- '{}' by {} ({})",
                                    book.title(),
                                    book.author(),
                                    book.state().label()
                                )
                            })
                            .collect(),
                    )
                }
            }
            Command::Borrow(title) => match self.catalog.borrow_as_current(&title) {
                Ok(book) => {
                    Reply::line(format!("Successfully borrowed '{title}' by {}.", book.author()))
                }
                Err(err) => Reply::error(err),
            },
            Command::Return(title) => match self.catalog.return_as_current(&title) {
                Ok(_) => Reply::line(format!("Successfully returned '{title}'.")),
                Err(err) => Reply::error(err),
            },
            Command::List(None) => {
                let books = self.catalog.get_available_books();
                if books.is_empty() {
                    Reply::line("No available books.")
                } else {
                    Reply::lines(books.into_iter().map(shelf_line).collect())
                }
            }
            Command::List(Some(category)) => {
                let books = self.catalog.filter_by_category(&category);
                if books.is_empty() {
                    Reply::line(format!("No books in the '{category}' category."))
                } else {
                    Reply::lines(books.into_iter().map(shelf_line).collect())
                }
            }
            Command::AddUser(username) => match self.catalog.add_user(&username) {
                Ok(()) => Reply::line(format!("User '{username}' added.")),
                Err(err) => Reply::error(err),
            },
            Command::Login(username) => match self.catalog.login(&username) {
                Ok(()) => Reply::line(format!("Current user: {username}")),
                Err(err) => Reply::error(err),
            },
            Command::Logout => {
                self.catalog.logout();
                Reply::line("Logged out.")
            }
            Command::Users => {
                let users = self.catalog.list_users();
                if users.is_empty() {
                    Reply::line("No registered users.")
                } else {
                    let mut lines = vec!["Registered users:".to_string()];
                    lines.extend(users.into_iter().map(|user| format!("- {user}")));
                    Reply::lines(lines)
                }
            }
            Command::History => self.history(),
            Command::Logs(window) => {
                let records = match window {
                    LogsWindow::All => self.audit.records(),
                    LogsWindow::Last(n) => self.audit.tail(n),
                };
                if records.is_empty() {
                    Reply::line("No audit records yet.")
                } else {
                    Reply::lines(records.iter().map(AuditRecord::to_string).collect())
                }
            }
            Command::Help => Reply::lines(HELP.lines().map(str::to_string).collect()),
            Command::Quit => Reply { quit: true, ..Reply::line("Goodbye!") },
        }
    }

    /// Remove a book once the gate agrees
    fn remove(&mut self, title: &str) -> Reply {
        if self.catalog.book(title).is_some()
            && !self.gate.confirm(&format!("Remove '{title}'? [y/N] "))
        {
            tracing::debug!(title, "removal declined");
            return Reply::line(format!("Removal of '{title}' cancelled."));
        }
        match self.catalog.remove_book(title) {
            Ok(_) => Reply::line(format!("Removed '{title}'.")),
            Err(err) => Reply::error(err),
        }
    }

    /// Render the session user's loan history
    fn history(&self) -> Reply {
        let Some(username) = self.catalog.current_user() else {
            return Reply::error(
                "No user is logged in. Use login <username> or add_user <username>.",
            );
        };
        match self.catalog.get_history(username) {
            Ok(events) => {
                let mut lines = vec![format!("{username}'s borrowing history:")];
                if events.is_empty() {
                    lines.push("(empty)".to_string());
                }
                lines.extend(events.iter().map(|event| format!("- {event}")));
                Reply::lines(lines)
            }
            Err(err) => Reply::error(err),
        }
    }
}
