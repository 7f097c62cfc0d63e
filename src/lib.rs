//! In-memory library catalog with a loan state machine.
//!
//! This crate provides the [`Catalog`] aggregate (books, users, loans and
//! per-user history), audit sinks notified after every mutation, and a
//! console front end that turns text commands into catalog calls.

pub mod book;
pub mod catalog;
pub mod console;
pub mod error;
pub mod events;
pub mod observers;
pub mod user;

pub use book::{Book, LoanState};
pub use catalog::Catalog;
pub use error::{CatalogError, ErrorKind};
pub use events::{LoanAction, LoanEvent};
pub use observers::{AuditRecord, AuditSink, JsonLinesAuditSink, MemoryAuditSink, TracingAuditSink};
pub use user::User;
