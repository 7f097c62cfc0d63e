use std::{
    collections::BTreeMap,
    fmt,
    io::Write,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

/// State-changing catalog operation that produces an audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// `add_book`
    AddBook,
    /// `remove_book`
    RemoveBook,
    /// `add_user`
    AddUser,
    /// `login`
    Login,
    /// `borrow_book`
    Borrow,
    /// `return_book`
    Return,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AddBook => "add_book",
            Self::RemoveBook => "remove_book",
            Self::AddUser => "add_user",
            Self::Login => "login",
            Self::Borrow => "borrow_book",
            Self::Return => "return_book",
        };
        f.write_str(name)
    }
}

/// Result of an audited operation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The operation changed the catalog
    Success,
    /// The operation was rejected
    Failure {
        /// Rendered error
        reason: String,
    },
}

impl Outcome {
    /// Whether the operation went through
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl<T> From<&Result<T, CatalogError>> for Outcome {
    fn from(result: &Result<T, CatalogError>) -> Self {
        match result {
            Ok(_) => Self::Success,
            Err(err) => Self::Failure { reason: err.to_string() },
        }
    }
}

/// Structured notification emitted after every mutation attempt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuditRecord {
    /// Which operation ran
    pub operation: Operation,
    /// Arguments the operation was called with
    pub parameters: BTreeMap<String, String>,
    /// How it ended
    pub outcome: Outcome,
    /// When it ended
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    /// Build a record stamped with the current time
    #[must_use]
    pub fn new(operation: Operation, parameters: &[(&str, &str)], outcome: Outcome) -> Self {
        Self {
            operation,
            parameters: parameters
                .iter()
                .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
                .collect(),
            outcome,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.timestamp.format("%Y-%m-%d %H:%M:%S"), self.operation)?;
        for (name, value) in &self.parameters {
            write!(f, " {name}={value:?}")?;
        }
        match &self.outcome {
            Outcome::Success => write!(f, " -> ok"),
            Outcome::Failure { reason } => write!(f, " -> failed: {reason}"),
        }
    }
}

/// Receiver of audit records
pub trait AuditSink: Send + Sync {
    /// Called once after each state-changing catalog call
    fn record(&self, record: &AuditRecord);
}

/// Forwards audit records to `tracing`
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        match &record.outcome {
            Outcome::Success => tracing::info!(
                operation = %record.operation,
                parameters = ?record.parameters,
                "catalog operation succeeded"
            ),
            Outcome::Failure { reason } => tracing::warn!(
                operation = %record.operation,
                parameters = ?record.parameters,
                %reason,
                "catalog operation failed"
            ),
        }
    }
}

/// Writes each record as one JSON object per line
pub struct JsonLinesAuditSink<W> {
    /// Destination, locked per record
    writer: Mutex<W>,
}

impl<W> fmt::Debug for JsonLinesAuditSink<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonLinesAuditSink").finish_non_exhaustive()
    }
}

impl<W: Write + Send> JsonLinesAuditSink<W> {
    /// Wrap `writer`; each record is flushed as it is written
    #[must_use]
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    /// Recover the underlying writer
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> AuditSink for JsonLinesAuditSink<W> {
    fn record(&self, record: &AuditRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!("Failed to serialize audit record: {e}");
                return;
            }
        };
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(writer, "{line}").and_then(|()| writer.flush()) {
            tracing::error!("Failed to write audit record: {e}");
        }
    }
}

/// Keeps records in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditSink {
    /// Shared record buffer
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditSink {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The last `n` records, oldest first
    #[must_use]
    pub fn tail(&self, n: usize) -> Vec<AuditRecord> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = records.len().saturating_sub(n);
        records.iter().skip(skip).cloned().collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        self.records.lock().unwrap_or_else(PoisonError::into_inner).push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_json_lines_sink_writes_one_object_per_record() {
        let sink = JsonLinesAuditSink::new(Vec::new());
        sink.record(&AuditRecord::new(
            Operation::AddUser,
            &[("username", "alice")],
            Outcome::Success,
        ));
        sink.record(&AuditRecord::new(
            Operation::Borrow,
            &[("username", "alice"), ("title", "Dune")],
            Outcome::Failure { reason: "'Dune' not found.".to_string() },
        ));

        let written = String::from_utf8(sink.into_inner()).unwrap_or_default();
        let parsed: Vec<AuditRecord> =
            written.lines().filter_map(|line| serde_json::from_str(line).ok()).collect();

        assert_eq!(written.lines().count(), 2);
        assert_eq!(
            parsed.iter().map(|r| (r.operation, r.outcome.is_success())).collect::<Vec<_>>(),
            vec![(Operation::AddUser, true), (Operation::Borrow, false)]
        );
        assert!(written.contains(r#""status":"failure""#));
        assert!(written.contains(r#""operation":"borrow""#));
    }

    #[test]
    fn test_memory_sink_tail() {
        let sink = MemoryAuditSink::new();
        let shared = sink.clone();
        for name in ["a", "b", "c"] {
            let parameters = [("username", name)];
            shared.record(&AuditRecord::new(Operation::AddUser, &parameters, Outcome::Success));
        }

        let tail: Vec<String> =
            sink.tail(2).iter().filter_map(|r| r.parameters.get("username").cloned()).collect();
        assert_eq!(tail, vec!["b", "c"]);
        assert_eq!(sink.tail(10).len(), 3);
        assert_eq!(sink.records().len(), 3);
    }

    #[test]
    fn test_outcome_from_result() {
        let failed: Result<(), CatalogError> = Err(CatalogError::NoActiveSession);
        assert_eq!(
            Outcome::from(&failed),
            Outcome::Failure { reason: "No user is logged in.".to_string() }
        );
        assert!(Outcome::from(&Ok::<_, CatalogError>(1)).is_success());
    }
}
