//! Weavegate store layer.
//!
//! The sync engine talks to the wide-column store exclusively through the
//! [`StoreClient`] seam defined here: a typed client with prepared-statement
//! execution and autopaged row streaming, selected per call through an
//! [`ExecProfile`]. The wire-level driver lives behind that seam; this crate
//! ships the statement builders, the row projection of upstream blocks into
//! the denormalized tables, the one-shot schema initializer, and an
//! in-memory backend used by tests and the devnet mode.

use std::time::Duration;

use async_trait::async_trait;

pub mod mem;
pub mod projector;
pub mod schema;
pub mod statement;
pub mod table;
pub mod value;
pub mod writer;

pub use mem::MemBackend;
pub use statement::{BoundStatement, CmpOp, DeleteBuilder, InsertBuilder, SelectBuilder, StatementKind};
pub use table::{SortOrder, Table, KEYSPACE};
pub use value::CqlValue;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Store driver error: {0}")]
    Driver(String),
    #[error("Statement not supported by this backend: {0}")]
    Unsupported(String),
    #[error("Unconfigured table `{0}`, has the schema been initialized?")]
    UnconfiguredTable(&'static str),
}

/// A named bundle of timeout and consistency settings applied to a store
/// operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecProfile {
    /// Cheap scans (doctor).
    Fast,
    /// Query-side reads.
    Gql,
    /// All core writes.
    Full,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Consistency {
    Any,
    All,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SerialConsistency {
    Any,
    Serial,
}

impl ExecProfile {
    pub fn read_timeout(&self) -> Duration {
        match self {
            ExecProfile::Fast | ExecProfile::Gql => Duration::from_secs(5),
            ExecProfile::Full => Duration::from_secs(15),
        }
    }

    pub fn consistency(&self) -> Consistency {
        match self {
            ExecProfile::Fast => Consistency::Any,
            ExecProfile::Gql | ExecProfile::Full => Consistency::All,
        }
    }

    pub fn serial_consistency(&self) -> SerialConsistency {
        match self {
            ExecProfile::Fast => SerialConsistency::Any,
            ExecProfile::Gql | ExecProfile::Full => SerialConsistency::Serial,
        }
    }
}

/// One result row: column name to value, in selection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(pub Vec<(String, CqlValue)>);

impl Row {
    pub fn get(&self, column: &str) -> Option<&CqlValue> {
        self.0.iter().find(|(name, _)| name == column).map(|(_, value)| value)
    }

    pub fn bigint(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            CqlValue::Bigint(n) => Some(*n),
            _ => None,
        }
    }

    pub fn text(&self, column: &str) -> Option<&str> {
        match self.get(column)? {
            CqlValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// The typed store client the core consumes. Implementations are expected to
/// cache prepared statements, honor the per-profile timeouts and consistency
/// levels, and retry statements flagged idempotent on timeout.
#[async_trait]
pub trait StoreClient: Send + Sync + 'static {
    async fn execute(&self, statement: &BoundStatement, profile: ExecProfile) -> Result<Vec<Row>, StoreError>;

    /// Streams a result set with autopaging. The default implementation
    /// fetches eagerly; driver-backed implementations override it with real
    /// paging.
    async fn each_row(
        &self,
        statement: &BoundStatement,
        profile: ExecProfile,
        on_row: &mut (dyn FnMut(Row) + Send),
    ) -> Result<(), StoreError> {
        for row in self.execute(statement, profile).await? {
            on_row(row);
        }
        Ok(())
    }
}
