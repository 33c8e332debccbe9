//! Persistence layer: libSQL-backed record store with a change feed.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use traits::{BulkWriteResult, ChangeEvent, ChangeKind, RecordStore, WriteFailure, WriteOp};
