//! `dcim-audit`: append-only change log for data-center entities.
//!
//! Every successful create/update/delete of a tracked entity produces exactly
//! one [`AuditEntry`]. [`AuditedExecutor`] couples a mutation with its entry,
//! inside one storage transaction when the storage can provide one.

pub mod entry;
pub mod error;
pub mod executor;
pub mod recorder;
pub mod storage;
pub mod store;

pub use entry::{ActionKind, AuditDraft, AuditEntry, AuditEntryId};
pub use error::AuditError;
pub use executor::{AuditedExecutor, ConsistencyMode};
pub use recorder::AuditRecorder;
pub use storage::{InMemoryStorage, Mutation, MutationOutcome, Storage, StorageError};
pub use store::{AuditStore, AuditStoreError, InMemoryAuditStore};
