//! Single-slot persistent object stores.
//! A store holds at most one item of one type, persisted through a
//! pluggable backend and mapped to/from the caller's own domain type.

pub mod backend;
pub mod db;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod store;

pub use backend::memory::MemoryBackend;
pub use backend::sqlite::SqliteBackend;
pub use backend::SlotBackend;
pub use db::{BackendOptions, DbError, DbResult, JournalMode};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use mapping::{
    MappingError, MappingResult, ModelRecordFactory, NativeObject, RecordFactory, Storable,
};
pub use model::record::{AttributeValue, SlotRecord, StoreId};
pub use model::schema::{
    AttributeDescription, AttributeKind, DataModel, EntityDescription, ModelError,
};
pub use store::{
    BlockingSlotStore, MappedSlotStore, MemorySlotStore, SlotStore, SqliteSlotStore, StoreError,
    StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
