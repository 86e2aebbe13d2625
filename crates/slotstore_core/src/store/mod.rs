//! Single-slot store contract and its mapping-backed implementation.
//!
//! # Responsibility
//! - Define the `load`/`save`/`clear` contract every slot store honours.
//! - Provide the store that binds the contract to a [`SlotBackend`].
//!
//! # Invariants
//! - A slot holds at most one item; `save` replaces, never appends.
//! - An empty slot is reported as `ItemNotFound`, never as a default value.
//! - Nothing is retried internally; every failure reaches the caller.
//!
//! [`SlotBackend`]: crate::backend::SlotBackend

use crate::db::DbError;
use crate::mapping::MappingError;
use crate::model::schema::ModelError;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod blocking;
mod context;
mod mapped;

pub use blocking::BlockingSlotStore;
pub use mapped::{MappedSlotStore, MemorySlotStore, SqliteSlotStore};

pub type StoreResult<T> = Result<T, StoreError>;

/// Capability set of a single-slot store holding items of type `T`.
#[async_trait]
pub trait SlotStore<T>: Send + Sync {
    /// Returns the item currently held.
    ///
    /// Fails with `ItemNotFound` on an empty slot. Never mutates the slot.
    async fn load(&self) -> StoreResult<T>;

    /// Replaces whatever the slot holds with `item` and returns it.
    async fn save(&self, item: T) -> StoreResult<T>;

    /// Empties the slot; succeeds when it is already empty.
    async fn clear(&self) -> StoreResult<()>;
}

/// Slot store failures.
#[derive(Debug)]
pub enum StoreError {
    /// The data model could not be resolved from its bundle.
    ModelNotFound(ModelError),
    /// The item's slot key is not an entity of the backend's model.
    SchemaNotFound(String),
    /// The backend could not be opened.
    FailedToLoadBackend(DbError),
    /// The slot is empty.
    ItemNotFound(String),
    /// A blank record could not be built for the entity.
    UnableToCreateItem(String),
    Mapping(MappingError),
    /// A record was bound to another entity or store instance.
    InvalidStore {
        expected: String,
        found: String,
    },
    Backend(DbError),
    /// The execution context has shut down.
    ContextClosed,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ModelNotFound(err) => write!(f, "data model not available: {err}"),
            Self::SchemaNotFound(entity) => {
                write!(f, "entity `{entity}` is not part of the store schema")
            }
            Self::FailedToLoadBackend(err) => write!(f, "failed to load backend: {err}"),
            Self::ItemNotFound(entity) => write!(f, "no `{entity}` item is stored"),
            Self::UnableToCreateItem(entity) => {
                write!(f, "unable to create `{entity}` item for this store")
            }
            Self::Mapping(err) => write!(f, "{err}"),
            Self::InvalidStore { expected, found } => {
                write!(f, "record belongs to {found}, expected {expected}")
            }
            Self::Backend(err) => write!(f, "{err}"),
            Self::ContextClosed => write!(f, "store execution context is closed"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ModelNotFound(err) => Some(err),
            Self::FailedToLoadBackend(err) => Some(err),
            Self::Mapping(err) => Some(err),
            Self::Backend(err) => Some(err),
            Self::SchemaNotFound(_)
            | Self::ItemNotFound(_)
            | Self::UnableToCreateItem(_)
            | Self::InvalidStore { .. }
            | Self::ContextClosed => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        match value {
            // Undecodable stored data fails the mapping, not the backend.
            DbError::Decode(err) => Self::Mapping(err),
            other => Self::Backend(other),
        }
    }
}

impl From<MappingError> for StoreError {
    fn from(value: MappingError) -> Self {
        match value {
            MappingError::EntityUnavailable(entity) => Self::UnableToCreateItem(entity),
            other => Self::Mapping(other),
        }
    }
}

impl StoreError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ModelNotFound(_) => "model_not_found",
            Self::SchemaNotFound(_) => "schema_not_found",
            Self::FailedToLoadBackend(_) => "backend_load_failed",
            Self::ItemNotFound(_) => "item_not_found",
            Self::UnableToCreateItem(_) => "unable_to_create_item",
            Self::Mapping(_) => "mapping_failed",
            Self::InvalidStore { .. } => "invalid_store",
            Self::Backend(_) => "backend_failed",
            Self::ContextClosed => "context_closed",
        }
    }
}
