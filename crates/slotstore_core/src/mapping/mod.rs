//! Mapping protocol between caller domain types and backend-native objects.
//!
//! # Responsibility
//! - Let each domain type name its slot key explicitly.
//! - Convert domain values to/from the backend's native object.
//!
//! # Invariants
//! - Native objects are only created through a [`RecordFactory`], so each one
//!   is bound to the store instance and entity it was created for.
//! - Conversions are pure; they never touch the backend.

use crate::model::record::StoreId;
use crate::model::schema::{AttributeKind, DataModel, EntityDescription};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type MappingResult<T> = Result<T, MappingError>;

/// Domain ↔ native conversion failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    UnknownAttribute {
        entity: String,
        attribute: String,
    },
    MissingAttribute {
        entity: String,
        attribute: String,
    },
    TypeMismatch {
        attribute: String,
        expected: AttributeKind,
        found: &'static str,
    },
    /// The factory could not resolve the requested entity in the schema.
    EntityUnavailable(String),
    InvalidIdentifier(String),
    Malformed(String),
}

impl Display for MappingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownAttribute { entity, attribute } => {
                write!(f, "entity `{entity}` has no attribute `{attribute}`")
            }
            Self::MissingAttribute { entity, attribute } => {
                write!(f, "required attribute `{entity}.{attribute}` is not set")
            }
            Self::TypeMismatch {
                attribute,
                expected,
                found,
            } => write!(
                f,
                "attribute `{attribute}` expects {expected} value, got {found}"
            ),
            Self::EntityUnavailable(entity) => {
                write!(f, "entity `{entity}` is not part of the data model")
            }
            Self::InvalidIdentifier(value) => write!(f, "invalid backend identifier `{value}`"),
            Self::Malformed(message) => write!(f, "malformed item data: {message}"),
        }
    }
}

impl Error for MappingError {}

/// Backend-native object contract needed by the mapping-backed store.
pub trait NativeObject: Sized {
    /// Builds an empty object for `entity` that is not yet persisted.
    fn unattached(entity: &EntityDescription, store_id: StoreId) -> Self;

    fn entity_name(&self) -> &str;

    /// Store instance this object is bound to.
    fn store_id(&self) -> StoreId;

    /// Binds an object read from the backend to the store that read it.
    fn attach_to(&mut self, store_id: StoreId);

    /// Checks that every required attribute is populated.
    fn validate(&self) -> MappingResult<()>;
}

/// Creates blank native objects on behalf of a mapping implementation.
pub trait RecordFactory<N> {
    fn blank(&self, entity: &str) -> MappingResult<N>;
}

/// Mapping protocol implemented once per domain type.
///
/// `N` is the backend-native representation the domain type maps onto.
pub trait Storable<N>: Sized + Send + 'static {
    /// Slot key the item is stored under (an entity name in the data model).
    fn backend_identifier() -> MappingResult<String>;

    fn to_native(&self, factory: &dyn RecordFactory<N>) -> MappingResult<N>;

    fn from_native(native: N) -> MappingResult<Self>;
}

/// Factory resolving entities against a data model for one store instance.
pub struct ModelRecordFactory<'model> {
    model: &'model DataModel,
    store_id: StoreId,
}

impl<'model> ModelRecordFactory<'model> {
    pub fn new(model: &'model DataModel, store_id: StoreId) -> Self {
        Self { model, store_id }
    }
}

impl<N: NativeObject> RecordFactory<N> for ModelRecordFactory<'_> {
    fn blank(&self, entity: &str) -> MappingResult<N> {
        let description = self
            .model
            .entity(entity)
            .ok_or_else(|| MappingError::EntityUnavailable(entity.to_string()))?;
        Ok(N::unattached(description, self.store_id))
    }
}
