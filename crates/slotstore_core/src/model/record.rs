//! Backend-native record model.
//!
//! # Responsibility
//! - Hold attribute values for one entity instance.
//! - Enforce attribute names and kinds declared by the entity description.
//!
//! # Invariants
//! - A record is always bound to one entity and one store instance.
//! - `row_id` is only set for records read back from a backend.

use crate::mapping::{MappingError, MappingResult, NativeObject};
use crate::model::schema::{AttributeDescription, AttributeKind, EntityDescription};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Identity of one store instance.
pub type StoreId = Uuid;

/// One attribute value as persisted by a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Boolean(bool),
    Blob(Vec<u8>),
}

impl AttributeValue {
    /// Attribute kind carried by this value; `None` for `Null`.
    pub fn kind(&self) -> Option<AttributeKind> {
        match self {
            Self::Null => None,
            Self::Integer(_) => Some(AttributeKind::Integer),
            Self::Real(_) => Some(AttributeKind::Real),
            Self::Text(_) => Some(AttributeKind::Text),
            Self::Boolean(_) => Some(AttributeKind::Boolean),
            Self::Blob(_) => Some(AttributeKind::Blob),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.kind() {
            Some(kind) => kind.as_str(),
            None => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for AttributeValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<u8>> for AttributeValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl From<&[u8]> for AttributeValue {
    fn from(value: &[u8]) -> Self {
        Self::Blob(value.to_vec())
    }
}

impl<T: Into<AttributeValue>> From<Option<T>> for AttributeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Native object of the bundled backends: one row of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotRecord {
    entity: EntityDescription,
    store_id: StoreId,
    row_id: Option<i64>,
    values: BTreeMap<String, AttributeValue>,
}

impl SlotRecord {
    /// Rebuilds a record read from backend storage.
    ///
    /// Values are taken as stored; kind checks happen when the caller reads
    /// them. The record is unbound until the reading store attaches it.
    pub(crate) fn persisted(
        entity: EntityDescription,
        row_id: i64,
        values: BTreeMap<String, AttributeValue>,
    ) -> Self {
        Self {
            entity,
            store_id: Uuid::nil(),
            row_id: Some(row_id),
            values,
        }
    }

    pub fn entity(&self) -> &EntityDescription {
        &self.entity
    }

    /// Backend row identifier, when this record was read from storage.
    pub fn row_id(&self) -> Option<i64> {
        self.row_id
    }

    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.values.get(attribute)
    }

    /// Returns `value` for `attribute`, or `Null` when unset.
    pub fn value_or_null(&self, attribute: &str) -> &AttributeValue {
        self.values.get(attribute).unwrap_or(&AttributeValue::Null)
    }

    /// Sets one attribute after checking its name and kind.
    pub fn set(
        &mut self,
        attribute: &str,
        value: impl Into<AttributeValue>,
    ) -> MappingResult<()> {
        let value = value.into();
        let description = self.describe(attribute)?;

        match value.kind() {
            Some(kind) if kind == description.kind => {}
            None if description.optional => {}
            _ => {
                return Err(MappingError::TypeMismatch {
                    attribute: attribute.to_string(),
                    expected: description.kind,
                    found: value.type_name(),
                });
            }
        }

        self.values.insert(attribute.to_string(), value);
        Ok(())
    }

    pub fn text(&self, attribute: &str) -> MappingResult<&str> {
        self.optional_text(attribute)?
            .ok_or_else(|| self.missing(attribute))
    }

    pub fn optional_text(&self, attribute: &str) -> MappingResult<Option<&str>> {
        match self.lookup(attribute)? {
            Some(AttributeValue::Text(value)) => Ok(Some(value.as_str())),
            Some(other) => Err(self.mismatch(attribute, AttributeKind::Text, other)),
            None => Ok(None),
        }
    }

    pub fn integer(&self, attribute: &str) -> MappingResult<i64> {
        self.optional_integer(attribute)?
            .ok_or_else(|| self.missing(attribute))
    }

    pub fn optional_integer(&self, attribute: &str) -> MappingResult<Option<i64>> {
        match self.lookup(attribute)? {
            Some(AttributeValue::Integer(value)) => Ok(Some(*value)),
            Some(other) => Err(self.mismatch(attribute, AttributeKind::Integer, other)),
            None => Ok(None),
        }
    }

    pub fn real(&self, attribute: &str) -> MappingResult<f64> {
        self.optional_real(attribute)?
            .ok_or_else(|| self.missing(attribute))
    }

    pub fn optional_real(&self, attribute: &str) -> MappingResult<Option<f64>> {
        match self.lookup(attribute)? {
            Some(AttributeValue::Real(value)) => Ok(Some(*value)),
            Some(other) => Err(self.mismatch(attribute, AttributeKind::Real, other)),
            None => Ok(None),
        }
    }

    pub fn boolean(&self, attribute: &str) -> MappingResult<bool> {
        self.optional_boolean(attribute)?
            .ok_or_else(|| self.missing(attribute))
    }

    pub fn optional_boolean(&self, attribute: &str) -> MappingResult<Option<bool>> {
        match self.lookup(attribute)? {
            Some(AttributeValue::Boolean(value)) => Ok(Some(*value)),
            Some(other) => Err(self.mismatch(attribute, AttributeKind::Boolean, other)),
            None => Ok(None),
        }
    }

    pub fn blob(&self, attribute: &str) -> MappingResult<&[u8]> {
        self.optional_blob(attribute)?
            .ok_or_else(|| self.missing(attribute))
    }

    pub fn optional_blob(&self, attribute: &str) -> MappingResult<Option<&[u8]>> {
        match self.lookup(attribute)? {
            Some(AttributeValue::Blob(value)) => Ok(Some(value.as_slice())),
            Some(other) => Err(self.mismatch(attribute, AttributeKind::Blob, other)),
            None => Ok(None),
        }
    }

    fn describe(&self, attribute: &str) -> MappingResult<&AttributeDescription> {
        self.entity
            .find_attribute(attribute)
            .ok_or_else(|| MappingError::UnknownAttribute {
                entity: self.entity.name.clone(),
                attribute: attribute.to_string(),
            })
    }

    // Unset and NULL both read as absent.
    fn lookup(&self, attribute: &str) -> MappingResult<Option<&AttributeValue>> {
        self.describe(attribute)?;
        Ok(self.values.get(attribute).filter(|value| !value.is_null()))
    }

    fn missing(&self, attribute: &str) -> MappingError {
        MappingError::MissingAttribute {
            entity: self.entity.name.clone(),
            attribute: attribute.to_string(),
        }
    }

    fn mismatch(
        &self,
        attribute: &str,
        expected: AttributeKind,
        found: &AttributeValue,
    ) -> MappingError {
        MappingError::TypeMismatch {
            attribute: attribute.to_string(),
            expected,
            found: found.type_name(),
        }
    }
}

impl NativeObject for SlotRecord {
    fn unattached(entity: &EntityDescription, store_id: StoreId) -> Self {
        Self {
            entity: entity.clone(),
            store_id,
            row_id: None,
            values: BTreeMap::new(),
        }
    }

    fn entity_name(&self) -> &str {
        &self.entity.name
    }

    fn store_id(&self) -> StoreId {
        self.store_id
    }

    fn attach_to(&mut self, store_id: StoreId) {
        self.store_id = store_id;
    }

    fn validate(&self) -> MappingResult<()> {
        for attribute in &self.entity.attributes {
            if attribute.optional {
                continue;
            }
            if self.value_or_null(&attribute.name).is_null() {
                return Err(self.missing(&attribute.name));
            }
        }
        Ok(())
    }
}
