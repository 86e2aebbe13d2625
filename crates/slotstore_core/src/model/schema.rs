//! Explicit data model describing which entities a backend can hold.
//!
//! # Responsibility
//! - Describe entities (slot keys) and their typed attributes.
//! - Load a model from a resource bundle directory.
//!
//! # Invariants
//! - Model, entity and attribute names are plain identifiers
//!   (`^[A-Za-z_][A-Za-z0-9_]*$`), so backends may embed them in SQL.
//! - Entity names are unique per model; attribute names are unique per entity.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// File suffix used for model files inside a resource bundle directory.
pub const MODEL_FILE_EXTENSION: &str = "slotmodel.json";

/// Row key every backend keeps next to the attributes; never an attribute name.
pub const ROW_ID_COLUMN: &str = "slot_row";

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Returns whether `value` may be used as a model, entity or attribute name.
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

/// Storage type of one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Text,
    Integer,
    Real,
    Boolean,
    Blob,
}

impl AttributeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::Blob => "blob",
        }
    }
}

impl Display for AttributeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed attribute of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescription {
    pub name: String,
    pub kind: AttributeKind,
    /// Optional attributes may be left unset (persisted as NULL).
    #[serde(default)]
    pub optional: bool,
}

/// Schema entity; each entity backs exactly one store slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescription {
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<AttributeDescription>,
}

impl EntityDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
        }
    }

    /// Adds a required attribute.
    pub fn attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.push(AttributeDescription {
            name: name.into(),
            kind,
            optional: false,
        });
        self
    }

    /// Adds an attribute that may be left unset.
    pub fn optional_attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.push(AttributeDescription {
            name: name.into(),
            kind,
            optional: true,
        });
        self
    }

    pub fn find_attribute(&self, name: &str) -> Option<&AttributeDescription> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
    }
}

/// Named set of entities a backend is bootstrapped with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub entities: Vec<EntityDescription>,
}

impl DataModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entities: Vec::new(),
        }
    }

    pub fn with_entity(mut self, entity: EntityDescription) -> Self {
        self.entities.push(entity);
        self
    }

    /// Resolves an entity by slot key.
    pub fn entity(&self, name: &str) -> Option<&EntityDescription> {
        self.entities.iter().find(|entity| entity.name == name)
    }

    /// Loads `<bundle_dir>/<model_name>.slotmodel.json` and validates it.
    ///
    /// # Errors
    /// - `NotFound` when the bundle has no file for `model_name`.
    /// - `Io`/`Malformed` when the file cannot be read or parsed.
    /// - Any validation error from [`DataModel::validate`].
    pub fn load(bundle_dir: impl AsRef<Path>, model_name: &str) -> Result<Self, ModelError> {
        if !is_valid_identifier(model_name) {
            return Err(ModelError::InvalidIdentifier(model_name.to_string()));
        }

        let path = bundle_dir
            .as_ref()
            .join(format!("{model_name}.{MODEL_FILE_EXTENSION}"));
        if !path.is_file() {
            return Err(ModelError::NotFound(path));
        }

        let raw = std::fs::read_to_string(&path).map_err(|source| ModelError::Io {
            path: path.clone(),
            source,
        })?;
        let mut model: DataModel =
            serde_json::from_str(&raw).map_err(|source| ModelError::Malformed { path, source })?;
        if model.name.is_empty() {
            model.name = model_name.to_string();
        }

        model.validate()?;
        Ok(model)
    }

    /// Checks identifier syntax and uniqueness of entity/attribute names.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !is_valid_identifier(&self.name) {
            return Err(ModelError::InvalidIdentifier(self.name.clone()));
        }

        let mut entity_names = BTreeSet::new();
        for entity in &self.entities {
            if !is_valid_identifier(&entity.name) {
                return Err(ModelError::InvalidIdentifier(entity.name.clone()));
            }
            if !entity_names.insert(entity.name.as_str()) {
                return Err(ModelError::DuplicateEntity(entity.name.clone()));
            }

            let mut attribute_names = BTreeSet::new();
            for attribute in &entity.attributes {
                if !is_valid_identifier(&attribute.name) {
                    return Err(ModelError::InvalidIdentifier(attribute.name.clone()));
                }
                // SQLite column names compare case-insensitively.
                if attribute.name.eq_ignore_ascii_case(ROW_ID_COLUMN) {
                    return Err(ModelError::ReservedAttribute {
                        entity: entity.name.clone(),
                        attribute: attribute.name.clone(),
                    });
                }
                if !attribute_names.insert(attribute.name.as_str()) {
                    return Err(ModelError::DuplicateAttribute {
                        entity: entity.name.clone(),
                        attribute: attribute.name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Model resolution and validation failures.
#[derive(Debug)]
pub enum ModelError {
    NotFound(PathBuf),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidIdentifier(String),
    DuplicateEntity(String),
    DuplicateAttribute {
        entity: String,
        attribute: String,
    },
    /// The attribute name collides with the backend row key.
    ReservedAttribute {
        entity: String,
        attribute: String,
    },
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "data model not found at `{}`", path.display()),
            Self::Io { path, source } => {
                write!(f, "failed to read data model `{}`: {source}", path.display())
            }
            Self::Malformed { path, source } => {
                write!(f, "malformed data model `{}`: {source}", path.display())
            }
            Self::InvalidIdentifier(name) => write!(f, "invalid identifier `{name}`"),
            Self::DuplicateEntity(name) => write!(f, "duplicate entity `{name}`"),
            Self::DuplicateAttribute { entity, attribute } => {
                write!(f, "duplicate attribute `{attribute}` in entity `{entity}`")
            }
            Self::ReservedAttribute { entity, attribute } => write!(
                f,
                "attribute `{attribute}` in entity `{entity}` uses the reserved name `{ROW_ID_COLUMN}`"
            ),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Malformed { source, .. } => Some(source),
            Self::NotFound(_)
            | Self::InvalidIdentifier(_)
            | Self::DuplicateEntity(_)
            | Self::DuplicateAttribute { .. }
            | Self::ReservedAttribute { .. } => None,
        }
    }
}
