#![allow(dead_code)]

use slotstore_core::{
    AttributeKind, DataModel, EntityDescription, MappingError, MappingResult, NativeObject,
    RecordFactory, SlotRecord, Storable,
};
use std::path::Path;
use uuid::Uuid;

/// Item stored in the `Settings` slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub theme: String,
    pub font_size: i64,
    pub beta: Option<bool>,
}

impl Settings {
    pub fn themed(theme: &str) -> Self {
        Self {
            theme: theme.to_string(),
            font_size: 14,
            beta: None,
        }
    }
}

impl Storable<SlotRecord> for Settings {
    fn backend_identifier() -> MappingResult<String> {
        Ok("Settings".to_string())
    }

    fn to_native(&self, factory: &dyn RecordFactory<SlotRecord>) -> MappingResult<SlotRecord> {
        let mut record = factory.blank("Settings")?;
        record.set("theme", self.theme.as_str())?;
        record.set("font_size", self.font_size)?;
        record.set("beta", self.beta)?;
        Ok(record)
    }

    fn from_native(native: SlotRecord) -> MappingResult<Self> {
        Ok(Self {
            theme: native.text("theme")?.to_string(),
            font_size: native.integer("font_size")?,
            beta: native.optional_boolean("beta")?,
        })
    }
}

/// Item stored in the `Session` slot, next to `Settings`.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
}

impl Storable<SlotRecord> for Session {
    fn backend_identifier() -> MappingResult<String> {
        Ok("Session".to_string())
    }

    fn to_native(&self, factory: &dyn RecordFactory<SlotRecord>) -> MappingResult<SlotRecord> {
        let mut record = factory.blank("Session")?;
        record.set("token", self.token.as_str())?;
        Ok(record)
    }

    fn from_native(native: SlotRecord) -> MappingResult<Self> {
        Ok(Self {
            token: native.text("token")?.to_string(),
        })
    }
}

/// Item whose slot key is not part of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Orphan;

impl Storable<SlotRecord> for Orphan {
    fn backend_identifier() -> MappingResult<String> {
        Ok("Orphan".to_string())
    }

    fn to_native(&self, factory: &dyn RecordFactory<SlotRecord>) -> MappingResult<SlotRecord> {
        factory.blank("Orphan")
    }

    fn from_native(_native: SlotRecord) -> MappingResult<Self> {
        Ok(Self)
    }
}

/// `Settings` item that builds its record outside the store's factory.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignSettings(pub Settings);

impl Storable<SlotRecord> for ForeignSettings {
    fn backend_identifier() -> MappingResult<String> {
        Settings::backend_identifier()
    }

    fn to_native(&self, _factory: &dyn RecordFactory<SlotRecord>) -> MappingResult<SlotRecord> {
        let model = settings_model();
        let entity = model
            .entity("Settings")
            .ok_or_else(|| MappingError::EntityUnavailable("Settings".to_string()))?;
        let mut record = SlotRecord::unattached(entity, Uuid::new_v4());
        record.set("theme", self.0.theme.as_str())?;
        record.set("font_size", self.0.font_size)?;
        Ok(record)
    }

    fn from_native(native: SlotRecord) -> MappingResult<Self> {
        Settings::from_native(native).map(Self)
    }
}

/// `Settings` item that maps itself onto the `Session` entity.
#[derive(Debug, Clone, PartialEq)]
pub struct MisroutedSettings;

impl Storable<SlotRecord> for MisroutedSettings {
    fn backend_identifier() -> MappingResult<String> {
        Settings::backend_identifier()
    }

    fn to_native(&self, factory: &dyn RecordFactory<SlotRecord>) -> MappingResult<SlotRecord> {
        let mut record = factory.blank("Session")?;
        record.set("token", "misrouted")?;
        Ok(record)
    }

    fn from_native(_native: SlotRecord) -> MappingResult<Self> {
        Ok(Self)
    }
}

/// `Settings` item whose mapping always fails.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmappableSettings;

impl Storable<SlotRecord> for UnmappableSettings {
    fn backend_identifier() -> MappingResult<String> {
        Settings::backend_identifier()
    }

    fn to_native(&self, factory: &dyn RecordFactory<SlotRecord>) -> MappingResult<SlotRecord> {
        let mut record = factory.blank("Settings")?;
        record.set("font_size", "large")?;
        Ok(record)
    }

    fn from_native(_native: SlotRecord) -> MappingResult<Self> {
        Ok(Self)
    }
}

/// `Settings` item that leaves a required attribute unset.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialSettings;

impl Storable<SlotRecord> for PartialSettings {
    fn backend_identifier() -> MappingResult<String> {
        Settings::backend_identifier()
    }

    fn to_native(&self, factory: &dyn RecordFactory<SlotRecord>) -> MappingResult<SlotRecord> {
        let mut record = factory.blank("Settings")?;
        record.set("theme", "dark")?;
        Ok(record)
    }

    fn from_native(_native: SlotRecord) -> MappingResult<Self> {
        Ok(Self)
    }
}

/// `Settings` item that carries its record as-is, e.g. one from `blank_record`.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsRecord(pub SlotRecord);

impl Storable<SlotRecord> for SettingsRecord {
    fn backend_identifier() -> MappingResult<String> {
        Settings::backend_identifier()
    }

    fn to_native(&self, _factory: &dyn RecordFactory<SlotRecord>) -> MappingResult<SlotRecord> {
        Ok(self.0.clone())
    }

    fn from_native(native: SlotRecord) -> MappingResult<Self> {
        Ok(Self(native))
    }
}

pub fn settings_model() -> DataModel {
    DataModel::new("Preferences")
        .with_entity(
            EntityDescription::new("Settings")
                .attribute("theme", AttributeKind::Text)
                .attribute("font_size", AttributeKind::Integer)
                .optional_attribute("beta", AttributeKind::Boolean),
        )
        .with_entity(EntityDescription::new("Session").attribute("token", AttributeKind::Text))
}

/// Writes `settings_model()` as a bundle file named `model_name` into `dir`.
pub fn write_model_bundle(dir: &Path, model_name: &str) {
    let path = dir.join(format!("{model_name}.slotmodel.json"));
    let json = serde_json::to_string_pretty(&settings_model()).unwrap();
    std::fs::write(path, json).unwrap();
}
