//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `slotstore_core` linkage.
//! - Run one save/load/clear check against an in-memory store.
//! - Keep output deterministic for quick local sanity checks.

use slotstore_core::{
    AttributeKind, DataModel, EntityDescription, MappingResult, RecordFactory, SlotRecord,
    SqliteSlotStore, Storable, StoreError, StoreResult,
};
use std::process::ExitCode;

#[derive(Debug, Clone, PartialEq)]
struct Heartbeat {
    label: String,
    attempt: i64,
}

impl Storable<SlotRecord> for Heartbeat {
    fn backend_identifier() -> MappingResult<String> {
        Ok("Heartbeat".to_string())
    }

    fn to_native(&self, factory: &dyn RecordFactory<SlotRecord>) -> MappingResult<SlotRecord> {
        let mut record = factory.blank("Heartbeat")?;
        record.set("label", self.label.as_str())?;
        record.set("attempt", self.attempt)?;
        Ok(record)
    }

    fn from_native(native: SlotRecord) -> MappingResult<Self> {
        Ok(Self {
            label: native.text("label")?.to_string(),
            attempt: native.integer("attempt")?,
        })
    }
}

fn heartbeat_model() -> DataModel {
    DataModel::new("Heartbeat").with_entity(
        EntityDescription::new("Heartbeat")
            .attribute("label", AttributeKind::Text)
            .attribute("attempt", AttributeKind::Integer),
    )
}

/// Returns the loaded item and whether the slot read back empty after `clear`.
fn run_smoke_check() -> StoreResult<(Heartbeat, bool)> {
    let store = SqliteSlotStore::<Heartbeat>::open_in_memory(heartbeat_model())?.into_blocking();

    store.save(Heartbeat {
        label: "first".to_string(),
        attempt: 1,
    })?;
    store.save(Heartbeat {
        label: "second".to_string(),
        attempt: 2,
    })?;
    let loaded = store.load()?;

    store.clear()?;
    let cleared = match store.load() {
        Err(StoreError::ItemNotFound(_)) => true,
        Ok(_) => false,
        Err(err) => return Err(err),
    };

    store.close()?;
    Ok((loaded, cleared))
}

fn main() -> ExitCode {
    println!("slotstore_core version={}", slotstore_core::core_version());

    match run_smoke_check() {
        Ok((heartbeat, true)) => {
            println!(
                "slotstore_core smoke=ok label={} attempt={}",
                heartbeat.label, heartbeat.attempt
            );
            ExitCode::SUCCESS
        }
        Ok((_, false)) => {
            eprintln!("slotstore_core smoke=error code=slot_not_cleared");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!(
                "slotstore_core smoke=error code={} error={}",
                err.code(),
                err
            );
            ExitCode::FAILURE
        }
    }
}
