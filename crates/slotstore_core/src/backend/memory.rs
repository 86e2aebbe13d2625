//! In-process slot backend.
//!
//! Keeps committed rows in a map and stages writes in a copy of that map
//! until `commit` publishes them. Useful for caches that do not need to
//! outlive the process and for exercising stores without touching disk.

use super::SlotBackend;
use crate::db::{DbError, DbResult};
use crate::mapping::NativeObject;
use crate::model::record::{AttributeValue, SlotRecord};
use crate::model::schema::{DataModel, EntityDescription};
use std::collections::BTreeMap;

type Rows = BTreeMap<String, Vec<StoredRow>>;

#[derive(Debug, Clone)]
struct StoredRow {
    row_id: i64,
    values: BTreeMap<String, AttributeValue>,
}

/// Memory-only slot storage.
#[derive(Debug)]
pub struct MemoryBackend {
    model: DataModel,
    committed: Rows,
    staged: Option<Rows>,
    next_row_id: i64,
}

impl MemoryBackend {
    pub fn new(model: DataModel) -> DbResult<Self> {
        model.validate()?;
        Ok(Self {
            model,
            committed: Rows::new(),
            staged: None,
            next_row_id: 1,
        })
    }

    /// Number of committed rows for `entity`.
    pub fn committed_rows(&self, entity: &str) -> usize {
        self.committed.get(entity).map_or(0, Vec::len)
    }

    fn visible(&self) -> &Rows {
        self.staged.as_ref().unwrap_or(&self.committed)
    }

    fn staged_mut(&mut self) -> DbResult<&mut Rows> {
        self.staged.as_mut().ok_or(DbError::NoActiveTransaction)
    }
}

impl SlotBackend for MemoryBackend {
    type Native = SlotRecord;

    fn kind(&self) -> &'static str {
        "memory"
    }

    fn model(&self) -> &DataModel {
        &self.model
    }

    fn begin(&mut self) -> DbResult<()> {
        if self.staged.is_some() {
            return Err(DbError::TransactionAlreadyActive);
        }
        self.staged = Some(self.committed.clone());
        Ok(())
    }

    fn fetch_one(&self, entity: &EntityDescription) -> DbResult<Option<SlotRecord>> {
        let latest = self
            .visible()
            .get(&entity.name)
            .and_then(|rows| rows.last());

        Ok(latest.map(|row| SlotRecord::persisted(entity.clone(), row.row_id, row.values.clone())))
    }

    fn insert(&mut self, native: &SlotRecord) -> DbResult<()> {
        let entity = native.entity();
        let mut values = BTreeMap::new();
        for attribute in &entity.attributes {
            let value = native.value_or_null(&attribute.name);
            if value.is_null() && !attribute.optional {
                return Err(DbError::Rejected(format!(
                    "`{}.{}` may not be null",
                    entity.name, attribute.name
                )));
            }
            values.insert(attribute.name.clone(), value.clone());
        }

        let row_id = self.next_row_id;
        self.staged_mut()?
            .entry(entity.name.clone())
            .or_default()
            .push(StoredRow { row_id, values });
        self.next_row_id += 1;
        Ok(())
    }

    fn delete(&mut self, native: &SlotRecord) -> DbResult<()> {
        let row_id = native.row_id().ok_or_else(|| {
            DbError::Rejected(format!(
                "record for `{}` was never persisted",
                native.entity_name()
            ))
        })?;

        if let Some(rows) = self.staged_mut()?.get_mut(native.entity_name()) {
            rows.retain(|row| row.row_id != row_id);
        }
        Ok(())
    }

    fn commit(&mut self) -> DbResult<()> {
        let staged = self.staged.take().ok_or(DbError::NoActiveTransaction)?;
        self.committed = staged;
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.staged
            .take()
            .map(|_| ())
            .ok_or(DbError::NoActiveTransaction)
    }

    fn close(self) -> DbResult<()> {
        Ok(())
    }
}
