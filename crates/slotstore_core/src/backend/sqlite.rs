//! SQLite slot backend.
//!
//! # Responsibility
//! - Persist slot records as rows of per-entity tables.
//! - Map attribute values to SQLite storage classes and back.
//!
//! # Invariants
//! - Writes run inside `BEGIN IMMEDIATE` transactions opened by `begin`.
//! - File backends hold a `LocationLease` until closed or dropped.

use super::SlotBackend;
use crate::db::tables::quote_identifier;
use crate::db::{
    open_connection, open_connection_in_memory, BackendOptions, DbError, DbResult, LocationLease,
};
use crate::mapping::{MappingError, NativeObject};
use crate::model::record::{AttributeValue, SlotRecord};
use crate::model::schema::{
    AttributeDescription, AttributeKind, DataModel, EntityDescription, ROW_ID_COLUMN,
};
use rusqlite::types::{ToSql, ToSqlOutput, Type, Value, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::collections::BTreeMap;
use std::path::Path;

/// SQLite-backed slot storage.
pub struct SqliteBackend {
    // Declared before `lease` so the connection closes before the file is released.
    conn: Connection,
    model: DataModel,
    lease: Option<LocationLease>,
    in_transaction: bool,
}

impl SqliteBackend {
    /// Opens (or creates) the store file at `path` for `model`.
    ///
    /// # Errors
    /// - `LocationInUse` when another backend in this process holds the file.
    /// - `InvalidModel`, `SchemaMismatch` or `Sqlite` when bootstrap fails.
    pub fn open(
        path: impl AsRef<Path>,
        model: DataModel,
        options: &BackendOptions,
    ) -> DbResult<Self> {
        let lease = LocationLease::acquire(path)?;
        let conn = open_connection(lease.path(), &model, options)?;
        Ok(Self {
            conn,
            model,
            lease: Some(lease),
            in_transaction: false,
        })
    }

    pub fn open_in_memory(model: DataModel, options: &BackendOptions) -> DbResult<Self> {
        let conn = open_connection_in_memory(&model, options)?;
        Ok(Self {
            conn,
            model,
            lease: None,
            in_transaction: false,
        })
    }

    /// Canonical store file path; `None` for in-memory backends.
    pub fn location(&self) -> Option<&Path> {
        self.lease.as_ref().map(LocationLease::path)
    }
}

impl SlotBackend for SqliteBackend {
    type Native = SlotRecord;

    fn kind(&self) -> &'static str {
        "sqlite"
    }

    fn model(&self) -> &DataModel {
        &self.model
    }

    fn begin(&mut self) -> DbResult<()> {
        if self.in_transaction {
            return Err(DbError::TransactionAlreadyActive);
        }
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        self.in_transaction = true;
        Ok(())
    }

    fn fetch_one(&self, entity: &EntityDescription) -> DbResult<Option<SlotRecord>> {
        let mut columns = vec![ROW_ID_COLUMN.to_string()];
        columns.extend(
            entity
                .attributes
                .iter()
                .map(|attribute| quote_identifier(&attribute.name)),
        );
        let sql = format!(
            "SELECT {} FROM {} ORDER BY {ROW_ID_COLUMN} DESC LIMIT 1;",
            columns.join(", "),
            quote_identifier(&entity.name)
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let row_id: i64 = row.get(0)?;
        let mut values = BTreeMap::new();
        for (index, attribute) in entity.attributes.iter().enumerate() {
            let raw: Value = row.get(index + 1)?;
            values.insert(attribute.name.clone(), value_from_sql(attribute, raw)?);
        }

        Ok(Some(SlotRecord::persisted(entity.clone(), row_id, values)))
    }

    fn insert(&mut self, native: &SlotRecord) -> DbResult<()> {
        let entity = native.entity();
        let table = quote_identifier(&entity.name);

        if entity.attributes.is_empty() {
            self.conn
                .execute(&format!("INSERT INTO {table} DEFAULT VALUES;"), [])?;
            return Ok(());
        }

        let columns = entity
            .attributes
            .iter()
            .map(|attribute| quote_identifier(&attribute.name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=entity.attributes.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let values = entity
            .attributes
            .iter()
            .map(|attribute| native.value_or_null(&attribute.name));

        self.conn.execute(
            &format!("INSERT INTO {table} ({columns}) VALUES ({placeholders});"),
            params_from_iter(values),
        )?;
        Ok(())
    }

    fn delete(&mut self, native: &SlotRecord) -> DbResult<()> {
        let row_id = native.row_id().ok_or_else(|| {
            DbError::Rejected(format!(
                "record for `{}` was never persisted",
                native.entity_name()
            ))
        })?;

        self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE {ROW_ID_COLUMN} = ?1;",
                quote_identifier(native.entity_name())
            ),
            [row_id],
        )?;
        Ok(())
    }

    fn commit(&mut self) -> DbResult<()> {
        if !self.in_transaction {
            return Err(DbError::NoActiveTransaction);
        }
        self.conn.execute_batch("COMMIT;")?;
        self.in_transaction = false;
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        if !self.in_transaction {
            return Err(DbError::NoActiveTransaction);
        }
        self.in_transaction = false;
        // SQLite may already have rolled back on its own after a failed COMMIT.
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }

    fn close(mut self) -> DbResult<()> {
        if self.in_transaction {
            self.rollback()?;
        }
        let Self { conn, lease, .. } = self;
        let closed = conn.close().map_err(|(_, err)| DbError::Sqlite(err));
        drop(lease);
        closed
    }
}

impl ToSql for AttributeValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Self::Null => ToSqlOutput::Owned(Value::Null),
            Self::Integer(value) => ToSqlOutput::Owned(Value::Integer(*value)),
            Self::Real(value) => ToSqlOutput::Owned(Value::Real(*value)),
            Self::Text(value) => ToSqlOutput::Borrowed(ValueRef::Text(value.as_bytes())),
            Self::Boolean(value) => ToSqlOutput::Owned(Value::Integer(i64::from(*value))),
            Self::Blob(value) => ToSqlOutput::Borrowed(ValueRef::Blob(value.as_slice())),
        })
    }
}

fn value_from_sql(attribute: &AttributeDescription, raw: Value) -> DbResult<AttributeValue> {
    let value = match (attribute.kind, raw) {
        (_, Value::Null) => AttributeValue::Null,
        (AttributeKind::Text, Value::Text(value)) => AttributeValue::Text(value),
        (AttributeKind::Integer, Value::Integer(value)) => AttributeValue::Integer(value),
        (AttributeKind::Real, Value::Real(value)) => AttributeValue::Real(value),
        // REAL affinity may still hand back integral values as integers.
        (AttributeKind::Real, Value::Integer(value)) => AttributeValue::Real(value as f64),
        (AttributeKind::Boolean, Value::Integer(0)) => AttributeValue::Boolean(false),
        (AttributeKind::Boolean, Value::Integer(1)) => AttributeValue::Boolean(true),
        (AttributeKind::Blob, Value::Blob(value)) => AttributeValue::Blob(value),
        (kind, other) => {
            return Err(DbError::Decode(MappingError::TypeMismatch {
                attribute: attribute.name.clone(),
                expected: kind,
                found: storage_class_name(other.data_type()),
            }));
        }
    };
    Ok(value)
}

fn storage_class_name(data_type: Type) -> &'static str {
    match data_type {
        Type::Null => "null",
        Type::Integer => "integer",
        Type::Real => "real",
        Type::Text => "text",
        Type::Blob => "blob",
    }
}
