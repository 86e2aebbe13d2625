//! Entity table bootstrap for SQLite stores.
//!
//! # Invariants
//! - Every model entity maps to a table of the same name.
//! - Every attribute maps to a column; required attributes are `NOT NULL`.
//! - Tables that already exist must carry the row key and every declared column.

use super::{DbError, DbResult};
use crate::model::schema::{AttributeKind, DataModel, EntityDescription, ROW_ID_COLUMN};
use rusqlite::Connection;

/// Creates missing entity tables and verifies existing ones atomically.
pub(crate) fn ensure_entity_tables(conn: &mut Connection, model: &DataModel) -> DbResult<()> {
    let tx = conn.transaction()?;
    for entity in &model.entities {
        if table_exists(&tx, &entity.name)? {
            let columns = std::iter::once(ROW_ID_COLUMN)
                .chain(entity.attributes.iter().map(|attribute| attribute.name.as_str()));
            for column in columns {
                if !table_has_column(&tx, &entity.name, column)? {
                    return Err(DbError::SchemaMismatch {
                        table: entity.name.clone(),
                        column: column.to_string(),
                    });
                }
            }
            continue;
        }

        tx.execute_batch(&create_table_sql(entity))?;
    }
    tx.commit()?;

    Ok(())
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn column_type(kind: AttributeKind) -> &'static str {
    match kind {
        AttributeKind::Text => "TEXT",
        AttributeKind::Integer | AttributeKind::Boolean => "INTEGER",
        AttributeKind::Real => "REAL",
        AttributeKind::Blob => "BLOB",
    }
}

fn create_table_sql(entity: &EntityDescription) -> String {
    let mut columns = vec![format!("{ROW_ID_COLUMN} INTEGER PRIMARY KEY AUTOINCREMENT")];
    for attribute in &entity.attributes {
        let mut column = format!(
            "{} {}",
            quote_identifier(&attribute.name),
            column_type(attribute.kind)
        );
        if !attribute.optional {
            column.push_str(" NOT NULL");
        }
        columns.push(column);
    }

    format!(
        "CREATE TABLE {} ({});",
        quote_identifier(&entity.name),
        columns.join(", ")
    )
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

pub(crate) fn table_has_column(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", quote_identifier(table)))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{create_table_sql, quote_identifier};
    use crate::model::schema::{AttributeKind, EntityDescription};

    #[test]
    fn quote_identifier_escapes_embedded_quotes() {
        assert_eq!(quote_identifier("plain"), "\"plain\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn create_table_sql_marks_required_columns_not_null() {
        let entity = EntityDescription::new("Session")
            .attribute("token", AttributeKind::Text)
            .optional_attribute("remember", AttributeKind::Boolean);

        let sql = create_table_sql(&entity);
        assert_eq!(
            sql,
            "CREATE TABLE \"Session\" (slot_row INTEGER PRIMARY KEY AUTOINCREMENT, \"token\" TEXT NOT NULL, \"remember\" INTEGER);"
        );
    }
}
