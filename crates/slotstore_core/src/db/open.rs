//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Apply connection options and verify entity tables before returning.
//!
//! # Invariants
//! - Returned connections carry the configured busy timeout.
//! - Returned connections have one table per model entity.

use super::tables::ensure_entity_tables;
use super::{BackendOptions, DbResult};
use crate::model::schema::DataModel;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::Instant;

/// Opens a SQLite database file and prepares it for `model`.
///
/// # Side effects
/// - Creates the database file and missing entity tables.
/// - Emits `db_open` logging events with duration and status.
pub fn open_connection(
    path: impl AsRef<Path>,
    model: &DataModel,
    options: &BackendOptions,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=file model={}",
        model.name
    );

    let conn = Connection::open(path).map_err(|err| {
        error!(
            "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
            started_at.elapsed().as_millis(),
            err
        );
        err
    })?;

    finish_open(conn, model, options, "file", started_at)
}

/// Opens an in-memory SQLite database and prepares it for `model`.
pub fn open_connection_in_memory(
    model: &DataModel,
    options: &BackendOptions,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=db status=start mode=memory model={}",
        model.name
    );

    let conn = Connection::open_in_memory().map_err(|err| {
        error!(
            "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_open_failed error={}",
            started_at.elapsed().as_millis(),
            err
        );
        err
    })?;

    finish_open(conn, model, options, "memory", started_at)
}

fn finish_open(
    mut conn: Connection,
    model: &DataModel,
    options: &BackendOptions,
    mode: &str,
    started_at: Instant,
) -> DbResult<Connection> {
    match bootstrap_connection(&mut conn, model, options, mode) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={} entities={} duration_ms={}",
                mode,
                model.entities.len(),
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(
    conn: &mut Connection,
    model: &DataModel,
    options: &BackendOptions,
    mode: &str,
) -> DbResult<()> {
    model.validate()?;
    conn.busy_timeout(options.busy_timeout)?;
    if mode == "file" {
        // PRAGMA journal_mode answers with a row; read it to run the statement.
        conn.query_row(
            &format!(
                "PRAGMA journal_mode = {};",
                options.journal_mode.pragma_value()
            ),
            [],
            |row| row.get::<_, String>(0),
        )?;
    }
    ensure_entity_tables(conn, model)?;
    Ok(())
}
