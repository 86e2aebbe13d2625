//! Backend primitive contracts and bundled implementations.
//!
//! # Responsibility
//! - Define the transactional primitives a slot store needs from storage.
//! - Keep SQL and in-memory bookkeeping out of the store layer.
//!
//! # Invariants
//! - `insert`/`delete` are only visible to other readers after `commit`.
//! - `rollback` discards every change since `begin`.
//! - A backend is owned by exactly one execution context.

use crate::db::DbResult;
use crate::mapping::NativeObject;
use crate::model::schema::{DataModel, EntityDescription};

pub mod memory;
pub mod sqlite;

/// Transactional primitives over one persistence location.
pub trait SlotBackend: Send + 'static {
    type Native: NativeObject + Send + 'static;

    /// Short backend name used in log events.
    fn kind(&self) -> &'static str;

    /// Schema used to resolve slot keys.
    fn model(&self) -> &DataModel;

    fn begin(&mut self) -> DbResult<()>;

    /// Returns the object currently held for `entity`, if any.
    fn fetch_one(&self, entity: &EntityDescription) -> DbResult<Option<Self::Native>>;

    fn insert(&mut self, native: &Self::Native) -> DbResult<()>;

    /// Deletes an object previously returned by `fetch_one`.
    fn delete(&mut self, native: &Self::Native) -> DbResult<()>;

    fn commit(&mut self) -> DbResult<()>;

    fn rollback(&mut self) -> DbResult<()>;

    /// Releases every resource the backend holds.
    fn close(self) -> DbResult<()>
    where
        Self: Sized;
}
