//! Mapping-backed slot store.
//!
//! # Responsibility
//! - Bind the slot contract to a backend through the mapping protocol.
//! - Run fetch-then-replace writes as single backend transactions.
//!
//! # Invariants
//! - `save` deletes the current slot object and inserts the new one inside
//!   one transaction; a failure rolls both back.
//! - `load` never opens a transaction and never commits.
//! - Records must carry this store's id and the item's entity to be saved.

use super::blocking::BlockingSlotStore;
use super::context::{ExecutionContext, WorkerState};
use super::{SlotStore, StoreError, StoreResult};
use crate::backend::memory::MemoryBackend;
use crate::backend::sqlite::SqliteBackend;
use crate::backend::SlotBackend;
use crate::db::{BackendOptions, DbResult};
use crate::mapping::{ModelRecordFactory, NativeObject, Storable};
use crate::model::record::{SlotRecord, StoreId};
use crate::model::schema::{DataModel, EntityDescription};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use std::marker::PhantomData;
use std::path::Path;
use std::time::Instant;
use uuid::Uuid;

/// Slot store persisting items of type `T` through backend `B`.
pub struct MappedSlotStore<T, B: SlotBackend> {
    pub(super) context: ExecutionContext<B>,
    store_id: StoreId,
    _item: PhantomData<fn() -> T>,
}

/// Store over a SQLite file or in-memory database.
pub type SqliteSlotStore<T> = MappedSlotStore<T, SqliteBackend>;

/// Store over the in-process memory backend.
pub type MemorySlotStore<T> = MappedSlotStore<T, MemoryBackend>;

impl<T, B> MappedSlotStore<T, B>
where
    B: SlotBackend,
    T: Storable<B::Native>,
{
    /// Takes ownership of `backend` and starts the store's execution context.
    pub fn new(backend: B) -> StoreResult<Self> {
        let store_id = Uuid::new_v4();
        let kind = backend.kind();
        let context = ExecutionContext::spawn(backend, store_id)?;
        info!(
            "event=store_open module=store status=ok backend={} store_id={}",
            kind, store_id
        );

        Ok(Self {
            context,
            store_id,
            _item: PhantomData,
        })
    }

    /// Identity records must be bound to before this store accepts them.
    pub fn store_id(&self) -> StoreId {
        self.store_id
    }

    /// Empties the slot, then returns an unattached record for the item's
    /// entity, bound to this store.
    ///
    /// # Errors
    /// - `UnableToCreateItem` when the item's entity is not in the schema.
    pub async fn blank_record(&self) -> StoreResult<B::Native> {
        let started_at = Instant::now();
        let result = self.context.run(blank_record_job::<T, B>).await;
        log_outcome("slot_blank", self.store_id, started_at, &result);
        result
    }

    /// Number of commits this store has performed so far.
    pub async fn commit_count(&self) -> StoreResult<u64> {
        self.context.run(|state| Ok(state.commits)).await
    }

    /// Wraps the store for callers without an async runtime.
    pub fn into_blocking(self) -> BlockingSlotStore<T, B> {
        BlockingSlotStore::new(self)
    }

    /// Drains queued operations and closes the backend.
    ///
    /// Blocks the calling thread until the execution context has exited.
    pub fn close(mut self) -> StoreResult<()> {
        let result = self.context.shutdown();
        match &result {
            Ok(()) => info!(
                "event=store_close module=store status=ok store_id={}",
                self.store_id
            ),
            Err(err) => error!(
                "event=store_close module=store status=error store_id={} error_code={} error={}",
                self.store_id,
                err.code(),
                err
            ),
        }
        result
    }
}

impl<T> MappedSlotStore<T, SqliteBackend>
where
    T: Storable<SlotRecord>,
{
    /// Resolves `model_name` in `bundle_dir`, opens the store file at
    /// `store_path` and starts the store.
    ///
    /// # Errors
    /// - `ModelNotFound` when the model cannot be loaded from the bundle.
    /// - `FailedToLoadBackend` when the store file cannot be opened.
    pub fn open(
        store_path: impl AsRef<Path>,
        model_name: &str,
        bundle_dir: impl AsRef<Path>,
    ) -> StoreResult<Self> {
        Self::open_with_options(
            store_path,
            model_name,
            bundle_dir,
            &BackendOptions::default(),
        )
    }

    pub fn open_with_options(
        store_path: impl AsRef<Path>,
        model_name: &str,
        bundle_dir: impl AsRef<Path>,
        options: &BackendOptions,
    ) -> StoreResult<Self> {
        let model = DataModel::load(bundle_dir, model_name).map_err(StoreError::ModelNotFound)?;
        let backend = SqliteBackend::open(store_path, model, options)
            .map_err(StoreError::FailedToLoadBackend)?;
        Self::new(backend)
    }

    pub fn open_in_memory(model: DataModel) -> StoreResult<Self> {
        let backend = SqliteBackend::open_in_memory(model, &BackendOptions::default())
            .map_err(StoreError::FailedToLoadBackend)?;
        Self::new(backend)
    }
}

impl<T> MappedSlotStore<T, MemoryBackend>
where
    T: Storable<SlotRecord>,
{
    pub fn in_memory(model: DataModel) -> StoreResult<Self> {
        let backend = MemoryBackend::new(model).map_err(StoreError::FailedToLoadBackend)?;
        Self::new(backend)
    }
}

#[async_trait]
impl<T, B> SlotStore<T> for MappedSlotStore<T, B>
where
    B: SlotBackend,
    T: Storable<B::Native>,
{
    async fn load(&self) -> StoreResult<T> {
        let started_at = Instant::now();
        let result = self.context.run(load_job::<T, B>).await;
        log_outcome("slot_load", self.store_id, started_at, &result);
        result
    }

    async fn save(&self, item: T) -> StoreResult<T> {
        let started_at = Instant::now();
        let result = self
            .context
            .run(move |state| save_job::<T, B>(state, item))
            .await;
        log_outcome("slot_save", self.store_id, started_at, &result);
        result
    }

    async fn clear(&self) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self.context.run(clear_job::<T, B>).await.map(|_| ());
        log_outcome("slot_clear", self.store_id, started_at, &result);
        result
    }
}

pub(super) fn load_job<T, B>(state: &mut WorkerState<B>) -> StoreResult<T>
where
    B: SlotBackend,
    T: Storable<B::Native>,
{
    let entity = resolve_entity::<T, B>(&state.backend)?;
    let mut native = state
        .backend
        .fetch_one(&entity)?
        .ok_or_else(|| StoreError::ItemNotFound(entity.name.clone()))?;
    native.attach_to(state.store_id);

    T::from_native(native).map_err(StoreError::Mapping)
}

pub(super) fn save_job<T, B>(state: &mut WorkerState<B>, item: T) -> StoreResult<T>
where
    B: SlotBackend,
    T: Storable<B::Native>,
{
    let entity = resolve_entity::<T, B>(&state.backend)?;
    let factory = ModelRecordFactory::new(state.backend.model(), state.store_id);
    let native = item.to_native(&factory)?;
    ensure_bound(&native, &entity, state.store_id)?;
    native.validate().map_err(StoreError::Mapping)?;

    write_transaction(state, |backend| {
        if let Some(existing) = backend.fetch_one(&entity)? {
            backend.delete(&existing)?;
        }
        backend.insert(&native)?;
        Ok(true)
    })?;

    Ok(item)
}

/// Returns whether a stored object was removed.
pub(super) fn clear_job<T, B>(state: &mut WorkerState<B>) -> StoreResult<bool>
where
    B: SlotBackend,
    T: Storable<B::Native>,
{
    let entity = resolve_entity::<T, B>(&state.backend)?;
    clear_entity(state, &entity)
}

pub(super) fn blank_record_job<T, B>(state: &mut WorkerState<B>) -> StoreResult<B::Native>
where
    B: SlotBackend,
    T: Storable<B::Native>,
{
    let identifier = T::backend_identifier()?;
    let entity = state
        .backend
        .model()
        .entity(&identifier)
        .cloned()
        .ok_or(StoreError::UnableToCreateItem(identifier))?;

    clear_entity(state, &entity)?;
    Ok(B::Native::unattached(&entity, state.store_id))
}

fn clear_entity<B: SlotBackend>(
    state: &mut WorkerState<B>,
    entity: &EntityDescription,
) -> StoreResult<bool> {
    write_transaction(state, |backend| match backend.fetch_one(entity)? {
        Some(existing) => {
            backend.delete(&existing)?;
            Ok(true)
        }
        None => Ok(false),
    })
}

fn resolve_entity<T, B>(backend: &B) -> StoreResult<EntityDescription>
where
    B: SlotBackend,
    T: Storable<B::Native>,
{
    let identifier = T::backend_identifier().map_err(StoreError::Mapping)?;
    backend
        .model()
        .entity(&identifier)
        .cloned()
        .ok_or(StoreError::SchemaNotFound(identifier))
}

fn ensure_bound<N: NativeObject>(
    native: &N,
    entity: &EntityDescription,
    store_id: StoreId,
) -> StoreResult<()> {
    if native.entity_name() != entity.name {
        return Err(StoreError::InvalidStore {
            expected: format!("entity `{}`", entity.name),
            found: format!("entity `{}`", native.entity_name()),
        });
    }
    if native.store_id() != store_id {
        return Err(StoreError::InvalidStore {
            expected: format!("store {store_id}"),
            found: format!("store {}", native.store_id()),
        });
    }
    Ok(())
}

/// Runs `body` inside a backend transaction.
///
/// `body` reports whether it changed anything; unchanged transactions are
/// rolled back so they do not count as commits.
fn write_transaction<B, F>(state: &mut WorkerState<B>, body: F) -> StoreResult<bool>
where
    B: SlotBackend,
    F: FnOnce(&mut B) -> DbResult<bool>,
{
    state.backend.begin()?;

    let changed = match body(&mut state.backend) {
        Ok(changed) => changed,
        Err(err) => {
            rollback_quietly(&mut state.backend);
            return Err(err.into());
        }
    };

    if !changed {
        state.backend.rollback()?;
        return Ok(false);
    }

    if let Err(err) = state.backend.commit() {
        rollback_quietly(&mut state.backend);
        return Err(err.into());
    }
    state.commits += 1;
    Ok(true)
}

fn rollback_quietly<B: SlotBackend>(backend: &mut B) {
    if let Err(err) = backend.rollback() {
        warn!(
            "event=slot_rollback module=store status=error backend={} error={}",
            backend.kind(),
            err
        );
    }
}

pub(super) fn log_outcome<R>(
    event: &str,
    store_id: StoreId,
    started_at: Instant,
    result: &StoreResult<R>,
) {
    let duration_ms = started_at.elapsed().as_millis();
    match result {
        Ok(_) => debug!(
            "event={} module=store status=ok store_id={} duration_ms={}",
            event, store_id, duration_ms
        ),
        Err(StoreError::ItemNotFound(_)) => debug!(
            "event={} module=store status=empty store_id={} duration_ms={}",
            event, store_id, duration_ms
        ),
        Err(err) => error!(
            "event={} module=store status=error store_id={} duration_ms={} error_code={} error={}",
            event,
            store_id,
            duration_ms,
            err.code(),
            err
        ),
    }
}
