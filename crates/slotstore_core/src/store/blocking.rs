//! Blocking facade over [`MappedSlotStore`].
//!
//! Shares the store's execution context; each call blocks the calling thread
//! until the worker has run the operation. Do not call these methods from
//! inside an async runtime; use the [`SlotStore`] trait there instead.
//!
//! [`SlotStore`]: super::SlotStore

use super::mapped::{
    blank_record_job, clear_job, load_job, log_outcome, save_job, MappedSlotStore,
};
use super::StoreResult;
use crate::backend::SlotBackend;
use crate::mapping::Storable;
use crate::model::record::StoreId;
use std::time::Instant;

pub struct BlockingSlotStore<T, B: SlotBackend> {
    inner: MappedSlotStore<T, B>,
}

impl<T, B> BlockingSlotStore<T, B>
where
    B: SlotBackend,
    T: Storable<B::Native>,
{
    pub fn new(inner: MappedSlotStore<T, B>) -> Self {
        Self { inner }
    }

    pub fn store_id(&self) -> StoreId {
        self.inner.store_id()
    }

    pub fn load(&self) -> StoreResult<T> {
        let started_at = Instant::now();
        let result = self.inner.context.run_blocking(load_job::<T, B>);
        log_outcome("slot_load", self.store_id(), started_at, &result);
        result
    }

    pub fn save(&self, item: T) -> StoreResult<T> {
        let started_at = Instant::now();
        let result = self
            .inner
            .context
            .run_blocking(move |state| save_job::<T, B>(state, item));
        log_outcome("slot_save", self.store_id(), started_at, &result);
        result
    }

    pub fn clear(&self) -> StoreResult<()> {
        let started_at = Instant::now();
        let result = self
            .inner
            .context
            .run_blocking(clear_job::<T, B>)
            .map(|_| ());
        log_outcome("slot_clear", self.store_id(), started_at, &result);
        result
    }

    /// Empties the slot and returns an unattached record bound to this store.
    pub fn blank_record(&self) -> StoreResult<B::Native> {
        let started_at = Instant::now();
        let result = self.inner.context.run_blocking(blank_record_job::<T, B>);
        log_outcome("slot_blank", self.store_id(), started_at, &result);
        result
    }

    pub fn commit_count(&self) -> StoreResult<u64> {
        self.inner.context.run_blocking(|state| Ok(state.commits))
    }

    /// Returns the async store sharing the same execution context.
    pub fn into_inner(self) -> MappedSlotStore<T, B> {
        self.inner
    }

    pub fn close(self) -> StoreResult<()> {
        self.inner.close()
    }
}
