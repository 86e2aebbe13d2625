mod common;

use common::{settings_model, Orphan, Settings};
use slotstore_core::{MemorySlotStore, SqliteSlotStore, StoreError};
use std::sync::Arc;
use std::thread;

#[test]
fn blocking_store_follows_slot_lifecycle() {
    let store = SqliteSlotStore::<Settings>::open_in_memory(settings_model())
        .unwrap()
        .into_blocking();

    assert!(matches!(store.load(), Err(StoreError::ItemNotFound(_))));
    assert_eq!(
        store.save(Settings::themed("v1")).unwrap(),
        Settings::themed("v1")
    );
    store.save(Settings::themed("v2")).unwrap();
    assert_eq!(store.load().unwrap(), Settings::themed("v2"));

    store.clear().unwrap();
    assert!(matches!(store.load(), Err(StoreError::ItemNotFound(_))));
    store.close().unwrap();
}

#[test]
fn blocking_and_async_views_share_one_slot() {
    let blocking = MemorySlotStore::<Settings>::in_memory(settings_model())
        .unwrap()
        .into_blocking();
    let store_id = blocking.store_id();
    blocking.save(Settings::themed("dark")).unwrap();

    let store = blocking.into_inner();
    assert_eq!(store.store_id(), store_id);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let loaded = runtime.block_on(async {
        use slotstore_core::SlotStore;
        store.load().await
    });
    assert_eq!(loaded.unwrap(), Settings::themed("dark"));
}

#[test]
fn blocking_callers_on_many_threads_are_serialized() {
    let store = Arc::new(
        MemorySlotStore::<Settings>::in_memory(settings_model())
            .unwrap()
            .into_blocking(),
    );

    let workers = (0..8)
        .map(|index| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for round in 0..5 {
                    store
                        .save(Settings::themed(&format!("{index}-{round}")))
                        .unwrap();
                    store.load().unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(store.commit_count().unwrap(), 40);
    assert!(store.load().is_ok());
}

#[test]
fn blocking_blank_record_reports_missing_entity() {
    let store = MemorySlotStore::<Orphan>::in_memory(settings_model())
        .unwrap()
        .into_blocking();

    assert!(matches!(
        store.blank_record(),
        Err(StoreError::UnableToCreateItem(entity)) if entity == "Orphan"
    ));
}
