//! Exercises the global process registry. Kept to a single test so nothing
//! else in this binary races on the shared state.

use std::sync::Arc;

use telejournal::journal::COLLECT_CHANNEL;
use telejournal::{global, Document, EventHub, JournalAggregator, JournalWatcher, Scope};

#[test]
fn process_registry_init_and_shutdown() {
    global::shutdown();
    assert!(!global::is_initialized());
    assert!(!global::shutdown());

    let first = global::init();
    assert!(global::is_initialized());
    assert!(Arc::ptr_eq(&first, &global::init()));
    assert!(Arc::ptr_eq(&first, &global::process_registry()));

    // Hubs and aggregators built without injection land on the shared registry.
    let hub = EventHub::new();
    assert!(Arc::ptr_eq(hub.process_registry(), &first));

    let journal = JournalAggregator::new().unwrap();
    let second = JournalAggregator::new().unwrap();
    let w = JournalWatcher::new("w", || {
        let mut doc = Document::new();
        doc.put("w.ok", true);
        doc
    });
    journal.register_watcher(&w).unwrap();
    assert_eq!(second.watcher_count().unwrap(), 1);
    assert_eq!(first.list_channels().unwrap(), vec![COLLECT_CHANNEL.to_string()]);
    assert!(hub.channel_info(COLLECT_CHANNEL, Scope::Process).is_ok());

    assert!(global::shutdown());
    assert!(!global::is_initialized());
    // Outstanding handles see an emptied registry.
    assert!(first.is_empty());
    assert!(journal.collect().unwrap_err().is_registry());

    // Lazily re-created on next use, fresh and empty.
    let fresh = global::process_registry();
    assert!(global::is_initialized());
    assert!(!Arc::ptr_eq(&first, &fresh));
    assert!(fresh.is_empty());

    let rebuilt = JournalAggregator::new().unwrap();
    assert_eq!(rebuilt.watcher_count().unwrap(), 0);

    assert!(global::shutdown());
}
