use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use messenger::{DefaultToken, Messenger, MessengerConfig, MessengerExt, WeakReferenceMessenger};

struct Ping;

struct Counter {
    hits: Arc<AtomicU32>,
}

impl Counter {
    fn new(hits: &Arc<AtomicU32>) -> Arc<Self> {
        Arc::new(Counter { hits: hits.clone() })
    }
}

fn count(r: &Counter, _: &mut Ping) {
    r.hits.fetch_add(1, Ordering::SeqCst);
}

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn collected_recipient_is_reclaimed_by_cleanup() {
    init();

    let messenger = WeakReferenceMessenger::new();
    let hits = Arc::new(AtomicU32::new(0));
    let r = Counter::new(&hits);

    messenger.register_default(&r, count).unwrap();
    messenger.register(&r, 5u16, count).unwrap();
    assert_eq!(messenger.channel_count(), 2);

    // only weak handles remain
    let probe = Arc::downgrade(&r);
    drop(r);
    assert!(probe.upgrade().is_none());

    messenger.send_default(Ping);
    messenger.send(Ping, 5u16);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    messenger.cleanup();
    assert_eq!(messenger.channel_count(), 0);
}

#[test]
fn cleanup_keeps_live_recipients() {
    init();

    let messenger = WeakReferenceMessenger::new();
    let hits = Arc::new(AtomicU32::new(0));
    let alive = Counter::new(&hits);
    let gone = Counter::new(&hits);

    messenger.register_default(&alive, count).unwrap();
    messenger.register_default(&gone, count).unwrap();
    drop(gone);

    messenger.cleanup();

    assert_eq!(messenger.channel_count(), 1);
    assert!(messenger.is_registered_default::<Ping, _>(&alive));

    messenger.send_default(Ping);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn collected_recipient_is_not_reported_registered() {
    init();

    let messenger = WeakReferenceMessenger::new();
    let hits = Arc::new(AtomicU32::new(0));
    let r = Counter::new(&hits);
    let watcher = r.clone();

    messenger.register_default(&r, count).unwrap();
    drop(r);

    // still owned elsewhere
    assert!(messenger.is_registered::<Ping, _, _>(&watcher, &DefaultToken));
    messenger.send_default(Ping);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    drop(watcher);
    messenger.send_default(Ping);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn snapshot_releases_recipients_after_delivery() {
    init();

    let messenger = WeakReferenceMessenger::new();
    let hits = Arc::new(AtomicU32::new(0));
    let r = Counter::new(&hits);

    messenger.register_default(&r, count).unwrap();
    messenger.send_default(Ping);

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(Arc::strong_count(&r), 1);
}

#[test]
fn auto_cleanup_runs_on_registration() {
    init();

    let config = MessengerConfig::default().with_auto_cleanup_interval(3);
    let messenger = WeakReferenceMessenger::with_config(config);
    let hits = Arc::new(AtomicU32::new(0));

    messenger.register(&Counter::new(&hits), 1u8, count).unwrap();
    messenger.register(&Counter::new(&hits), 1u16, count).unwrap();
    assert_eq!(messenger.channel_count(), 2);

    // the third registration triggers a sweep of the two collected ones
    let kept = Counter::new(&hits);
    messenger.register(&kept, 1u32, count).unwrap();
    assert_eq!(messenger.channel_count(), 1);

    messenger.send(Ping, 1u32);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn global_weak_instance_does_not_own_recipients() {
    init();

    let hits = Arc::new(AtomicU32::new(0));
    let r = Counter::new(&hits);

    WeakReferenceMessenger::global()
        .register(&r, "test_weak::global", count)
        .unwrap();
    assert_eq!(Arc::strong_count(&r), 1);

    WeakReferenceMessenger::global().send(Ping, "test_weak::global");
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    WeakReferenceMessenger::global().unregister_all(&r);
    WeakReferenceMessenger::global().send(Ping, "test_weak::global");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
