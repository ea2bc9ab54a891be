use log_listener::sink::{same_sink, MemorySink, SinkRef};
use log_listener::{here, Callback, LogLevel, LogListener, LogRecord, SourceRegistry};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

fn new_listener() -> (Arc<SourceRegistry>, LogListener) {
    let registry = Arc::new(SourceRegistry::new());
    let listener = LogListener::new(Arc::clone(&registry));
    (registry, listener)
}

fn recorder() -> (Callback, Arc<Mutex<Vec<LogRecord>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (Callback::new(move |r: &LogRecord| sink.lock().push(r.clone())), seen)
}

fn tagger(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> Callback {
    let log = Arc::clone(log);
    Callback::new(move |_| log.lock().push(tag))
}

#[test]
fn start_and_stop_are_idempotent() {
    let (registry, listener) = new_listener();
    let (any, seen) = recorder();
    listener.watch("svc", false).on_any(any);

    listener.start().start();
    assert!(listener.is_running());
    assert_eq!(registry.source("svc").sinks().len(), 1);

    registry.log("svc", LogLevel::Info, "once", here!());
    assert_eq!(seen.lock().len(), 1);

    listener.stop().stop();
    assert!(!listener.is_running());
    assert!(!registry.source("svc").has_sinks());
}

#[test]
fn shadow_mode_preserves_output() {
    let (registry, listener) = new_listener();
    let source = registry.source("svc");
    let original = MemorySink::new();
    let root = MemorySink::new();
    source.add_sink(original.clone());
    registry.root().add_sink(root.clone());

    let (any, seen) = recorder();
    listener.watch("svc", false).on_any(any).start();
    assert!(source.propagate());

    registry.log("svc", LogLevel::Warning, "still visible", here!());
    assert_eq!(original.messages(), vec!["still visible"]);
    assert_eq!(root.messages(), vec!["still visible"]);
    assert_eq!(seen.lock()[0].message, "still visible");
}

#[test]
fn intercept_round_trip_restores_source() {
    let (registry, listener) = new_listener();
    let source = registry.source("svc");
    let first: SinkRef = MemorySink::new();
    let second: SinkRef = MemorySink::new();
    source.add_sink(Arc::clone(&first));
    source.add_sink(Arc::clone(&second));
    let before = source.sinks();

    listener.watch("svc", true).start();
    assert!(!source.propagate());
    assert_eq!(source.sinks().len(), 1);
    assert!(!same_sink(&source.sinks()[0], &first));

    listener.stop();
    let after = source.sinks();
    assert_eq!(after.len(), before.len());
    for (a, b) in after.iter().zip(before.iter()) {
        assert!(same_sink(a, b));
    }
    assert!(source.propagate());
}

#[test]
fn dispatch_order_is_global_level_keyword() {
    let (registry, listener) = new_listener();
    let order = Arc::new(Mutex::new(Vec::new()));

    listener
        .watch("svc", false)
        .on_keyword("err", tagger(&order, "B"), false)
        .unwrap()
        .on_level(LogLevel::Error, tagger(&order, "A"))
        .on_any(tagger(&order, "G"))
        .start();

    registry.log("svc", LogLevel::Error, "an error occurred", here!());
    assert_eq!(*order.lock(), vec!["G", "A", "B"]);
}

#[test]
fn keyword_case_sensitivity() {
    let (registry, listener) = new_listener();
    let (sensitive, sensitive_seen) = recorder();
    let (insensitive, insensitive_seen) = recorder();

    listener
        .watch("svc", false)
        .on_keyword("ERR", sensitive, true)
        .unwrap()
        .on_keyword("ERR", insensitive, false)
        .unwrap()
        .start();

    registry.log("svc", LogLevel::Info, "error", here!());
    assert!(sensitive_seen.lock().is_empty());
    assert_eq!(insensitive_seen.lock().len(), 1);
}

#[test]
fn panicking_callback_does_not_stop_dispatch() {
    let (registry, listener) = new_listener();
    let (later, seen) = recorder();

    listener
        .watch("svc", false)
        .on_level(LogLevel::Error, Callback::new(|_| panic!("boom")))
        .on_level(LogLevel::Error, later)
        .start();

    registry.log("svc", LogLevel::Error, "first", here!());
    registry.log("svc", LogLevel::Error, "second", here!());
    assert_eq!(seen.lock().len(), 2);
}

#[test]
fn off_level_removes_only_the_given_handle() {
    let (registry, listener) = new_listener();
    let order = Arc::new(Mutex::new(Vec::new()));
    let c = tagger(&order, "C");
    let a = tagger(&order, "A");

    listener
        .watch("svc", false)
        .on_level(LogLevel::Error, c)
        .on_level(LogLevel::Error, a.clone())
        .start();

    registry.log("svc", LogLevel::Error, "one", here!());
    listener.off_level(LogLevel::Error, Some(&a));
    registry.log("svc", LogLevel::Error, "two", here!());
    assert_eq!(*order.lock(), vec!["C", "A", "C"]);

    listener.off_level(LogLevel::Error, None);
    registry.log("svc", LogLevel::Error, "three", here!());
    assert_eq!(order.lock().len(), 3);
}

#[test]
fn behaviorally_identical_closure_is_not_removed() {
    let (registry, listener) = new_listener();
    let hits = Arc::new(Mutex::new(0));
    let make = |hits: &Arc<Mutex<i32>>| {
        let hits = Arc::clone(hits);
        Callback::new(move |_| *hits.lock() += 1)
    };

    listener.watch("svc", false).on_any(make(&hits)).start();
    listener.off_any(Some(&make(&hits)));
    registry.log("svc", LogLevel::Info, "still counted", here!());
    assert_eq!(*hits.lock(), 1);
}

#[test]
fn intercepted_error_reaches_keyword_callback_only() {
    let (registry, listener) = new_listener();
    let original = MemorySink::new();
    registry.source("svc.error").add_sink(original.clone());
    let (on_retry, seen) = recorder();

    listener
        .watch("svc.error", true)
        .on_keyword("retry", on_retry, false)
        .unwrap()
        .start();

    registry.log("svc.error", LogLevel::Error, "disk full, retrying", here!());
    {
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].level_name, "ERROR");
        assert_eq!(seen[0].message, "disk full, retrying");
        assert_eq!(seen[0].source, "svc.error");
        assert!(seen[0].file.ends_with("listener.rs"));
    }
    assert!(original.is_empty());

    listener.stop();
    registry.log("svc.error", LogLevel::Error, "disk ok", here!());
    assert_eq!(original.messages(), vec!["disk ok"]);
    assert_eq!(seen.lock().len(), 1);
}

#[test]
fn child_records_reach_watched_parent() {
    let (registry, listener) = new_listener();
    let (any, seen) = recorder();
    listener.watch("hyper", true).on_any(any).start();

    registry.log("hyper.proto.h1", LogLevel::Debug, "parsed request", here!());
    assert_eq!(seen.lock()[0].source, "hyper.proto.h1");
}

#[test]
fn concurrent_records_do_not_interleave() {
    let (registry, listener) = new_listener();
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = {
        let log = Arc::clone(&log);
        Callback::new(move |r: &LogRecord| {
            log.lock().push(format!("{}:start", r.message));
            thread::yield_now();
        })
    };
    let second = {
        let log = Arc::clone(&log);
        Callback::new(move |r: &LogRecord| log.lock().push(format!("{}:end", r.message)))
    };
    listener.watch("svc", false).on_any(first).on_any(second).start();

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..50 {
                    registry.log("svc", LogLevel::Info, format!("{}-{}", t, i), here!());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let log = log.lock();
    assert_eq!(log.len(), 8 * 50 * 2);
    for pair in log.chunks(2) {
        let start = pair[0].strip_suffix(":start").unwrap();
        let end = pair[1].strip_suffix(":end").unwrap();
        assert_eq!(start, end);
    }
}
