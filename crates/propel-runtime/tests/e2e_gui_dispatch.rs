//! E2E: property writes dispatched onto a live GUI thread.
//!
//! Validates:
//! 1. `Counter` (alias `primary`) `value` 5 → 6 runs the generic handler then
//!    the type-qualified handler, both with `(counter, 6, 5)`.
//! 2. Handlers run on the GUI thread, never on the writer thread.
//! 3. The alias path runs only `property_main_window_title_changed`.
//! 4. After shutdown, writes report `SchedulerUnavailable`.
//! 5. Calls queued for an observer that is dropped before they run never
//!    reach a handler.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use propel_runtime::{
    DispatchError, Dispatcher, GuiHandle, GuiThread, HandlerTable, LoopConfig, Observable,
    PropertyObserver, PropertySupport, PropertyValue, ScheduleError, Scheduler,
};

// ── Fixtures ────────────────────────────────────────────────────────────

struct Counter {
    props: PropertySupport<Counter>,
}

impl Observable for Counter {}

impl Counter {
    fn new(dispatcher: Dispatcher, initial: i64) -> Arc<Self> {
        let counter = Arc::new(Self {
            props: PropertySupport::new(dispatcher),
        });
        counter.props.initialize("value", initial).unwrap();
        counter
    }

    fn set_value(self: &Arc<Self>, value: i64) -> Result<bool, DispatchError> {
        self.props.set(self, "value", value)
    }
}

struct Window;

impl Observable for Window {}

#[derive(Debug, Clone, PartialEq)]
struct Call {
    handler: &'static str,
    counter_ptr: usize,
    new: i64,
    old: i64,
    on_gui_thread: bool,
}

struct Display {
    gui: GuiHandle,
    calls: Mutex<Vec<Call>>,
    titles: Mutex<Vec<(String, String)>>,
    /// Handler invocations, readable after the display is gone.
    hits: Arc<AtomicUsize>,
}

impl Display {
    fn new(gui: GuiHandle) -> Arc<Self> {
        Self::with_hits(gui, Arc::new(AtomicUsize::new(0)))
    }

    fn with_hits(gui: GuiHandle, hits: Arc<AtomicUsize>) -> Arc<Self> {
        Arc::new(Self {
            gui,
            calls: Mutex::new(Vec::new()),
            titles: Mutex::new(Vec::new()),
            hits,
        })
    }

    fn record(&self, handler: &'static str, counter: &Counter, new: i64, old: i64) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Call {
            handler,
            counter_ptr: counter as *const Counter as usize,
            new,
            old,
            on_gui_thread: self.gui.is_gui_thread(),
        });
    }
}

impl PropertyObserver for Display {
    fn handlers(&self) -> &HandlerTable<Self> {
        static TABLE: OnceLock<HandlerTable<Display>> = OnceLock::new();
        TABLE.get_or_init(|| {
            HandlerTable::<Display>::builder()
                .on_property::<Counter, i64>("value", |d, c, new, old| {
                    d.record("property_value_changed", c, *new, *old)
                })
                .on_type_property::<Counter, i64>("value", |d, c, new, old| {
                    d.record("property_counter_value_changed", c, *new, *old)
                })
                .on_alias_property::<Window, String>("main_window", "title", |d, _, new, old| {
                    d.titles.lock().unwrap().push((new.clone(), old.clone()))
                })
                .build()
                .expect("valid handler names")
        })
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Scenario: Counter 5 → 6
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn e2e_counter_change_runs_both_handlers_in_order() {
    let gui = GuiThread::start(LoopConfig::default()).unwrap();
    let dispatcher = Dispatcher::new(gui.scheduler());
    let display = Display::new(gui.handle());

    let counter = Counter::new(dispatcher, 5);
    counter.props.register_observer(&display, Some("primary")).unwrap();

    assert!(counter.set_value(6).unwrap());
    gui.shutdown();

    let ptr = Arc::as_ptr(&counter) as usize;
    let calls = display.calls.lock().unwrap().clone();
    assert_eq!(
        calls,
        vec![
            Call {
                handler: "property_value_changed",
                counter_ptr: ptr,
                new: 6,
                old: 5,
                on_gui_thread: true,
            },
            Call {
                handler: "property_counter_value_changed",
                counter_ptr: ptr,
                new: 6,
                old: 5,
                on_gui_thread: true,
            },
        ]
    );
}

#[test]
fn e2e_repeated_writes_keep_order() {
    let gui = GuiThread::start(LoopConfig::default()).unwrap();
    let display = Display::new(gui.handle());
    let counter = Counter::new(Dispatcher::new(gui.scheduler()), 0);
    counter.props.register_observer(&display, None).unwrap();

    for v in 1..=50 {
        counter.set_value(v).unwrap();
    }
    // Equal write: no notification.
    assert!(!counter.set_value(50).unwrap());
    gui.shutdown();

    let calls = display.calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 100);
    for (i, pair) in calls.chunks(2).enumerate() {
        let v = i as i64 + 1;
        assert_eq!(pair[0].handler, "property_value_changed");
        assert_eq!(pair[1].handler, "property_counter_value_changed");
        assert_eq!((pair[0].new, pair[0].old), (v, v - 1));
        assert_eq!((pair[1].new, pair[1].old), (v, v - 1));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Alias path
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn e2e_alias_path_targets_named_instance() {
    let gui = GuiThread::start(LoopConfig::default()).unwrap();
    let dispatcher = Dispatcher::new(gui.scheduler());
    let display = Display::new(gui.handle());
    let window = Arc::new(Window);

    dispatcher
        .notify_named(
            &display,
            "main_window",
            &window,
            "title",
            &PropertyValue::from("New"),
            &PropertyValue::from("Old"),
        )
        .unwrap();
    dispatcher
        .notify_named(
            &display,
            "settings_window",
            &window,
            "title",
            &PropertyValue::from("Ignored"),
            &PropertyValue::from("Old"),
        )
        .unwrap();
    // The generic path has no `title` handler.
    dispatcher
        .notify(
            &display,
            &window,
            "title",
            &PropertyValue::from("Ignored"),
            &PropertyValue::from("Old"),
        )
        .unwrap();
    gui.shutdown();

    assert_eq!(
        *display.titles.lock().unwrap(),
        vec![("New".to_string(), "Old".to_string())]
    );
    assert!(display.calls.lock().unwrap().is_empty());
}

// ═════════════════════════════════════════════════════════════════════════
// Lifecycle
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn e2e_write_after_shutdown_is_fatal() {
    let gui = GuiThread::start(LoopConfig::default()).unwrap();
    let display = Display::new(gui.handle());
    let counter = Counter::new(Dispatcher::new(gui.scheduler()), 0);
    counter.props.register_observer(&display, None).unwrap();
    gui.shutdown();

    let err = counter.set_value(1).unwrap_err();
    assert_eq!(
        err,
        DispatchError::SchedulerUnavailable(ScheduleError::Closed)
    );
}

#[test]
fn e2e_observer_dropped_before_queue_drains() {
    let gui = GuiThread::start(LoopConfig::default()).unwrap();
    let handle = gui.handle();
    let counter = Counter::new(Dispatcher::new(gui.scheduler()), 0);
    let hits = Arc::new(AtomicUsize::new(0));
    let display = Display::with_hits(handle.clone(), Arc::clone(&hits));
    counter.props.register_observer(&display, None).unwrap();

    // Hold the GUI thread so the calls stay queued while the observer goes away.
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    handle
        .schedule(Box::new(move || {
            let _ = release_rx.recv();
        }))
        .unwrap();

    counter.set_value(1).unwrap();
    let weak = Arc::downgrade(&display);
    drop(display);
    assert!(weak.upgrade().is_none());
    release_tx.send(()).unwrap();

    let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
    handle
        .schedule(Box::new(move || done_tx.send(()).unwrap()))
        .unwrap();
    done_rx
        .recv_timeout(std::time::Duration::from_secs(5))
        .unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(gui.check_panic().is_none());
    gui.shutdown();
}

#[test]
fn e2e_live_observer_counts_every_call() {
    let gui = GuiThread::start(LoopConfig::default()).unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let display = Display::with_hits(gui.handle(), Arc::clone(&hits));
    let counter = Counter::new(Dispatcher::new(gui.scheduler()), 0);
    counter.props.register_observer(&display, None).unwrap();

    counter.set_value(1).unwrap();
    gui.shutdown();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}
