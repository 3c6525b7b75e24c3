//! Property-based invariant tests for handler dispatch.
//!
//! 1. `notify` schedules exactly one call per applicable handler, generic
//!    before type-qualified, and nothing for handlers the observer lacks.
//! 2. `notify_named` schedules at most the alias-qualified handler.
//! 3. Nothing runs before the queue is drained.
//! 4. A value type mismatch schedules nothing at all.
//! 5. A sequence of writes through `PropertySupport` yields one notification
//!    per actual change, in write order, with correct old values.

use std::sync::{Arc, Mutex};

use propel_runtime::{
    DispatchError, Dispatcher, HandlerTable, LocalQueue, Observable, PropertyObserver,
    PropertySupport, PropertyValue,
};
use proptest::prelude::*;

// ── Fixtures ──────────────────────────────────────────────────────────────

struct Thermostat {
    props: PropertySupport<Thermostat>,
}

impl Observable for Thermostat {}

struct Probe {
    table: HandlerTable<Probe>,
    calls: Mutex<Vec<(&'static str, i64, i64)>>,
}

impl PropertyObserver for Probe {
    fn handlers(&self) -> &HandlerTable<Self> {
        &self.table
    }
}

fn record(
    tag: &'static str,
) -> impl Fn(&Probe, &Thermostat, &i64, &i64) + Send + Sync + 'static {
    move |p: &Probe, _: &Thermostat, new: &i64, old: &i64| {
        p.calls.lock().unwrap().push((tag, *new, *old))
    }
}

fn probe(generic: bool, typed: bool, alias: bool) -> Arc<Probe> {
    let mut builder = HandlerTable::<Probe>::builder();
    if generic {
        builder = builder.on_property::<Thermostat, i64>("target", record("generic"));
    }
    if typed {
        builder = builder.on_type_property::<Thermostat, i64>("target", record("typed"));
    }
    if alias {
        builder = builder.on_alias_property::<Thermostat, i64>("hall", "target", record("alias"));
    }
    Arc::new(Probe {
        table: builder.build().unwrap(),
        calls: Mutex::new(Vec::new()),
    })
}

fn thermostat(queue: &Arc<LocalQueue>, initial: i64) -> Arc<Thermostat> {
    let t = Arc::new(Thermostat {
        props: PropertySupport::new(Dispatcher::new(queue.clone())),
    });
    t.props.initialize("target", initial).unwrap();
    t
}

fn tags(p: &Probe) -> Vec<&'static str> {
    p.calls.lock().unwrap().iter().map(|(t, _, _)| *t).collect()
}

// ── Properties ────────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn notify_schedules_applicable_handlers_in_order(
        generic in any::<bool>(),
        typed in any::<bool>(),
        alias in any::<bool>(),
        new in any::<i64>(),
        old in any::<i64>(),
    ) {
        let queue = Arc::new(LocalQueue::new());
        let dispatcher = Dispatcher::new(queue.clone());
        let p = probe(generic, typed, alias);
        let t = thermostat(&queue, old);

        dispatcher
            .notify(&p, &t, "target", &PropertyValue::from(new), &PropertyValue::from(old))
            .unwrap();
        prop_assert!(tags(&p).is_empty());

        let expected_len = usize::from(generic) + usize::from(typed);
        prop_assert_eq!(queue.len(), expected_len);
        prop_assert_eq!(queue.run_pending(), expected_len);

        let mut expected = Vec::new();
        if generic {
            expected.push(("generic", new, old));
        }
        if typed {
            expected.push(("typed", new, old));
        }
        prop_assert_eq!(p.calls.lock().unwrap().clone(), expected);
    }

    #[test]
    fn notify_named_targets_only_the_alias(
        generic in any::<bool>(),
        typed in any::<bool>(),
        alias in any::<bool>(),
    ) {
        let queue = Arc::new(LocalQueue::new());
        let dispatcher = Dispatcher::new(queue.clone());
        let p = probe(generic, typed, alias);
        let t = thermostat(&queue, 0);

        dispatcher
            .notify_named(&p, "hall", &t, "target", &PropertyValue::from(1_i64), &PropertyValue::from(0_i64))
            .unwrap();
        queue.run_pending();

        let expected: Vec<&str> = if alias { vec!["alias"] } else { Vec::new() };
        prop_assert_eq!(tags(&p), expected);
    }

    #[test]
    fn value_type_mismatch_schedules_nothing(text in "[a-z]{0,8}") {
        let queue = Arc::new(LocalQueue::new());
        let dispatcher = Dispatcher::new(queue.clone());
        let p = probe(true, true, false);
        let t = thermostat(&queue, 0);

        let err = dispatcher
            .notify(&p, &t, "target", &PropertyValue::from(text.as_str()), &PropertyValue::from(0_i64))
            .unwrap_err();
        let is_mismatch = matches!(err, DispatchError::ValueTypeMismatch { .. });
        prop_assert!(is_mismatch);
        prop_assert!(queue.is_empty());
    }

    #[test]
    fn writes_notify_once_per_change(
        initial in -5i64..=5,
        writes in proptest::collection::vec(-5i64..=5, 0..40),
    ) {
        let queue = Arc::new(LocalQueue::new());
        let p = probe(true, false, false);
        let t = thermostat(&queue, initial);
        t.props.register_observer(&p, None).unwrap();

        let mut expected = Vec::new();
        let mut current = initial;
        for &w in &writes {
            let changed = t.props.set(&t, "target", w).unwrap();
            prop_assert_eq!(changed, w != current);
            if changed {
                expected.push(("generic", w, current));
                current = w;
            }
        }
        queue.run_pending();

        prop_assert_eq!(p.calls.lock().unwrap().clone(), expected);
        prop_assert_eq!(t.props.get::<i64>("target"), Some(current));
    }
}
