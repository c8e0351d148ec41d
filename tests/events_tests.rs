// Event bus dispatch order, unsubscription and deferral.

use panovr::core::events::{EventBus, NamedEvent};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
enum Ev {
    Ping(u32),
    Pong,
}

impl NamedEvent for Ev {
    fn name(&self) -> &'static str {
        match self {
            Ev::Ping(_) => "ping",
            Ev::Pong => "pong",
        }
    }
}

#[test]
fn listeners_run_in_registration_order() {
    let bus = EventBus::<Ev>::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    for tag in ["a", "b", "c"] {
        let log = log.clone();
        bus.on("ping", move |_| {
            log.borrow_mut().push(tag);
            Ok(())
        });
    }
    bus.emit(Ev::Ping(1));
    assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
}

#[test]
fn events_only_reach_their_own_name() {
    let bus = EventBus::<Ev>::new();
    let hits = Rc::new(RefCell::new(0));
    let h = hits.clone();
    bus.on("pong", move |_| {
        *h.borrow_mut() += 1;
        Ok(())
    });
    bus.emit(Ev::Ping(1));
    assert_eq!(*hits.borrow(), 0);
    bus.emit(Ev::Pong);
    assert_eq!(*hits.borrow(), 1);
}

#[test]
fn off_removes_only_that_listener() {
    let bus = EventBus::<Ev>::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let l1 = log.clone();
    let first = bus.on("ping", move |_| {
        l1.borrow_mut().push(1);
        Ok(())
    });
    let l2 = log.clone();
    bus.on("ping", move |_| {
        l2.borrow_mut().push(2);
        Ok(())
    });
    assert!(bus.off("ping", first));
    assert!(!bus.off("ping", first));
    assert!(!bus.off("pong", first));
    bus.emit(Ev::Ping(0));
    assert_eq!(*log.borrow(), vec![2]);
    assert_eq!(bus.listener_count("ping"), 1);
}

#[test]
fn failing_listener_does_not_stop_the_rest() {
    let bus = EventBus::<Ev>::new();
    let reached = Rc::new(RefCell::new(false));
    bus.on("ping", |_| Err(anyhow::anyhow!("boom")));
    let r = reached.clone();
    bus.on("ping", move |_| {
        *r.borrow_mut() = true;
        Ok(())
    });
    bus.emit(Ev::Ping(7));
    assert!(*reached.borrow());
}

#[test]
fn deferred_events_flush_in_order_after_outermost_section() {
    let bus = EventBus::<Ev>::new();
    let log = Rc::new(RefCell::new(Vec::new()));
    let l = log.clone();
    bus.on("ping", move |ev| {
        if let Ev::Ping(n) = ev {
            l.borrow_mut().push(*n);
        }
        Ok(())
    });
    bus.deferred(|| {
        bus.emit(Ev::Ping(1));
        bus.deferred(|| bus.emit(Ev::Ping(2)));
        // Inner section ended but the outer one still holds dispatch
        assert!(log.borrow().is_empty());
        bus.emit(Ev::Ping(3));
    });
    assert_eq!(*log.borrow(), vec![1, 2, 3]);
}

#[test]
fn listener_may_emit_and_subscribe_during_dispatch() {
    let bus = Rc::new(EventBus::<Ev>::new());
    let log = Rc::new(RefCell::new(Vec::new()));
    let b = bus.clone();
    let l = log.clone();
    bus.on("ping", move |_| {
        l.borrow_mut().push("ping");
        let l2 = l.clone();
        b.on("pong", move |_| {
            l2.borrow_mut().push("pong");
            Ok(())
        });
        b.emit(Ev::Pong);
        Ok(())
    });
    bus.emit(Ev::Ping(0));
    assert_eq!(*log.borrow(), vec!["ping", "pong"]);
}

#[test]
fn clear_drops_every_listener() {
    let bus = EventBus::<Ev>::new();
    bus.on("ping", |_| Ok(()));
    bus.on("pong", |_| Ok(()));
    bus.clear();
    assert_eq!(bus.listener_count("ping"), 0);
    assert_eq!(bus.listener_count("pong"), 0);
}
