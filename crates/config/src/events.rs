//! Notification bus.
//!
//! A closed set of events the preference layer emits for the grid widget.
//! Event names and payload shapes match what the widget listens for
//! (`theme-changed`, `preset-loaded`, `preset-updated`, `profile-changed`).
//!
//! Publishing is synchronous: every listener registered when `publish` is
//! called runs, in registration order, before it returns. Each listener runs
//! inside its own panic boundary, so one failing listener cannot starve the
//! ones after it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use serde_json::{json, Value};

/// Events emitted by the preference layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Dark/light mode changed
    ThemeChanged { is_dark_mode: bool },
    /// A preset was applied; the grid should re-read its storage keys
    PresetLoaded,
    /// The current preset was overwritten with live values
    PresetUpdated,
    /// The selected profile changed (None when the selection was cleared)
    ProfileChanged { profile_id: Option<String> },
}

/// Event discriminant, used to subscribe to a single event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ThemeChanged,
    PresetLoaded,
    PresetUpdated,
    ProfileChanged,
}

impl EventKind {
    /// Wire name the grid widget keys off
    pub fn name(self) -> &'static str {
        match self {
            EventKind::ThemeChanged => "theme-changed",
            EventKind::PresetLoaded => "preset-loaded",
            EventKind::PresetUpdated => "preset-updated",
            EventKind::ProfileChanged => "profile-changed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "theme-changed" => Some(EventKind::ThemeChanged),
            "preset-loaded" => Some(EventKind::PresetLoaded),
            "preset-updated" => Some(EventKind::PresetUpdated),
            "profile-changed" => Some(EventKind::ProfileChanged),
            _ => None,
        }
    }
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ThemeChanged { .. } => EventKind::ThemeChanged,
            Event::PresetLoaded => EventKind::PresetLoaded,
            Event::PresetUpdated => EventKind::PresetUpdated,
            Event::ProfileChanged { .. } => EventKind::ProfileChanged,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }

    /// Event payload as the widget sees it (`None` for payload-less events)
    pub fn detail(&self) -> Option<Value> {
        match self {
            Event::ThemeChanged { is_dark_mode } => Some(json!({ "isDarkMode": is_dark_mode })),
            Event::PresetLoaded | Event::PresetUpdated => None,
            Event::ProfileChanged { profile_id } => Some(match profile_id {
                Some(id) => Value::String(id.clone()),
                None => Value::Null,
            }),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{} {}", self.name(), detail),
            None => write!(f, "{}", self.name()),
        }
    }
}

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Outcome of a single `publish` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dispatch {
    /// Listeners that returned normally
    pub delivered: usize,
    /// Listeners that panicked
    pub failed: usize,
}

type Callback = Rc<dyn Fn(&Event)>;

struct Listener {
    id: SubscriptionId,
    filter: Option<EventKind>,
    callback: Callback,
}

/// Process-wide publish/subscribe channel. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Rc<RefCell<Vec<Listener>>>,
    next_id: Rc<Cell<u64>>,
    /// Metrics: total listener invocations that panicked
    failed_deliveries: Rc<Cell<u64>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for one event type
    pub fn subscribe<F>(&self, kind: EventKind, listener: F) -> SubscriptionId
    where
        F: Fn(&Event) + 'static,
    {
        self.register(Some(kind), Rc::new(listener))
    }

    /// Listen for every event
    pub fn subscribe_all<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Event) + 'static,
    {
        self.register(None, Rc::new(listener))
    }

    fn register(&self, filter: Option<EventKind>, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get() + 1);
        self.next_id.set(id.0);
        self.listeners.borrow_mut().push(Listener {
            id,
            filter,
            callback,
        });
        id
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        listeners.len() != before
    }

    /// Deliver `event` to every matching listener.
    pub fn publish(&self, event: &Event) -> Dispatch {
        // Snapshot so listeners can (un)subscribe while we dispatch
        let targets: Vec<(SubscriptionId, Callback)> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.filter.map_or(true, |kind| kind == event.kind()))
            .map(|l| (l.id, Rc::clone(&l.callback)))
            .collect();

        log::debug!("Publishing {} to {} listener(s)", event, targets.len());

        let mut dispatch = Dispatch::default();
        for (id, callback) in targets {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => dispatch.delivered += 1,
                Err(_) => {
                    dispatch.failed += 1;
                    self.failed_deliveries.set(self.failed_deliveries.get() + 1);
                    log::error!("Listener {:?} panicked while handling {}", id, event.name());
                }
            }
        }
        dispatch
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn failed_deliveries(&self) -> u64 {
        self.failed_deliveries.get()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .field("failed_deliveries", &self.failed_deliveries())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(bus: &EventBus) -> Rc<RefCell<Vec<Event>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        bus.subscribe_all(move |e| sink.borrow_mut().push(e.clone()));
        seen
    }

    #[test]
    fn test_event_names_match_widget_contract() {
        assert_eq!(Event::PresetLoaded.name(), "preset-loaded");
        assert_eq!(Event::PresetUpdated.name(), "preset-updated");
        assert_eq!(Event::ThemeChanged { is_dark_mode: true }.name(), "theme-changed");
        assert_eq!(
            Event::ProfileChanged { profile_id: None }.name(),
            "profile-changed"
        );
        assert_eq!(EventKind::from_name("preset-loaded"), Some(EventKind::PresetLoaded));
        assert_eq!(EventKind::from_name("resize"), None);
    }

    #[test]
    fn test_theme_changed_detail() {
        let detail = Event::ThemeChanged { is_dark_mode: true }.detail().unwrap();
        assert_eq!(detail["isDarkMode"], Value::Bool(true));
        assert!(Event::PresetLoaded.detail().is_none());
    }

    #[test]
    fn test_filtered_subscription() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        bus.subscribe(EventKind::PresetLoaded, move |_| c.set(c.get() + 1));

        bus.publish(&Event::PresetUpdated);
        bus.publish(&Event::PresetLoaded);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_registration_order() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for n in 0..3 {
            let o = Rc::clone(&order);
            bus.subscribe_all(move |_| o.borrow_mut().push(n));
        }
        bus.publish(&Event::PresetLoaded);
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_panicking_listener_does_not_block_later_ones() {
        let bus = EventBus::new();
        bus.subscribe_all(|_| panic!("listener bug"));
        let seen = recorder(&bus);

        let dispatch = bus.publish(&Event::PresetLoaded);
        assert_eq!(dispatch, Dispatch { delivered: 1, failed: 1 });
        assert_eq!(seen.borrow().len(), 1);
        assert_eq!(bus.failed_deliveries(), 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let id = bus.subscribe_all(move |_| c.set(c.get() + 1));

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.publish(&Event::PresetLoaded);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_subscribe_during_dispatch_applies_next_time() {
        let bus = EventBus::new();
        let late = Rc::new(Cell::new(0));
        let bus_inner = bus.clone();
        let late_inner = Rc::clone(&late);
        bus.subscribe(EventKind::PresetLoaded, move |_| {
            let l = Rc::clone(&late_inner);
            bus_inner.subscribe(EventKind::PresetLoaded, move |_| l.set(l.get() + 1));
        });

        bus.publish(&Event::PresetLoaded);
        assert_eq!(late.get(), 0);
        bus.publish(&Event::PresetLoaded);
        assert_eq!(late.get(), 1);
    }
}
