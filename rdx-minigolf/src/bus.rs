//! The synchronous publish/subscribe hub all components talk through.
//!
//! Delivery is in registration order and happens inside `publish`. The bus never
//! holds its lock while a listener runs, so listeners may publish, subscribe or
//! unsubscribe (themselves included) from inside a callback.

use crate::common::{lock, SubscriptionId};
use crate::events::{Event, EventKind, GameEvent};
use slotmap::SlotMap;
use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{error, trace};

/// A listener callback. Returning `Err` (or panicking) is isolated by the bus.
pub type Listener = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

const BUS_SOURCE: &str = "event_bus";

struct Registration {
    kind: EventKind,
    label: String,
    callback: Listener,
}

struct BusInner {
    registrations: SlotMap<SubscriptionId, Registration>,
    order: HashMap<EventKind, Vec<SubscriptionId>>,
    history: VecDeque<Event>,
    capacity: usize,
}

impl BusInner {
    fn record(&mut self, event: &Event) {
        if self.capacity == 0 {
            return;
        }
        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(event.clone());
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        match self.registrations.remove(id) {
            Some(reg) => {
                if let Some(ids) = self.order.get_mut(&reg.kind) {
                    ids.retain(|other| *other != id);
                }
                true
            }
            None => false,
        }
    }
}

/// The event bus. Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
    enabled: Arc<AtomicBool>,
    reporting_error: Arc<AtomicBool>,
}

/// Handle returned by `subscribe`; `unsubscribe` removes exactly that registration.
#[must_use = "dropping a Subscription keeps the listener registered with no way to remove it"]
pub struct Subscription {
    id: SubscriptionId,
    bus: Weak<Mutex<BusInner>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Removes the registration. Returns `false` if it was already gone.
    pub fn unsubscribe(self) -> bool {
        match self.bus.upgrade() {
            Some(inner) => lock(&inner).remove(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl EventBus {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                registrations: SlotMap::with_key(),
                order: HashMap::new(),
                history: VecDeque::with_capacity(history_capacity),
                capacity: history_capacity,
            })),
            enabled: Arc::new(AtomicBool::new(true)),
            reporting_error: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Registers `callback` for `kind`. `label` identifies the listener in logs.
    pub fn subscribe<F>(&self, kind: EventKind, label: impl Into<String>, callback: F) -> Subscription
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut inner = lock(&self.inner);
        let id = inner.registrations.insert(Registration {
            kind,
            label: label.into(),
            callback: Arc::new(callback),
        });
        inner.order.entry(kind).or_default().push(id);
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        lock(&self.inner).remove(id)
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        lock(&self.inner).order.get(&kind).map_or(0, Vec::len)
    }

    /// Publishes `payload` to every current subscriber of its kind.
    ///
    /// A no-op while the bus is disabled.
    pub fn publish(&self, payload: GameEvent, source: &'static str) {
        if !self.is_enabled() {
            trace!(kind = %payload.kind(), "bus disabled, dropping event");
            return;
        }
        let event = Event::new(payload, source);
        let kind = event.kind();

        let targets: Vec<(SubscriptionId, String, Listener)> = {
            let mut inner = lock(&self.inner);
            inner.record(&event);
            match inner.order.get(&kind) {
                Some(ids) => ids
                    .iter()
                    .filter_map(|id| {
                        inner
                            .registrations
                            .get(*id)
                            .map(|reg| (*id, reg.label.clone(), reg.callback.clone()))
                    })
                    .collect(),
                None => Vec::new(),
            }
        };

        for (id, label, callback) in targets {
            // A listener earlier in this dispatch may have removed this one.
            if !lock(&self.inner).registrations.contains_key(id) {
                continue;
            }
            let failure = match catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(format!("{e:#}")),
                Err(panic) => Some(panic_message(panic.as_ref())),
            };
            if let Some(message) = failure {
                error!(
                    event = %kind,
                    payload = %event.summary(),
                    subscriber = %label,
                    "listener failed: {}",
                    message
                );
                self.report_listener_error(kind, label, message);
            }
        }
    }

    fn report_listener_error(&self, original: EventKind, subscriber: String, message: String) {
        if !original.reports_listener_errors() {
            return;
        }
        if self.reporting_error.swap(true, Ordering::SeqCst) {
            return;
        }
        self.publish(
            GameEvent::ErrorOccurred {
                original,
                subscriber,
                message,
            },
            BUS_SOURCE,
        );
        self.reporting_error.store(false, Ordering::SeqCst);
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Oldest-first copy of the diagnostic history.
    pub fn history(&self) -> Vec<Event> {
        lock(&self.inner).history.iter().cloned().collect()
    }

    pub fn clear_history(&self) {
        lock(&self.inner).history.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::config::BusConfig::default().history_capacity)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
