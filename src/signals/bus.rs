//! Signal types and the in-process signal bus.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{log_observer, Fault, FaultObserver};
use crate::proactive::engine::NudgeRow;
use crate::store::{Store, SIGNALS_TABLE};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Typed signal payload, tagged by signal kind on the wire
/// (`{"type": ..., "data": {...}}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SignalPayload {
    /// A calendar event starts tomorrow.
    #[serde(rename = "event.tomorrow")]
    EventTomorrow { event_id: String, title: String },

    /// A family member's birthday is coming up.
    #[serde(rename = "birthday.approaching")]
    BirthdayApproaching {
        person_id: String,
        name: String,
        date: NaiveDate,
    },

    /// A shared goal has had no activity lately.
    #[serde(rename = "goal.stalled")]
    GoalStalled { goal_id: String, title: String },

    /// A nudge row was persisted; consumed by the UI layer.
    #[serde(rename = "ui.nudge.created")]
    NudgeCreated { nudge: NudgeRow },
}

impl SignalPayload {
    /// The signal kind tag, matching the wire `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            SignalPayload::EventTomorrow { .. } => "event.tomorrow",
            SignalPayload::BirthdayApproaching { .. } => "birthday.approaching",
            SignalPayload::GoalStalled { .. } => "goal.stalled",
            SignalPayload::NudgeCreated { .. } => "ui.nudge.created",
        }
    }

    /// The payload's date field, where the kind carries one. Drives
    /// day-window rule matching.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            SignalPayload::BirthdayApproaching { date, .. } => Some(*date),
            _ => None,
        }
    }
}

/// An immutable domain event, scoped to one family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub family_id: String,
    pub actor_id: Option<String>,
    /// Epoch milliseconds, assigned by `SignalBus::emit`. Producers leave
    /// it zero.
    pub timestamp: i64,
    #[serde(flatten)]
    pub payload: SignalPayload,
}

impl Signal {
    pub fn new(
        family_id: impl Into<String>,
        actor_id: Option<String>,
        payload: SignalPayload,
    ) -> Self {
        Self {
            family_id: family_id.into(),
            actor_id,
            timestamp: 0,
            payload,
        }
    }

    /// Row shape for the best-effort `signals` log.
    fn to_record(&self) -> Value {
        let data = serde_json::to_value(&self.payload)
            .ok()
            .and_then(|v| v.get("data").cloned())
            .unwrap_or(Value::Null);
        serde_json::json!({
            "family_id": self.family_id,
            "actor_id": self.actor_id,
            "type": self.payload.kind(),
            "data": data,
            "emitted_at": self.timestamp,
        })
    }
}

/// A bus subscriber.
///
/// A returned `Err` is observed and swallowed; it never reaches other
/// listeners or the emitter.
#[async_trait]
pub trait SignalListener: Send + Sync {
    async fn on_signal(&self, signal: &Signal) -> Result<(), String>;
}

struct FnListener<F>(F);

#[async_trait]
impl<F> SignalListener for FnListener<F>
where
    F: Fn(&Signal) -> Result<(), String> + Send + Sync,
{
    async fn on_signal(&self, signal: &Signal) -> Result<(), String> {
        (self.0)(signal)
    }
}

// ---------------------------------------------------------------------------
// Bus
// ---------------------------------------------------------------------------

struct BusInner {
    listeners: Mutex<Vec<(u64, Arc<dyn SignalListener>)>>,
    next_id: AtomicU64,
    store: Option<Arc<dyn Store>>,
    observer: FaultObserver,
}

/// In-process publish/subscribe hub for domain signals.
///
/// Clones share one listener set; tests construct a fresh bus each to avoid
/// cross-test leakage.
#[derive(Clone)]
pub struct SignalBus {
    inner: Arc<BusInner>,
}

/// Capability that removes exactly one bus registration.
///
/// Removal is explicit; dropping the handle leaves the listener attached.
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Detach the registration. Safe to call more than once.
    pub fn cancel(&self) {
        if let Some(inner) = self.bus.upgrade() {
            inner.listeners.lock().retain(|(id, _)| *id != self.id);
        }
    }
}

impl SignalBus {
    /// Bus with no durable signal log.
    pub fn new() -> Self {
        Self::build(None, log_observer())
    }

    /// Bus that best-effort logs every emitted signal to `store`.
    pub fn with_store(store: Arc<dyn Store>) -> Self {
        Self::build(Some(store), log_observer())
    }

    /// Fully wired bus, for hosts that inject a metrics observer.
    pub fn with_store_and_observer(
        store: Option<Arc<dyn Store>>,
        observer: FaultObserver,
    ) -> Self {
        Self::build(store, observer)
    }

    fn build(store: Option<Arc<dyn Store>>, observer: FaultObserver) -> Self {
        Self {
            inner: Arc::new(BusInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                store,
                observer,
            }),
        }
    }

    /// Register a listener. Each call is an independent registration with
    /// its own removal capability.
    pub fn subscribe(&self, listener: Arc<dyn SignalListener>) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().push((id, listener));
        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Register a synchronous closure listener.
    pub fn subscribe_fn<F>(&self, f: F) -> Subscription
    where
        F: Fn(&Signal) -> Result<(), String> + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnListener(f)))
    }

    /// Stamp the signal, dispatch it to every current subscriber in
    /// subscription order, then best-effort log it to the store.
    ///
    /// Listener failures and store failures are observed and swallowed;
    /// in-process delivery is the load-bearing guarantee.
    pub async fn emit(&self, mut signal: Signal) {
        signal.timestamp = Utc::now().timestamp_millis();

        // Snapshot under the lock so subscribe/cancel during dispatch never
        // races the walk. Listeners added mid-dispatch miss this signal.
        let listeners: Vec<Arc<dyn SignalListener>> = {
            self.inner
                .listeners
                .lock()
                .iter()
                .map(|(_, listener)| listener.clone())
                .collect()
        };

        for listener in listeners {
            if let Err(message) = listener.on_signal(&signal).await {
                (self.inner.observer)(&Fault::Listener {
                    signal_type: signal.payload.kind(),
                    message,
                });
            }
        }

        if let Some(store) = &self.inner.store {
            if let Err(error) = store.insert(SIGNALS_TABLE, signal.to_record()).await {
                (self.inner.observer)(&Fault::SignalPersist {
                    signal_type: signal.payload.kind(),
                    error,
                });
            }
        }
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;

    fn event_signal(family_id: &str, event_id: &str) -> Signal {
        Signal::new(
            family_id,
            None,
            SignalPayload::EventTomorrow {
                event_id: event_id.to_string(),
                title: "Swim practice".to_string(),
            },
        )
    }

    fn capture(bus: &SignalBus) -> (Arc<Mutex<Vec<Signal>>>, Subscription) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = bus.subscribe_fn(move |signal| {
            sink.lock().push(signal.clone());
            Ok(())
        });
        (seen, subscription)
    }

    #[tokio::test]
    async fn test_emit_delivers_once_with_stamped_timestamp() {
        let bus = SignalBus::new();
        let (seen, _sub) = capture(&bus);

        let before = Utc::now().timestamp_millis();
        bus.emit(event_signal("f1", "e1")).await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].family_id, "f1");
        assert_eq!(seen[0].payload.kind(), "event.tomorrow");
        assert!(seen[0].timestamp >= before);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_others() {
        let bus = SignalBus::new();

        let _failing_before = bus.subscribe_fn(|_| Err("boom".to_string()));
        let (seen, _sub) = capture(&bus);
        let _failing_after = bus.subscribe_fn(|_| Err("boom again".to_string()));

        bus.emit(event_signal("f1", "e1")).await;
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_listeners_fire_in_subscription_order() {
        let bus = SignalBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = order.clone();
            let _ = bus.subscribe_fn(move |_| {
                order.lock().push(tag);
                Ok(())
            });
        }

        bus.emit(event_signal("f1", "e1")).await;
        assert_eq!(*order.lock(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_cancel_removes_only_that_registration() {
        let bus = SignalBus::new();
        let (removed, removed_sub) = capture(&bus);
        let (kept, _kept_sub) = capture(&bus);

        bus.emit(event_signal("f1", "e1")).await;
        removed_sub.cancel();
        removed_sub.cancel(); // second cancel is a no-op
        bus.emit(event_signal("f1", "e2")).await;

        assert_eq!(removed.lock().len(), 1);
        assert_eq!(kept.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_registrations_are_independent() {
        struct CountingListener {
            seen: Arc<Mutex<Vec<Signal>>>,
        }

        #[async_trait]
        impl SignalListener for CountingListener {
            async fn on_signal(&self, signal: &Signal) -> Result<(), String> {
                self.seen.lock().push(signal.clone());
                Ok(())
            }
        }

        let bus = SignalBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let listener: Arc<dyn SignalListener> = Arc::new(CountingListener { seen: seen.clone() });

        let first = bus.subscribe(listener.clone());
        let _second = bus.subscribe(listener);

        bus.emit(event_signal("f1", "e1")).await;
        assert_eq!(seen.lock().len(), 2);

        first.cancel();
        bus.emit(event_signal("f1", "e2")).await;
        assert_eq!(seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_emit_logs_signal_to_store() {
        let store = Arc::new(MemoryStore::new());
        let bus = SignalBus::with_store(store.clone());

        bus.emit(event_signal("f1", "e1")).await;

        let rows = store.rows(SIGNALS_TABLE);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("type").and_then(|v| v.as_str()), Some("event.tomorrow"));
        assert_eq!(rows[0].get("family_id").and_then(|v| v.as_str()), Some("f1"));
        assert_eq!(
            rows[0].pointer("/data/event_id").and_then(|v| v.as_str()),
            Some("e1")
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_swallowed_and_observed() {
        struct DenyStore;

        #[async_trait]
        impl Store for DenyStore {
            async fn insert(&self, _table: &str, _record: Value) -> Result<Value, StoreError> {
                Err(StoreError::Denied("row-level security".to_string()))
            }
            async fn select(
                &self,
                _table: &str,
                _filters: &[(&str, String)],
            ) -> Result<Vec<Value>, StoreError> {
                Ok(Vec::new())
            }
        }

        let faults = Arc::new(Mutex::new(0usize));
        let counter = faults.clone();
        let observer: FaultObserver = Arc::new(move |fault| {
            if matches!(fault, Fault::SignalPersist { .. }) {
                *counter.lock() += 1;
            }
        });

        let bus = SignalBus::with_store_and_observer(Some(Arc::new(DenyStore)), observer);
        let (seen, _sub) = capture(&bus);

        bus.emit(event_signal("f1", "e1")).await;

        // Delivery happened, the persist fault was observed, nothing escaped.
        assert_eq!(seen.lock().len(), 1);
        assert_eq!(*faults.lock(), 1);
    }

    #[test]
    fn test_signal_wire_shape() {
        let signal = Signal {
            family_id: "f1".to_string(),
            actor_id: Some("p1".to_string()),
            timestamp: 1722470400000,
            payload: SignalPayload::EventTomorrow {
                event_id: "e1".to_string(),
                title: "Recital".to_string(),
            },
        };

        let value = serde_json::to_value(&signal).expect("serialize");
        assert_eq!(value.get("familyId").and_then(|v| v.as_str()), Some("f1"));
        assert_eq!(value.get("type").and_then(|v| v.as_str()), Some("event.tomorrow"));
        assert_eq!(
            value.pointer("/data/event_id").and_then(|v| v.as_str()),
            Some("e1")
        );

        let back: Signal = serde_json::from_value(value).expect("deserialize");
        assert_eq!(back, signal);
    }
}
