//! Per-family nudge engine.
//!
//! Subscribes to the signal bus, evaluates the rule set against each
//! incoming signal, gates matches behind a per-rule cooldown, persists the
//! resulting nudges, and re-emits `ui.nudge.created` for the UI layer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::{Duration, Instant};

use crate::error::{log_observer, Fault, FaultObserver, StoreError};
use crate::proactive::rules::Rule;
use crate::signals::bus::{Signal, SignalBus, SignalListener, SignalPayload, Subscription};
use crate::store::{Store, NUDGES_TABLE};

/// Minimum gap between nudges for the same rule + family.
const COOLDOWN: Duration = Duration::from_secs(6 * 60 * 60);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A persisted nudge row, as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NudgeRow {
    pub id: String,
    pub family_id: String,
    #[serde(default)]
    pub target_id: Option<String>,
    #[serde(rename = "type")]
    pub nudge_type: String,
    pub payload: Value,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Turns matched signals into persisted, rate-limited nudges for one
/// family.
pub struct NudgeEngine {
    family_id: String,
    rules: &'static [Rule],
    store: Arc<dyn Store>,
    bus: SignalBus,
    observer: FaultObserver,
    /// Last successful fire per `"{rule_id}:{family_id}"` key. In-memory
    /// only; a restart clears all cooldowns.
    last_fired: Mutex<HashMap<String, Instant>>,
    subscription: Mutex<Option<Subscription>>,
}

impl NudgeEngine {
    /// Construct an engine for one family and attach it to the bus.
    pub fn spawn(
        family_id: impl Into<String>,
        rules: &'static [Rule],
        store: Arc<dyn Store>,
        bus: SignalBus,
    ) -> Arc<Self> {
        Self::spawn_with_observer(family_id, rules, store, bus, log_observer())
    }

    pub fn spawn_with_observer(
        family_id: impl Into<String>,
        rules: &'static [Rule],
        store: Arc<dyn Store>,
        bus: SignalBus,
        observer: FaultObserver,
    ) -> Arc<Self> {
        let engine = Arc::new(Self {
            family_id: family_id.into(),
            rules,
            store,
            bus: bus.clone(),
            observer,
            last_fired: Mutex::new(HashMap::new()),
            subscription: Mutex::new(None),
        });
        let subscription = bus.subscribe(engine.clone());
        *engine.subscription.lock() = Some(subscription);
        engine
    }

    /// Detach from the bus. Idempotent; dispatches already in flight run to
    /// completion.
    pub fn destroy(&self) {
        if let Some(subscription) = self.subscription.lock().take() {
            subscription.cancel();
        }
    }

    pub fn family_id(&self) -> &str {
        &self.family_id
    }

    async fn evaluate(&self, rule: &Rule, signal: &Signal) {
        let today = chrono::Local::now().date_naive();
        if !rule.when.matches(signal, today) {
            return;
        }

        let key = format!("{}:{}", rule.id, self.family_id);

        // Reserve the cooldown slot before the insert so two interleaved
        // matching signals cannot both pass the gate. Rolled back on
        // failure so the next matching signal retries.
        let previous = {
            let mut last_fired = self.last_fired.lock();
            match last_fired.get(&key) {
                Some(at) if at.elapsed() < COOLDOWN => return,
                _ => last_fired.insert(key.clone(), Instant::now()),
            }
        };

        let draft = (rule.produce)(signal);
        let record = serde_json::json!({
            "family_id": self.family_id,
            "target_id": signal.actor_id,
            "type": draft.nudge_type,
            "payload": draft.payload,
            "status": "pending",
        });

        let nudge = match self.store.insert(NUDGES_TABLE, record).await {
            Ok(row) => match serde_json::from_value::<NudgeRow>(row) {
                Ok(nudge) => nudge,
                Err(e) => {
                    self.restore_cooldown(&key, previous);
                    (self.observer)(&Fault::NudgeInsert {
                        rule_id: rule.id,
                        family_id: self.family_id.clone(),
                        error: StoreError::Malformed(format!("nudge row readback: {}", e)),
                    });
                    return;
                }
            },
            Err(error) => {
                self.restore_cooldown(&key, previous);
                (self.observer)(&Fault::NudgeInsert {
                    rule_id: rule.id,
                    family_id: self.family_id.clone(),
                    error,
                });
                return;
            }
        };

        log::info!(
            "Nudge '{}' created for family {} (rule {})",
            nudge.nudge_type,
            self.family_id,
            rule.id
        );

        self.bus
            .emit(Signal::new(
                self.family_id.clone(),
                signal.actor_id.clone(),
                SignalPayload::NudgeCreated { nudge },
            ))
            .await;
    }

    fn restore_cooldown(&self, key: &str, previous: Option<Instant>) {
        let mut last_fired = self.last_fired.lock();
        match previous {
            Some(at) => {
                last_fired.insert(key.to_string(), at);
            }
            None => {
                last_fired.remove(key);
            }
        }
    }
}

#[async_trait]
impl SignalListener for NudgeEngine {
    async fn on_signal(&self, signal: &Signal) -> Result<(), String> {
        // The bus is process-wide; this engine owns exactly one family.
        if signal.family_id != self.family_id {
            return Ok(());
        }
        // Fixed order, no short-circuit: one signal may fire several rules.
        for rule in self.rules {
            self.evaluate(rule, signal).await;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
