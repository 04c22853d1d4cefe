//! Lifecycle glue: one nudge engine per active family.
//!
//! The host application reports readiness with a family id; the bootstrap
//! guards engine construction behind the feature toggle and keeps it
//! idempotent under duplicate delivery. No failure here reaches the host.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{log_observer, Fault, FaultObserver};
use crate::proactive::engine::NudgeEngine;
use crate::proactive::rules::default_rules;
use crate::signals::bus::{Signal, SignalBus, SignalPayload};
use crate::store::Store;

pub struct ProactiveBootstrap {
    bus: SignalBus,
    store: Arc<dyn Store>,
    config: Config,
    observer: FaultObserver,
    engines: Mutex<HashMap<String, Arc<NudgeEngine>>>,
}

impl ProactiveBootstrap {
    pub fn new(bus: SignalBus, store: Arc<dyn Store>, config: Config) -> Self {
        Self::with_observer(bus, store, config, log_observer())
    }

    pub fn with_observer(
        bus: SignalBus,
        store: Arc<dyn Store>,
        config: Config,
        observer: FaultObserver,
    ) -> Self {
        Self {
            bus,
            store,
            config,
            observer,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Handle the host's readiness notification for a family.
    ///
    /// A disabled toggle and a duplicate delivery are both quiet no-ops; a
    /// construction failure is observed and leaves the family without
    /// proactive features.
    pub async fn on_family_ready(&self, family_id: &str) {
        if !self.config.proactive_enabled() {
            log::info!(
                "Proactive nudges disabled; skipping engine for family {}",
                family_id
            );
            return;
        }

        let built = {
            let mut engines = self.engines.lock();
            if engines.contains_key(family_id) {
                log::debug!("Engine already running for family {}", family_id);
                Ok(false)
            } else {
                match self.build_engine(family_id) {
                    Ok(engine) => {
                        engines.insert(family_id.to_string(), engine);
                        Ok(true)
                    }
                    Err(message) => Err(message),
                }
            }
        };

        match built {
            Ok(true) => {
                log::info!("Nudge engine started for family {}", family_id);
                if self.config.demo_mode() {
                    self.emit_demo_signal(family_id).await;
                }
            }
            Ok(false) => {}
            Err(message) => {
                (self.observer)(&Fault::Init {
                    family_id: family_id.to_string(),
                    message,
                });
            }
        }
    }

    /// Whether a family currently has an engine.
    pub fn has_engine(&self, family_id: &str) -> bool {
        self.engines.lock().contains_key(family_id)
    }

    /// Number of running engines.
    pub fn engine_count(&self) -> usize {
        self.engines.lock().len()
    }

    /// Tear down every engine. A later readiness notification starts fresh.
    pub fn shutdown(&self) {
        let engines: Vec<Arc<NudgeEngine>> =
            { self.engines.lock().drain().map(|(_, engine)| engine).collect() };
        for engine in engines {
            engine.destroy();
        }
    }

    fn build_engine(&self, family_id: &str) -> Result<Arc<NudgeEngine>, String> {
        if family_id.trim().is_empty() {
            return Err("blank family id in readiness notification".to_string());
        }
        Ok(NudgeEngine::spawn_with_observer(
            family_id,
            default_rules(),
            self.store.clone(),
            self.bus.clone(),
            self.observer.clone(),
        ))
    }

    /// Demo mode only: one synthetic signal so a fresh install shows a
    /// nudge without waiting for real calendar data.
    async fn emit_demo_signal(&self, family_id: &str) {
        log::info!(
            "Demo mode: emitting synthetic event.tomorrow for family {}",
            family_id
        );
        self.bus
            .emit(Signal::new(
                family_id,
                None,
                SignalPayload::EventTomorrow {
                    event_id: "demo-event".to_string(),
                    title: "Family picnic (demo)".to_string(),
                },
            ))
            .await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
