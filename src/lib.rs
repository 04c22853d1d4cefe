//! Hearth proactive nudge pipeline.
//!
//! Observes family domain signals (an event is tomorrow, a birthday is
//! approaching), matches them against a fixed rule set, applies per-rule
//! cooldowns, and persists actionable nudges for the UI to surface.
//! In-process signal delivery is the load-bearing guarantee; durable
//! logging of signals and nudges to the hosted record store is
//! best-effort.

pub mod config;
pub mod error;
pub mod proactive;
pub mod signals;
pub mod store;

pub use config::Config;
pub use error::{ConfigError, Fault, FaultObserver, StoreError};
pub use proactive::bootstrap::ProactiveBootstrap;
pub use proactive::engine::{NudgeEngine, NudgeRow};
pub use proactive::rules::{default_rules, Condition, NudgeDraft, Rule};
pub use signals::bus::{Signal, SignalBus, SignalListener, SignalPayload, Subscription};
pub use store::{MemoryStore, RestStore, Store};
