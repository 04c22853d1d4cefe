//! Error types and the swallowed-fault observer.
//!
//! Nothing in the nudge pipeline is allowed to fail its host: listener
//! faults, persistence faults, and init faults all degrade to "the feature
//! does less". Each swallowed failure is routed through a `FaultObserver`
//! so it stays diagnosable without changing that contract.

use std::sync::Arc;

use thiserror::Error;

/// Errors from the record store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store transport error: {0}")]
    Network(String),

    #[error("store denied the operation: {0}")]
    Denied(String),

    #[error("unexpected store response: {0}")]
    Malformed(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    /// True when retrying on a later signal could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Network(_))
    }
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHome,

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A failure the pipeline swallowed by contract.
#[derive(Debug)]
pub enum Fault {
    /// A subscriber returned an error during dispatch. Other subscribers
    /// and the emitter are unaffected.
    Listener {
        signal_type: &'static str,
        message: String,
    },
    /// Best-effort signal logging failed; in-process delivery already
    /// happened.
    SignalPersist {
        signal_type: &'static str,
        error: StoreError,
    },
    /// A nudge insert failed. The cooldown was not advanced, so a later
    /// matching signal retries.
    NudgeInsert {
        rule_id: &'static str,
        family_id: String,
        error: StoreError,
    },
    /// Engine construction failed at bootstrap; the family runs without
    /// proactive features.
    Init { family_id: String, message: String },
}

/// Callback receiving every swallowed failure.
pub type FaultObserver = Arc<dyn Fn(&Fault) + Send + Sync>;

/// Observer that logs each fault at warn level.
pub fn log_observer() -> FaultObserver {
    Arc::new(|fault| match fault {
        Fault::Listener {
            signal_type,
            message,
        } => {
            log::warn!("Listener failed on '{}': {}", signal_type, message);
        }
        Fault::SignalPersist { signal_type, error } => {
            log::warn!("Signal log write failed for '{}': {}", signal_type, error);
        }
        Fault::NudgeInsert {
            rule_id,
            family_id,
            error,
        } => {
            log::warn!(
                "Nudge insert failed for rule {} (family {}): {}",
                rule_id,
                family_id,
                error
            );
        }
        Fault::Init { family_id, message } => {
            log::warn!(
                "Nudge engine init failed for family {}: {}",
                family_id,
                message
            );
        }
    })
}
