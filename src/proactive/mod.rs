//! Proactive nudge pipeline (rules, per-family engines, bootstrap).
//!
//! Signals arrive on the bus; rules turn matched signals into persisted
//! nudges, rate-limited per rule + family; the UI consumes the
//! `ui.nudge.created` signals the engine re-emits.

pub mod bootstrap;
pub mod engine;
pub mod rules;
