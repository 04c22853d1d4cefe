//! In-process signal fan-out for the Hearth proactive pipeline.
//!
//! Domain producers emit typed signals onto a process-wide bus; the nudge
//! engine and UI-facing consumers subscribe. Delivery to in-process
//! listeners is the load-bearing guarantee; durable logging of each signal
//! is best-effort.

pub mod bus;
pub mod scanner;
