//! Telemetry and structured logging components for Sightline.
//!
//! Handles log redaction, console/file subscriber setup, and audit event logging.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{AgentEvent, EVENT_TARGET, EventLogEntry, EventLogger};
pub use logger::{LogOptions, init_logger};
pub use redact::redact_sensitive_data;
