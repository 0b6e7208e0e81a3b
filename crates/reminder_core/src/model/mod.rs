//! Domain model for persisted notification state.
//!
//! # Responsibility
//! - Define the records and preferences the core persists.
//! - Keep the serialized shapes readable by earlier app builds.
//!
//! # Invariants
//! - Every record is identified by a stable `NotificationId`.
//! - Records carry no schema version; shape changes must stay additive.

pub mod record;
pub mod settings;
