//! Notification scheduler seam.
//!
//! # Responsibility
//! - Define payload/trigger/event types exchanged with the OS scheduler.
//! - Define the async scheduler contract and an in-process implementation.
//!
//! # Invariants
//! - Screens never call the scheduler directly; the lifecycle manager does.

pub mod memory;
pub mod payload;
pub mod scheduler;
