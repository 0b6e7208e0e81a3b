//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate scheduler and repository calls into use-case APIs.
//! - Keep UI/FFI layers decoupled from scheduler and storage details.

pub mod clock;
pub mod lifecycle;
pub mod routing;
