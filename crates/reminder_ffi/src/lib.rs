//! Flutter-facing bindings for the reminder core.

pub mod api;
mod host;
