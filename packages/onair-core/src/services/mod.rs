//! Application services layer.
//!
//! The station service is the only long-running service: it owns the
//! [`StationContext`](crate::context::StationContext) and serialises every
//! mutation of it.

pub mod station;

pub use station::{Intent, IntentSender, StationHandle, StationService};
