//! Observable editor layout state.
//!
//! # Responsibility
//! - Own the current `ViewState` and its clamping mutators.
//! - Report each field change as `(field, old, new)` to subscribers.
//!
//! # Invariants
//! - Ratios always lie inside their ranges after any mutation.
//! - Subscribers run after the whole mutation is applied.

pub mod model;

pub use model::{ViewField, ViewStateChange, ViewStateModel, ViewSubscriptionId, ViewValue};
