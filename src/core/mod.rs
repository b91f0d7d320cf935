//! Core transition types and matching logic.
//!
//! This module contains the pure part of the library:
//! - State values and call arguments
//! - Source patterns and the matcher deciding which rule is active
//! - Condition predicates and permission checks
//!
//! Nothing in this module mutates an instance or emits signals.

mod guard;
mod pattern;
mod permission;
mod state;

pub use guard::{first_unmet, Condition};
pub use pattern::{best_match, SourcePattern, ANY, ANY_EXCEPT_TARGET, PREFIX_SUFFIX};
pub use permission::{Permission, Principal};
pub use state::{CallArgs, ResultState, StateValue, UnknownState};
