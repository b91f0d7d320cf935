//! The imperative shell around the pure core.
//!
//! Everything that touches an instance lives here: transition registries,
//! dynamic target resolvers, the transition call protocol, the state field
//! and the signals sent around each transition.
//!
//! # Key Concepts
//!
//! - **Registry**: the rules of one transition method, keyed by source pattern
//! - **Method**: a body whose calls are governed by its registry
//! - **Field**: reads and writes the state and owns the bound methods' index
//! - **Signals**: listeners notified before and after each transition

mod error;
mod field;
mod method;
mod registry;
mod signals;
mod transition;

pub use error::{
    BoxError, FieldError, InvalidResultState, TransitionError, TransitionNotAllowed, UnboundMethod,
};
pub use field::{StateField, StateGetter, StateSetter, VariantHook};
pub use method::{can_proceed, has_transition_perm, BindTransition, TransitionBody, TransitionMethod};
pub use registry::TransitionRegistry;
pub use signals::{Listener, SignalKind, Signals, TransitionEvent};
pub use transition::{Computed, DynamicTarget, OnSuccess, ReturnValue, Target, TransitionRecord};
