//! Builder API for declaring transitions.
//!
//! Declaring a model's state machine happens in two phases:
//! 1. each [`TransitionMethod`](crate::effects::TransitionMethod) collects
//!    its rules from [`TransitionBuilder`]s
//! 2. a [`StateFieldBuilder`] binds the methods to one field and freezes them

pub mod error;
pub mod field;
pub mod macros;
pub mod transition;

pub use error::BuildError;
pub use field::StateFieldBuilder;
pub use transition::TransitionBuilder;
