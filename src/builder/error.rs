//! Build errors for transition methods and state fields.

use thiserror::Error;

/// Errors raised while declaring transitions.
///
/// These surface at model setup time, never during a transition call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("Transition source not specified. Call .source(state) before .build()")]
    MissingSource,

    #[error("Duplicate transition for source '{pattern}' on method '{method}'")]
    DuplicateSource { method: String, pattern: String },

    #[error("Method '{method}' is already bound to a state field")]
    AlreadyBound { method: String },

    #[error("Method '{method}' is bound; its transitions can no longer change")]
    Frozen { method: String },

    #[error("Field '{field}' declares method '{method}' twice")]
    DuplicateMethod { field: String, method: String },
}
