//! Errors raised while running or inspecting transitions.

use crate::core::StateValue;
use thiserror::Error;

/// Error type listeners may fail with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// No rule matches the current state, or a condition of the matched rule failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("can't run transition '{method}' on {model} from state '{state}'")]
pub struct TransitionNotAllowed {
    pub model: &'static str,
    pub method: String,
    pub state: StateValue,
    /// Name of the first condition that did not hold.
    pub condition: Option<String>,
}

/// A dynamic target produced a state outside its allow-list.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid result state {state:?}, expected one of {allowed:?}")]
pub struct InvalidResultState {
    /// `None` when the body returned nothing usable as a state.
    pub state: Option<StateValue>,
    pub allowed: Vec<StateValue>,
}

/// Failure of one transition call.
///
/// `Method` carries the body's own error unchanged.
#[derive(Debug, Error)]
pub enum TransitionError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    NotAllowed(#[from] TransitionNotAllowed),

    #[error(transparent)]
    InvalidResult(#[from] InvalidResultState),

    #[error(transparent)]
    Method(E),

    #[error("transition listener failed: {0}")]
    Listener(#[source] BoxError),

    #[error(transparent)]
    Unbound(#[from] UnboundMethod),
}

impl<E> TransitionError<E>
where
    E: std::error::Error + 'static,
{
    /// The body's error, if that is what failed.
    pub fn method_error(&self) -> Option<&E> {
        match self {
            Self::Method(err) => Some(err),
            _ => None,
        }
    }

    pub fn into_method_error(self) -> Option<E> {
        match self {
            Self::Method(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_not_allowed(&self) -> bool {
        matches!(self, Self::NotAllowed(_))
    }
}

/// A query was made through a method that no state field has bound.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transition '{method}' is not bound to a state field")]
pub struct UnboundMethod {
    pub method: String,
}

/// Direct state field access errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("direct state modification is not allowed for field '{field}'")]
    Protected { field: String },
}
