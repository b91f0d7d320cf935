//! State values and call arguments.
//!
//! A state field stores either a string or an integer. Both flavours share
//! one value type so patterns, targets and snapshots can be compared and
//! hashed uniformly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// The value a state field holds.
///
/// Serialized untagged, so a persisted row stores a bare string or integer.
///
/// # Example
///
/// ```rust
/// use statecraft::core::StateValue;
///
/// let draft = StateValue::from("draft");
/// assert_eq!(draft.as_str(), Some("draft"));
/// assert_eq!(StateValue::from(3).as_int(), Some(3));
/// assert_eq!(draft.to_string(), "draft");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Int(i64),
    Str(String),
}

impl StateValue {
    /// Borrow the string form, if this is a string state.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    /// The integer form, if this is an integer state.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(_) => None,
        }
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for StateValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for StateValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&StateValue> for StateValue {
    fn from(value: &StateValue) -> Self {
        value.clone()
    }
}

/// A stored value that names no variant of a state enum.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{value}' is not a state of {state_type}")]
pub struct UnknownState {
    pub state_type: &'static str,
    pub value: StateValue,
}

/// How a transition body's return value is offered to a return-value target.
///
/// Types that never carry a state can opt in with an empty impl.
pub trait ResultState {
    fn result_state(&self) -> Option<StateValue> {
        None
    }
}

impl ResultState for () {}

impl ResultState for StateValue {
    fn result_state(&self) -> Option<StateValue> {
        Some(self.clone())
    }
}

impl ResultState for String {
    fn result_state(&self) -> Option<StateValue> {
        Some(StateValue::Str(self.clone()))
    }
}

impl ResultState for &'static str {
    fn result_state(&self) -> Option<StateValue> {
        Some(StateValue::from(*self))
    }
}

impl ResultState for i64 {
    fn result_state(&self) -> Option<StateValue> {
        Some(StateValue::Int(*self))
    }
}

impl ResultState for i32 {
    fn result_state(&self) -> Option<StateValue> {
        Some(StateValue::from(*self))
    }
}

impl<T: ResultState> ResultState for Option<T> {
    fn result_state(&self) -> Option<StateValue> {
        self.as_ref().and_then(ResultState::result_state)
    }
}

/// Arguments a transition method was called with.
///
/// Passed unchanged to the body, the signals, dynamic target resolvers and
/// `on_success` callbacks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Set a keyword argument.
    pub fn kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn get_kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }
}
