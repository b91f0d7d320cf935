//! Transition records and target resolution.

use crate::core::{CallArgs, Condition, Permission, Principal, SourcePattern, StateValue};
use crate::effects::error::InvalidResultState;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Callback run after a fully successful transition.
///
/// Receives the instance, the source state, the final target (`None` when
/// the rule changes nothing) and the call arguments.
pub type OnSuccess<M> =
    Arc<dyn Fn(&mut M, &StateValue, Option<&StateValue>, &CallArgs) + Send + Sync>;

/// Computes a target state once the transition body has run.
pub trait DynamicTarget<M>: Send + Sync {
    /// Produce the concrete state for this call.
    ///
    /// `result` is the body's return value as offered through
    /// [`ResultState`](crate::core::ResultState).
    fn resolve(
        &self,
        instance: &M,
        transition: &TransitionRecord<M>,
        result: Option<&StateValue>,
        args: &CallArgs,
    ) -> Result<StateValue, InvalidResultState>;

    /// States this resolver may produce; empty means unconstrained.
    fn allowed_states(&self) -> &[StateValue];
}

fn check_allowed(
    state: Option<StateValue>,
    allowed: &[StateValue],
) -> Result<StateValue, InvalidResultState> {
    match state {
        Some(state) if allowed.is_empty() || allowed.contains(&state) => Ok(state),
        state => Err(InvalidResultState {
            state,
            allowed: allowed.to_vec(),
        }),
    }
}

/// Use the body's return value as the target.
#[derive(Clone, Debug, Default)]
pub struct ReturnValue {
    allowed: Vec<StateValue>,
}

impl ReturnValue {
    /// Accept any returned state.
    pub fn any() -> Self {
        Self::default()
    }

    /// Accept only the listed states.
    pub fn one_of<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StateValue>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl<M> DynamicTarget<M> for ReturnValue {
    fn resolve(
        &self,
        _instance: &M,
        _transition: &TransitionRecord<M>,
        result: Option<&StateValue>,
        _args: &CallArgs,
    ) -> Result<StateValue, InvalidResultState> {
        check_allowed(result.cloned(), &self.allowed)
    }

    fn allowed_states(&self) -> &[StateValue] {
        &self.allowed
    }
}

/// Ask a side function for the target, given the instance and call arguments.
pub struct Computed<M> {
    func: Arc<dyn Fn(&M, &CallArgs) -> StateValue + Send + Sync>,
    allowed: Vec<StateValue>,
}

impl<M> Computed<M> {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&M, &CallArgs) -> StateValue + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            allowed: Vec::new(),
        }
    }

    /// Restrict the computed state to the listed values.
    pub fn allowed<I, S>(mut self, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StateValue>,
    {
        self.allowed = allowed.into_iter().map(Into::into).collect();
        self
    }
}

impl<M> DynamicTarget<M> for Computed<M> {
    fn resolve(
        &self,
        instance: &M,
        _transition: &TransitionRecord<M>,
        _result: Option<&StateValue>,
        args: &CallArgs,
    ) -> Result<StateValue, InvalidResultState> {
        check_allowed(Some((self.func)(instance, args)), &self.allowed)
    }

    fn allowed_states(&self) -> &[StateValue] {
        &self.allowed
    }
}

/// Where a transition leads.
pub enum Target<M> {
    State(StateValue),
    Dynamic(Arc<dyn DynamicTarget<M>>),
    /// Validation only; the state is left as is.
    Unchanged,
}

impl<M> Target<M> {
    pub fn dynamic<D>(resolver: D) -> Self
    where
        D: DynamicTarget<M> + 'static,
    {
        Self::Dynamic(Arc::new(resolver))
    }

    /// The concrete target, when known before the body runs.
    pub fn state(&self) -> Option<&StateValue> {
        match self {
            Self::State(state) => Some(state),
            _ => None,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }
}

impl<M> Clone for Target<M> {
    fn clone(&self) -> Self {
        match self {
            Self::State(state) => Self::State(state.clone()),
            Self::Dynamic(resolver) => Self::Dynamic(Arc::clone(resolver)),
            Self::Unchanged => Self::Unchanged,
        }
    }
}

impl<M> fmt::Debug for Target<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State(state) => f.debug_tuple("State").field(state).finish(),
            Self::Dynamic(resolver) => f
                .debug_struct("Dynamic")
                .field("allowed", &resolver.allowed_states())
                .finish(),
            Self::Unchanged => f.write_str("Unchanged"),
        }
    }
}

impl<M> From<StateValue> for Target<M> {
    fn from(state: StateValue) -> Self {
        Self::State(state)
    }
}

/// One `source -> target` rule of a transition method.
///
/// Immutable once registered.
pub struct TransitionRecord<M> {
    pub(crate) name: String,
    pub(crate) source: SourcePattern,
    pub(crate) target: Target<M>,
    pub(crate) on_error: Option<StateValue>,
    pub(crate) conditions: Vec<Condition<M>>,
    pub(crate) permission: Option<Permission<M>>,
    pub(crate) custom: Map<String, Value>,
    pub(crate) on_success: Option<OnSuccess<M>>,
}

impl<M> TransitionRecord<M> {
    /// Name of the method owning this rule.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &SourcePattern {
        &self.source
    }

    pub fn target(&self) -> &Target<M> {
        &self.target
    }

    pub fn on_error(&self) -> Option<&StateValue> {
        self.on_error.as_ref()
    }

    pub fn conditions(&self) -> &[Condition<M>] {
        &self.conditions
    }

    pub fn permission(&self) -> Option<&Permission<M>> {
        self.permission.as_ref()
    }

    /// Opaque metadata for UI layers.
    pub fn custom(&self) -> &Map<String, Value> {
        &self.custom
    }

    pub fn has_on_success(&self) -> bool {
        self.on_success.is_some()
    }

    /// Whether this rule is active for `current`, ignoring the other rules.
    pub fn matches(&self, current: &StateValue) -> bool {
        self.source.matches(current, self.target.state())
    }

    /// Whether `principal` may run this rule on `instance`.
    pub fn permits(&self, instance: &M, principal: &dyn Principal<M>) -> bool {
        self.permission
            .as_ref()
            .is_none_or(|perm| perm.allows(instance, principal))
    }
}

impl<M> fmt::Debug for TransitionRecord<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionRecord")
            .field("name", &self.name)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("on_error", &self.on_error)
            .field("conditions", &self.conditions)
            .field("permission", &self.permission)
            .field("custom", &self.custom)
            .finish_non_exhaustive()
    }
}
