//! Transition methods and the state change protocol.
//!
//! A call runs through these steps:
//! 1. read the current state and find the active rule
//! 2. check the rule's conditions (blocked calls send no signal)
//! 3. send `pre_transition`
//! 4. run the body
//! 5. resolve the target, write it, send `post_transition`, run `on_success`
//!
//! When the body (or a dynamic target) fails, the rule's error fallback is
//! written and announced if one is configured, then the failure is returned.

use crate::builder::{BuildError, TransitionBuilder};
use crate::core::{first_unmet, CallArgs, Principal, ResultState, StateValue};
use crate::effects::error::{InvalidResultState, TransitionError, TransitionNotAllowed, UnboundMethod};
use crate::effects::field::{CallContext, StateField};
use crate::effects::registry::TransitionRegistry;
use crate::effects::signals::SignalKind;
use crate::effects::transition::{Target, TransitionRecord};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

/// Body of a transition method.
pub type TransitionBody<M, R, E> = Arc<dyn Fn(&mut M, &CallArgs) -> Result<R, E> + Send + Sync>;

/// What a state field needs from a method to bind it.
pub trait BindTransition<M> {
    fn method_name(&self) -> &str;

    fn registry(&self) -> Arc<TransitionRegistry<M>>;

    fn is_bound(&self) -> bool;

    /// Attach the method to `field`. A method binds to one field only.
    fn bind(&self, field: Arc<StateField<M>>) -> Result<(), BuildError>;
}

/// A method whose calls are governed by transition rules.
///
/// Rules are added with [`rule`](Self::rule) until a [`StateField`] binds
/// the method; from then on the rules are frozen.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::TransitionBuilder;
/// use statecraft::core::{CallArgs, StateValue};
/// use statecraft::effects::{StateField, TransitionMethod};
/// use std::convert::Infallible;
///
/// struct Post {
///     state: StateValue,
/// }
///
/// let publish = TransitionMethod::new("publish", |_: &mut Post, _: &CallArgs| {
///     Ok::<_, Infallible>(())
/// })
/// .rule(TransitionBuilder::new().source("draft").target("published"))
/// .unwrap();
///
/// fn get(post: &Post) -> StateValue {
///     post.state.clone()
/// }
///
/// fn set(post: &mut Post, state: StateValue) {
///     post.state = state;
/// }
///
/// let _field = StateField::builder("state", get, set)
///     .method(&publish)
///     .build()
///     .unwrap();
///
/// let mut post = Post { state: "draft".into() };
/// publish.call(&mut post, CallArgs::new()).unwrap();
/// assert_eq!(post.state, StateValue::from("published"));
/// assert!(publish.call(&mut post, CallArgs::new()).is_err());
/// ```
pub struct TransitionMethod<M, R, E> {
    name: String,
    registry: Arc<TransitionRegistry<M>>,
    body: TransitionBody<M, R, E>,
    field: OnceLock<Arc<StateField<M>>>,
}

impl<M, R, E> TransitionMethod<M, R, E> {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&mut M, &CallArgs) -> Result<R, E> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            registry: Arc::new(TransitionRegistry::new(name.clone())),
            name,
            body: Arc::new(body),
            field: OnceLock::new(),
        }
    }

    /// Add the rules described by `builder`.
    ///
    /// Fails on a source pattern this method already has, or once bound.
    pub fn rule(mut self, builder: TransitionBuilder<M>) -> Result<Self, BuildError> {
        let registry = Arc::get_mut(&mut self.registry).ok_or_else(|| BuildError::Frozen {
            method: self.name.clone(),
        })?;
        for record in builder.build()? {
            registry.add(record)?;
        }
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transitions(&self) -> &TransitionRegistry<M> {
        &self.registry
    }

    pub fn field(&self) -> Option<&Arc<StateField<M>>> {
        self.field.get()
    }

    fn bound_field(&self) -> Result<&StateField<M>, UnboundMethod> {
        self.field
            .get()
            .map(Arc::as_ref)
            .ok_or_else(|| UnboundMethod {
                method: self.name.clone(),
            })
    }

    fn not_allowed(
        &self,
        field: &StateField<M>,
        state: StateValue,
        condition: Option<&str>,
    ) -> TransitionNotAllowed {
        TransitionNotAllowed {
            model: field.model(),
            method: self.name.clone(),
            state,
            condition: condition.map(str::to_string),
        }
    }

    /// Whether a call would get past source matching and, optionally, the
    /// conditions. Never runs the body or sends signals.
    pub fn can_proceed(&self, instance: &M, check_conditions: bool) -> Result<bool, UnboundMethod> {
        let field = self.bound_field()?;
        let state = field.state(instance);
        Ok(self.registry.lookup(&state).is_some_and(|record| {
            !check_conditions || first_unmet(record.conditions(), instance).is_none()
        }))
    }

    /// Whether `principal` may run this method now: a rule matches, its
    /// conditions hold and its permission passes.
    pub fn has_permission(
        &self,
        instance: &M,
        principal: &dyn Principal<M>,
    ) -> Result<bool, UnboundMethod> {
        let field = self.bound_field()?;
        let state = field.state(instance);
        Ok(self.registry.lookup(&state).is_some_and(|record| {
            first_unmet(record.conditions(), instance).is_none()
                && record.permits(instance, principal)
        }))
    }
}

/// Why the body's outcome could not be committed.
enum Failure<E> {
    Method(E),
    Resolve(InvalidResultState),
}

impl<E> Failure<E>
where
    E: std::error::Error + 'static,
{
    fn as_error(&self) -> &(dyn std::error::Error + 'static) {
        match self {
            Self::Method(err) => err,
            Self::Resolve(err) => err,
        }
    }

    fn into_transition_error(self) -> TransitionError<E> {
        match self {
            Self::Method(err) => TransitionError::Method(err),
            Self::Resolve(err) => TransitionError::InvalidResult(err),
        }
    }
}

impl<M, R, E> TransitionMethod<M, R, E>
where
    R: ResultState,
    E: std::error::Error + 'static,
{
    /// Run the method with transition semantics applied.
    ///
    /// Blocked calls leave the instance untouched and send nothing. A failing
    /// body is returned as [`TransitionError::Method`] after any fallback
    /// state has been written.
    pub fn call(&self, instance: &mut M, args: CallArgs) -> Result<R, TransitionError<E>> {
        let field = self.bound_field()?;
        let source = field.state(instance);

        let Some(record) = self.registry.lookup(&source) else {
            debug!(
                model = field.model(),
                method = %self.name,
                field = field.name(),
                source = %source,
                "transition blocked: no rule for current state"
            );
            return Err(self.not_allowed(field, source, None).into());
        };
        if let Some(condition) = first_unmet(record.conditions(), instance) {
            debug!(
                model = field.model(),
                method = %self.name,
                source = %source,
                condition = condition.name(),
                "transition blocked: condition not met"
            );
            return Err(self.not_allowed(field, source, Some(condition.name())).into());
        }

        let ctx = CallContext {
            field,
            method: &self.name,
            source: &source,
            args: &args,
        };
        ctx.send(SignalKind::PreTransition, instance, record.target(), None)
            .map_err(TransitionError::Listener)?;

        debug!(model = field.model(), method = %self.name, source = %source, "running transition body");
        let outcome = match (self.body)(&mut *instance, &args) {
            Ok(result) => self
                .finalize_target(record, instance, &result, &args)
                .map(|state| (result, state))
                .map_err(Failure::Resolve),
            Err(err) => Err(Failure::Method(err)),
        };

        match outcome {
            Ok((result, state)) => {
                let written = match state {
                    Some(state) => {
                        debug!(
                            model = field.model(),
                            method = %self.name,
                            source = %source,
                            target = %state,
                            "writing transition target"
                        );
                        field.write_state(instance, state.clone());
                        Target::State(state)
                    }
                    None => Target::Unchanged,
                };
                ctx.send(SignalKind::PostTransition, instance, &written, None)
                    .map_err(TransitionError::Listener)?;
                if let Some(on_success) = &record.on_success {
                    on_success(&mut *instance, &source, written.state(), &args);
                }
                Ok(result)
            }
            Err(failure) => {
                if let Some(fallback) = record.on_error() {
                    warn!(
                        model = field.model(),
                        method = %self.name,
                        source = %source,
                        target = %fallback,
                        error = %failure.as_error(),
                        "transition failed, writing error state"
                    );
                    field.write_state(instance, fallback.clone());
                    let written = Target::State(fallback.clone());
                    ctx.send(
                        SignalKind::PostTransition,
                        instance,
                        &written,
                        Some(failure.as_error()),
                    )
                    .map_err(TransitionError::Listener)?;
                }
                Err(failure.into_transition_error())
            }
        }
    }

    /// Concrete state for the rule's target; `None` leaves the state alone.
    fn finalize_target(
        &self,
        record: &TransitionRecord<M>,
        instance: &M,
        result: &R,
        args: &CallArgs,
    ) -> Result<Option<StateValue>, InvalidResultState> {
        match record.target() {
            Target::State(state) => Ok(Some(state.clone())),
            Target::Unchanged => Ok(None),
            Target::Dynamic(resolver) => resolver
                .resolve(instance, record, result.result_state().as_ref(), args)
                .map(Some),
        }
    }
}

impl<M, R, E> BindTransition<M> for TransitionMethod<M, R, E> {
    fn method_name(&self) -> &str {
        &self.name
    }

    fn registry(&self) -> Arc<TransitionRegistry<M>> {
        Arc::clone(&self.registry)
    }

    fn is_bound(&self) -> bool {
        self.field.get().is_some()
    }

    fn bind(&self, field: Arc<StateField<M>>) -> Result<(), BuildError> {
        self.field.set(field).map_err(|_| BuildError::AlreadyBound {
            method: self.name.clone(),
        })
    }
}

impl<M, R, E> fmt::Debug for TransitionMethod<M, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionMethod")
            .field("name", &self.name)
            .field("transitions", &self.registry.records())
            .field("bound", &self.field.get().map(|field| field.name()))
            .finish_non_exhaustive()
    }
}

/// Whether `method` could run on `instance` right now.
pub fn can_proceed<M, R, E>(
    method: &TransitionMethod<M, R, E>,
    instance: &M,
    check_conditions: bool,
) -> Result<bool, UnboundMethod> {
    method.can_proceed(instance, check_conditions)
}

/// Whether `principal` may run `method` on `instance` right now.
pub fn has_transition_perm<M, R, E>(
    method: &TransitionMethod<M, R, E>,
    instance: &M,
    principal: &dyn Principal<M>,
) -> Result<bool, UnboundMethod> {
    method.has_permission(instance, principal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[derive(Debug)]
    struct Light {
        state: StateValue,
    }

    fn get(light: &Light) -> StateValue {
        light.state.clone()
    }

    fn set(light: &mut Light, state: StateValue) {
        light.state = state;
    }

    fn switch() -> TransitionMethod<Light, (), Infallible> {
        TransitionMethod::new("switch", |_: &mut Light, _: &CallArgs| Ok(()))
            .rule(TransitionBuilder::new().source("off").target("on"))
            .unwrap()
    }

    #[test]
    fn unbound_method_reports_itself() {
        let method = switch();
        let mut light = Light { state: "off".into() };

        let err = method.call(&mut light, CallArgs::new()).unwrap_err();
        assert!(matches!(
            &err,
            TransitionError::Unbound(UnboundMethod { method }) if method == "switch"
        ));
        assert_eq!(err.to_string(), "transition 'switch' is not bound to a state field");
        assert_eq!(
            method.can_proceed(&light, true),
            Err(UnboundMethod {
                method: "switch".into()
            })
        );
        assert_eq!(light.state, StateValue::from("off"));
    }

    #[test]
    fn bound_method_is_frozen() {
        let method = switch();
        let _field = StateField::builder("state", get, set)
            .method(&method)
            .build()
            .unwrap();

        let result = method.rule(TransitionBuilder::new().source("on").target("off"));

        assert!(matches!(result, Err(BuildError::Frozen { .. })));
    }

    #[test]
    fn method_binds_once() {
        let method = switch();
        let _first = StateField::builder("state", get, set)
            .method(&method)
            .build()
            .unwrap();

        let second = StateField::builder("other", get, set).method(&method).build();

        assert!(matches!(second, Err(BuildError::AlreadyBound { .. })));
    }

    #[test]
    fn repeated_rules_extend_one_registry() {
        let method = switch()
            .rule(TransitionBuilder::new().source("broken").target("off"))
            .unwrap();

        assert_eq!(method.transitions().records().len(), 2);
        assert!(matches!(
            method.rule(TransitionBuilder::new().source("off").target("on")),
            Err(BuildError::DuplicateSource { .. })
        ));
    }

    #[test]
    fn call_moves_state_and_returns_result() {
        let method = switch();
        let _field = StateField::builder("state", get, set)
            .method(&method)
            .build()
            .unwrap();
        let mut light = Light { state: "off".into() };

        assert_eq!(can_proceed(&method, &light, true), Ok(true));
        method.call(&mut light, CallArgs::new()).unwrap();

        assert_eq!(light.state, StateValue::from("on"));
        assert_eq!(can_proceed(&method, &light, true), Ok(false));
    }

    #[test]
    fn unchanged_target_keeps_state() {
        let check = TransitionMethod::new("check", |_: &mut Light, _: &CallArgs| {
            Ok::<_, Infallible>(7i64)
        })
        .rule(TransitionBuilder::new().source("*"))
        .unwrap();
        let _field = StateField::builder("state", get, set)
            .method(&check)
            .build()
            .unwrap();
        let mut light = Light { state: "off".into() };

        assert_eq!(check.call(&mut light, CallArgs::new()).unwrap(), 7);
        assert_eq!(light.state, StateValue::from("off"));
    }
}
