//! State field: where a model keeps its state and which methods move it.

use crate::builder::StateFieldBuilder;
use crate::core::{first_unmet, CallArgs, Principal, StateValue};
use crate::effects::error::{BoxError, FieldError};
use crate::effects::registry::TransitionRegistry;
use crate::effects::signals::{SignalKind, Signals, TransitionEvent};
use crate::effects::transition::{Target, TransitionRecord};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Reads the in-memory state of an instance.
pub type StateGetter<M> = fn(&M) -> StateValue;
/// Writes the in-memory state of an instance.
pub type StateSetter<M> = fn(&mut M, StateValue);
/// Switches an instance to the behaviour registered for its new state.
pub type VariantHook<M> = fn(&mut M, Option<&str>);

/// A state field of model `M`, frozen once built.
///
/// Owns the index of every transition method bound to it, in declaration
/// order, plus the signals sent around those transitions.
pub struct StateField<M> {
    pub(crate) name: String,
    pub(crate) model: &'static str,
    pub(crate) get: StateGetter<M>,
    pub(crate) set: StateSetter<M>,
    pub(crate) protected: bool,
    pub(crate) variants: HashMap<StateValue, String>,
    pub(crate) variant_hook: Option<VariantHook<M>>,
    pub(crate) signals: Signals<M>,
    pub(crate) index: Vec<(String, Arc<TransitionRegistry<M>>)>,
}

impl<M> StateField<M> {
    /// Start declaring a field with its accessors.
    pub fn builder<'a>(
        name: impl Into<String>,
        get: StateGetter<M>,
        set: StateSetter<M>,
    ) -> StateFieldBuilder<'a, M> {
        StateFieldBuilder::new(name, get, set)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Model name reported as the signal sender.
    pub fn model(&self) -> &'static str {
        self.model
    }

    pub fn is_protected(&self) -> bool {
        self.protected
    }

    pub fn signals(&self) -> &Signals<M> {
        &self.signals
    }

    /// Current in-memory state of `instance`.
    pub fn state(&self, instance: &M) -> StateValue {
        (self.get)(instance)
    }

    /// Assign a state directly, outside any transition.
    pub fn set_state(&self, instance: &mut M, state: StateValue) -> Result<(), FieldError> {
        if self.protected {
            return Err(FieldError::Protected {
                field: self.name.clone(),
            });
        }
        self.write_state(instance, state);
        Ok(())
    }

    /// Write path used by transitions; ignores protection.
    pub(crate) fn write_state(&self, instance: &mut M, state: StateValue) {
        if let Some(hook) = self.variant_hook {
            if !self.variants.is_empty() {
                hook(&mut *instance, self.variant_for(&state));
            }
        }
        (self.set)(instance, state);
    }

    /// Behaviour name registered for `state`.
    pub fn variant_for(&self, state: &StateValue) -> Option<&str> {
        self.variants.get(state).map(String::as_str)
    }

    /// Behaviour name registered for the current state of `instance`.
    pub fn variant_of(&self, instance: &M) -> Option<&str> {
        self.variant_for(&self.state(instance))
    }

    /// Bound transition method names, in declaration order.
    pub fn transition_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.index.iter().map(|(name, _)| name.as_str())
    }

    pub fn registry(&self, method: &str) -> Option<&TransitionRegistry<M>> {
        self.index
            .iter()
            .find(|(name, _)| name == method)
            .map(|(_, registry)| registry.as_ref())
    }

    /// Every rule of every bound method.
    pub fn all_transitions(&self) -> impl Iterator<Item = &TransitionRecord<M>> + '_ {
        self.index
            .iter()
            .flat_map(|(_, registry)| registry.records().iter())
    }

    /// Rules that could run now: source matches and all conditions hold.
    ///
    /// The state is read when this is called; call again to see changes.
    pub fn available_transitions<'a>(
        &'a self,
        instance: &'a M,
    ) -> impl Iterator<Item = &'a TransitionRecord<M>> + 'a {
        let state = self.state(instance);
        self.index.iter().filter_map(move |(_, registry)| {
            registry
                .lookup(&state)
                .filter(|record| first_unmet(record.conditions(), instance).is_none())
        })
    }

    /// Available rules that `principal` is also permitted to run.
    pub fn available_transitions_for<'a>(
        &'a self,
        instance: &'a M,
        principal: &'a dyn Principal<M>,
    ) -> impl Iterator<Item = &'a TransitionRecord<M>> + 'a {
        self.available_transitions(instance)
            .filter(move |record| record.permits(instance, principal))
    }
}

impl<M> fmt::Debug for StateField<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateField")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("protected", &self.protected)
            .field("variants", &self.variants)
            .field("transitions", &self.transition_names().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// What one transition call sends with each signal.
pub(crate) struct CallContext<'a, M> {
    pub field: &'a StateField<M>,
    pub method: &'a str,
    pub source: &'a StateValue,
    pub args: &'a CallArgs,
}

impl<M> CallContext<'_, M> {
    pub fn send(
        &self,
        kind: SignalKind,
        instance: &M,
        target: &Target<M>,
        exception: Option<&(dyn std::error::Error + 'static)>,
    ) -> Result<(), BoxError> {
        self.field.signals.send(&TransitionEvent {
            kind,
            sender: self.field.model,
            instance,
            method_name: self.method,
            field: &self.field.name,
            source: self.source,
            target,
            args: self.args,
            exception,
        })
    }
}
