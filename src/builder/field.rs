//! Builder for state fields.
//!
//! Building a field is the point where a model's transition methods are
//! collected, bound to the field and frozen.

use crate::builder::error::BuildError;
use crate::core::StateValue;
use crate::effects::{
    BindTransition, BoxError, SignalKind, Signals, StateField, StateGetter, StateSetter,
    TransitionEvent, TransitionRegistry, VariantHook,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builder for a [`StateField`] and its transition index.
pub struct StateFieldBuilder<'a, M> {
    name: String,
    model: &'static str,
    get: StateGetter<M>,
    set: StateSetter<M>,
    protected: bool,
    variants: HashMap<StateValue, String>,
    variant_hook: Option<VariantHook<M>>,
    signals: Signals<M>,
    methods: Vec<&'a dyn BindTransition<M>>,
}

impl<'a, M> StateFieldBuilder<'a, M> {
    /// Create a new builder.
    pub fn new(name: impl Into<String>, get: StateGetter<M>, set: StateSetter<M>) -> Self {
        Self {
            name: name.into(),
            model: std::any::type_name::<M>(),
            get,
            set,
            protected: false,
            variants: HashMap::new(),
            variant_hook: None,
            signals: Signals::new(),
            methods: Vec::new(),
        }
    }

    /// Name reported as the signal sender; defaults to the type name.
    pub fn model_name(mut self, model: &'static str) -> Self {
        self.model = model;
        self
    }

    /// Reject direct state assignment; only transitions may write.
    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    /// Register the behaviour an instance takes on in `state`.
    pub fn variant(mut self, state: impl Into<StateValue>, name: impl Into<String>) -> Self {
        self.variants.insert(state.into(), name.into());
        self
    }

    /// Hook switching behaviour before each state write.
    pub fn variant_hook(mut self, hook: VariantHook<M>) -> Self {
        self.variant_hook = Some(hook);
        self
    }

    pub fn on_pre_transition<F>(mut self, listener: F) -> Self
    where
        F: Fn(&TransitionEvent<'_, M>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.signals.connect(SignalKind::PreTransition, listener);
        self
    }

    pub fn on_post_transition<F>(mut self, listener: F) -> Self
    where
        F: Fn(&TransitionEvent<'_, M>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.signals.connect(SignalKind::PostTransition, listener);
        self
    }

    /// Use an existing set of listeners, replacing any connected so far.
    pub fn signals(mut self, signals: Signals<M>) -> Self {
        self.signals = signals;
        self
    }

    /// Declare a transition method of this field.
    pub fn method<T>(mut self, method: &'a T) -> Self
    where
        T: BindTransition<M>,
    {
        self.methods.push(method);
        self
    }

    /// Build the field, bind every declared method to it and freeze them.
    ///
    /// Nothing is bound unless every method can be.
    pub fn build(self) -> Result<Arc<StateField<M>>, BuildError> {
        let mut index: Vec<(String, Arc<TransitionRegistry<M>>)> =
            Vec::with_capacity(self.methods.len());
        for method in &self.methods {
            let name = method.method_name();
            if method.is_bound() {
                return Err(BuildError::AlreadyBound {
                    method: name.to_string(),
                });
            }
            if index.iter().any(|(existing, _)| existing == name) {
                return Err(BuildError::DuplicateMethod {
                    field: self.name.clone(),
                    method: name.to_string(),
                });
            }
            index.push((name.to_string(), method.registry()));
        }

        let field = Arc::new(StateField {
            name: self.name,
            model: self.model,
            get: self.get,
            set: self.set,
            protected: self.protected,
            variants: self.variants,
            variant_hook: self.variant_hook,
            signals: self.signals,
            index,
        });

        for method in self.methods {
            method.bind(Arc::clone(&field))?;
        }
        debug!(
            model = field.model(),
            field = field.name(),
            transitions = field.index.len(),
            "state field built"
        );

        Ok(field)
    }
}
