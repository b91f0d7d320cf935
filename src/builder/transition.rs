//! Builder for transition rules.

use crate::builder::error::BuildError;
use crate::core::{CallArgs, Condition, Permission, SourcePattern, StateValue};
use crate::effects::{DynamicTarget, OnSuccess, Target, TransitionRecord};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Fluent description of one or more `source -> target` rules.
///
/// Every source listed yields its own record sharing the remaining settings.
pub struct TransitionBuilder<M> {
    sources: Vec<SourcePattern>,
    target: Target<M>,
    on_error: Option<StateValue>,
    conditions: Vec<Condition<M>>,
    permission: Option<Permission<M>>,
    custom: Map<String, Value>,
    on_success: Option<OnSuccess<M>>,
}

impl<M> TransitionBuilder<M> {
    /// Create a new transition builder.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            target: Target::Unchanged,
            on_error: None,
            conditions: Vec::new(),
            permission: None,
            custom: Map::new(),
            on_success: None,
        }
    }

    /// Add a source pattern: a state, `"*"`, `"+"` or a `"PREFIX-*"` wildcard.
    pub fn source(mut self, source: impl Into<StateValue>) -> Self {
        self.sources.push(SourcePattern::parse(source));
        self
    }

    /// Add several source patterns at once.
    pub fn sources<I, S>(mut self, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<StateValue>,
    {
        self.sources
            .extend(sources.into_iter().map(SourcePattern::parse));
        self
    }

    /// Set a static target state.
    pub fn target(mut self, state: impl Into<StateValue>) -> Self {
        self.target = Target::State(state.into());
        self
    }

    /// Resolve the target after the body has run.
    pub fn dynamic<D>(mut self, resolver: D) -> Self
    where
        D: DynamicTarget<M> + 'static,
    {
        self.target = Target::dynamic(resolver);
        self
    }

    /// State to adopt if the body fails.
    pub fn on_error(mut self, state: impl Into<StateValue>) -> Self {
        self.on_error = Some(state.into());
        self
    }

    /// Add a named condition; conditions are checked in the order added.
    pub fn condition<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        self.conditions.push(Condition::new(name, predicate));
        self
    }

    pub fn conditions(mut self, conditions: impl IntoIterator<Item = Condition<M>>) -> Self {
        self.conditions.extend(conditions);
        self
    }

    pub fn permission(mut self, permission: impl Into<Permission<M>>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    /// Attach opaque metadata, passed through to callers untouched.
    pub fn custom(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.custom.insert(key.into(), value.into());
        self
    }

    /// Callback for fully successful transitions.
    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut M, &StateValue, Option<&StateValue>, &CallArgs) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// Build one record per source.
    ///
    /// Records are unnamed until a registry adopts them.
    pub fn build(self) -> Result<Vec<TransitionRecord<M>>, BuildError> {
        if self.sources.is_empty() {
            return Err(BuildError::MissingSource);
        }

        Ok(self
            .sources
            .into_iter()
            .map(|source| TransitionRecord {
                name: String::new(),
                source,
                target: self.target.clone(),
                on_error: self.on_error.clone(),
                conditions: self.conditions.clone(),
                permission: self.permission.clone(),
                custom: self.custom.clone(),
                on_success: self.on_success.clone(),
            })
            .collect())
    }
}

impl<M> Default for TransitionBuilder<M> {
    fn default() -> Self {
        Self::new()
    }
}
