//! Per-method transition registry.

use crate::builder::BuildError;
use crate::core::{best_match, first_unmet, Condition, Principal, SourcePattern, StateValue};
use crate::effects::transition::{Target, TransitionRecord};
use std::collections::HashMap;

/// All rules of one transition method, keyed by source pattern.
///
/// Rules keep their registration order for enumeration. Once the owning
/// method is bound to a state field the registry is shared and read-only.
pub struct TransitionRegistry<M> {
    method: String,
    records: Vec<TransitionRecord<M>>,
    by_source: HashMap<SourcePattern, usize>,
}

impl<M> TransitionRegistry<M> {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            records: Vec::new(),
            by_source: HashMap::new(),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Register a rule. Each source pattern may only be registered once.
    pub fn add(&mut self, mut record: TransitionRecord<M>) -> Result<(), BuildError> {
        if self.by_source.contains_key(&record.source) {
            return Err(BuildError::DuplicateSource {
                method: self.method.clone(),
                pattern: record.source.to_string(),
            });
        }
        record.name = self.method.clone();
        self.by_source
            .insert(record.source.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Rules in registration order.
    pub fn records(&self) -> &[TransitionRecord<M>] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The rule active for `current`, if any.
    pub fn lookup(&self, current: &StateValue) -> Option<&TransitionRecord<M>> {
        let candidates = self
            .records
            .iter()
            .map(|record| (&record.source, record.target.state()));
        let pattern = best_match(candidates, current)?;
        self.by_source.get(pattern).map(|&index| &self.records[index])
    }

    /// Whether some rule is active for `current`.
    ///
    /// `+` rules are honoured here too, so this is not a plain key lookup.
    pub fn is_transition_available(&self, current: &StateValue) -> bool {
        self.lookup(current).is_some()
    }

    /// First condition of the active rule that fails for `instance`.
    ///
    /// `None` both when all conditions hold and when no rule is active.
    pub fn unmet_condition(&self, instance: &M, current: &StateValue) -> Option<&Condition<M>> {
        self.lookup(current)
            .and_then(|record| first_unmet(&record.conditions, instance))
    }

    /// An active rule exists and all of its conditions hold.
    pub fn conditions_satisfied(&self, instance: &M, current: &StateValue) -> bool {
        match self.lookup(current) {
            Some(record) => first_unmet(&record.conditions, instance).is_none(),
            None => false,
        }
    }

    /// An active rule exists and `principal` passes its permission.
    pub fn permission_satisfied(
        &self,
        instance: &M,
        current: &StateValue,
        principal: &dyn Principal<M>,
    ) -> bool {
        self.lookup(current)
            .is_some_and(|record| record.permits(instance, principal))
    }

    pub fn resolve_target(&self, current: &StateValue) -> Option<&Target<M>> {
        self.lookup(current).map(TransitionRecord::target)
    }

    /// Fallback state for the active rule; outer `None` means no rule is active.
    pub fn resolve_error_fallback(&self, current: &StateValue) -> Option<Option<&StateValue>> {
        self.lookup(current).map(TransitionRecord::on_error)
    }
}
