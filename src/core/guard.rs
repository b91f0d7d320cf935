//! Condition predicates gating a matched transition.
//!
//! Conditions are pure boolean functions of the instance. A transition only
//! proceeds when every condition of its matched rule holds.

use std::fmt;
use std::sync::Arc;

/// Named, side-effect-free predicate over an instance.
///
/// The name is what a blocked transition reports as its failing condition.
///
/// # Example
///
/// ```rust
/// use statecraft::core::Condition;
///
/// struct Post {
///     body: String,
/// }
///
/// let has_body = Condition::new("has_body", |p: &Post| !p.body.is_empty());
///
/// assert!(has_body.check(&Post { body: "hello".into() }));
/// assert!(!has_body.check(&Post { body: String::new() }));
/// assert_eq!(has_body.name(), "has_body");
/// ```
pub struct Condition<M> {
    name: String,
    predicate: Arc<dyn Fn(&M) -> bool + Send + Sync>,
}

impl<M> Condition<M> {
    /// Create a condition from a pure predicate function.
    pub fn new<F>(name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&M) -> bool + Send + Sync + 'static,
    {
        Condition {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Evaluate the predicate against an instance.
    pub fn check(&self, instance: &M) -> bool {
        (self.predicate)(instance)
    }
}

impl<M> Clone for Condition<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<M> fmt::Debug for Condition<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Condition").field(&self.name).finish()
    }
}

/// First condition in `conditions` that does not hold, in order.
///
/// Later conditions are not evaluated once one fails.
pub fn first_unmet<'a, M>(conditions: &'a [Condition<M>], instance: &M) -> Option<&'a Condition<M>> {
    conditions.iter().find(|c| !c.check(instance))
}
