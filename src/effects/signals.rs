//! Pre/post transition signals.
//!
//! Listeners run synchronously, in connection order. The first listener
//! error stops delivery and is returned to the transition caller; later
//! listeners for that event do not run.

use crate::core::{CallArgs, StateValue};
use crate::effects::error::BoxError;
use crate::effects::transition::Target;
use std::fmt;
use std::sync::Arc;

/// Which side of the transition body a signal is sent from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SignalKind {
    PreTransition,
    PostTransition,
}

/// Payload delivered to listeners.
///
/// For the pre-transition signal `target` is the declared target, possibly
/// still dynamic. For the post-transition signal it is the state that was
/// written, or [`Target::Unchanged`].
pub struct TransitionEvent<'a, M> {
    pub kind: SignalKind,
    pub sender: &'static str,
    pub instance: &'a M,
    pub method_name: &'a str,
    pub field: &'a str,
    pub source: &'a StateValue,
    pub target: &'a Target<M>,
    pub args: &'a CallArgs,
    /// Set only on the error-fallback path.
    pub exception: Option<&'a (dyn std::error::Error + 'static)>,
}

impl<M> fmt::Debug for TransitionEvent<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionEvent")
            .field("kind", &self.kind)
            .field("sender", &self.sender)
            .field("method_name", &self.method_name)
            .field("field", &self.field)
            .field("source", &self.source)
            .field("target", &self.target)
            .field("args", &self.args)
            .field("exception", &self.exception.map(|err| err.to_string()))
            .finish_non_exhaustive()
    }
}

/// A connected listener.
pub type Listener<M> = Arc<dyn Fn(&TransitionEvent<'_, M>) -> Result<(), BoxError> + Send + Sync>;

/// Ordered listener lists for both signals.
pub struct Signals<M> {
    pre_transition: Vec<Listener<M>>,
    post_transition: Vec<Listener<M>>,
}

impl<M> Signals<M> {
    pub fn new() -> Self {
        Self {
            pre_transition: Vec::new(),
            post_transition: Vec::new(),
        }
    }

    pub fn connect<F>(&mut self, kind: SignalKind, listener: F)
    where
        F: Fn(&TransitionEvent<'_, M>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let listener: Listener<M> = Arc::new(listener);
        match kind {
            SignalKind::PreTransition => self.pre_transition.push(listener),
            SignalKind::PostTransition => self.post_transition.push(listener),
        }
    }

    pub fn listener_count(&self, kind: SignalKind) -> usize {
        self.listeners(kind).len()
    }

    fn listeners(&self, kind: SignalKind) -> &[Listener<M>] {
        match kind {
            SignalKind::PreTransition => &self.pre_transition,
            SignalKind::PostTransition => &self.post_transition,
        }
    }

    /// Deliver `event` to every listener of its kind, stopping at the first error.
    pub fn send(&self, event: &TransitionEvent<'_, M>) -> Result<(), BoxError> {
        self.listeners(event.kind)
            .iter()
            .try_for_each(|listener| listener(event))
    }
}

impl<M> Default for Signals<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for Signals<M> {
    fn clone(&self) -> Self {
        Self {
            pre_transition: self.pre_transition.clone(),
            post_transition: self.post_transition.clone(),
        }
    }
}
