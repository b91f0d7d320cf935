//! Access-control checks for transitions.

use std::fmt;
use std::sync::Arc;

/// Whoever asks to run a transition.
///
/// `object` is `Some` for a per-instance check and `None` for a global one.
pub trait Principal<M> {
    fn has_perm(&self, permission: &str, object: Option<&M>) -> bool;
}

/// Permission required by a transition rule.
pub enum Permission<M> {
    /// Delegated to [`Principal::has_perm`]; granted per instance or globally.
    Named(String),
    /// Arbitrary predicate over the instance and the principal.
    Check(Arc<dyn Fn(&M, &dyn Principal<M>) -> bool + Send + Sync>),
}

impl<M> Permission<M> {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    pub fn check<F>(predicate: F) -> Self
    where
        F: Fn(&M, &dyn Principal<M>) -> bool + Send + Sync + 'static,
    {
        Self::Check(Arc::new(predicate))
    }

    /// Evaluate against one principal.
    ///
    /// A named permission held either for this instance or globally is enough.
    pub fn allows(&self, instance: &M, principal: &dyn Principal<M>) -> bool {
        match self {
            Self::Named(name) => {
                principal.has_perm(name, Some(instance)) || principal.has_perm(name, None)
            }
            Self::Check(predicate) => predicate(instance, principal),
        }
    }
}

impl<M> Clone for Permission<M> {
    fn clone(&self) -> Self {
        match self {
            Self::Named(name) => Self::Named(name.clone()),
            Self::Check(predicate) => Self::Check(Arc::clone(predicate)),
        }
    }
}

impl<M> fmt::Debug for Permission<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Check(_) => f.write_str("Check(..)"),
        }
    }
}

impl<M> From<&str> for Permission<M> {
    fn from(name: &str) -> Self {
        Self::named(name)
    }
}
