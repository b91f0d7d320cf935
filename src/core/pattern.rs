//! Source patterns and the matcher that picks the active one.
//!
//! Precedence, first match wins:
//! 1. exact value
//! 2. prefix wildcard (`"WRK-*"`), longest pattern first
//! 3. `*`
//! 4. `+`, unless the current state equals that rule's own static target

use super::state::StateValue;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token matching any state.
pub const ANY: &str = "*";
/// Token matching any state except the rule's own target.
pub const ANY_EXCEPT_TARGET: &str = "+";
/// Suffix that turns a string pattern into a prefix wildcard.
pub const PREFIX_SUFFIX: &str = "-*";

/// The source side of one transition rule.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourcePattern {
    Exact(StateValue),
    /// Full pattern text, trailing `-*` included.
    Prefix(String),
    Any,
    AnyExceptTarget,
}

impl SourcePattern {
    /// Classify a raw source value.
    ///
    /// Asterisks anywhere except a trailing `-*` are literal characters.
    pub fn parse(value: impl Into<StateValue>) -> Self {
        match value.into() {
            StateValue::Str(s) if s == ANY => Self::Any,
            StateValue::Str(s) if s == ANY_EXCEPT_TARGET => Self::AnyExceptTarget,
            StateValue::Str(s) if s.ends_with(PREFIX_SUFFIX) => Self::Prefix(s),
            other => Self::Exact(other),
        }
    }

    /// The text a state must start with, for prefix patterns.
    pub fn prefix(&self) -> Option<&str> {
        match self {
            Self::Prefix(p) => Some(&p[..p.len() - 1]),
            _ => None,
        }
    }

    /// The literal this pattern was declared with.
    pub fn literal(&self) -> StateValue {
        match self {
            Self::Exact(v) => v.clone(),
            Self::Prefix(p) => StateValue::Str(p.clone()),
            Self::Any => StateValue::from(ANY),
            Self::AnyExceptTarget => StateValue::from(ANY_EXCEPT_TARGET),
        }
    }

    /// Whether this pattern alone accepts `current`.
    ///
    /// `static_target` is only consulted for `+`; `None` means the rule's
    /// target is dynamic or absent, in which case `+` accepts everything.
    pub fn matches(&self, current: &StateValue, static_target: Option<&StateValue>) -> bool {
        match self {
            Self::Exact(v) => v == current,
            Self::Prefix(_) => match (self.prefix(), current.as_str()) {
                (Some(prefix), Some(state)) => state.starts_with(prefix),
                _ => false,
            },
            Self::Any => true,
            Self::AnyExceptTarget => static_target.is_none_or(|target| target != current),
        }
    }
}

impl fmt::Display for SourcePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.literal())
    }
}

/// Pick the active pattern for `current` among `candidates`.
///
/// Each candidate is a pattern paired with its rule's static target. Ties
/// between equally long prefix patterns resolve to whichever comes first;
/// well-formed registries do not declare them.
pub fn best_match<'a, I>(candidates: I, current: &StateValue) -> Option<&'a SourcePattern>
where
    I: IntoIterator<Item = (&'a SourcePattern, Option<&'a StateValue>)>,
{
    let mut prefix: Option<(&'a SourcePattern, usize)> = None;
    let mut any = None;
    let mut plus = None;

    for (pattern, static_target) in candidates {
        match pattern {
            SourcePattern::Exact(v) if v == current => return Some(pattern),
            SourcePattern::Exact(_) => {}
            SourcePattern::Prefix(text) => {
                if pattern.matches(current, None) {
                    let len = text.chars().count();
                    if prefix.is_none_or(|(_, best)| len > best) {
                        prefix = Some((pattern, len));
                    }
                }
            }
            SourcePattern::Any => any = Some(pattern),
            SourcePattern::AnyExceptTarget => {
                if pattern.matches(current, static_target) {
                    plus = Some(pattern);
                }
            }
        }
    }

    prefix.map(|(pattern, _)| pattern).or(any).or(plus)
}
