//! Statecraft: declarative state transitions for model records
//!
//! Statecraft follows a "pure core, imperative shell" layout. Matching a
//! state against source patterns and evaluating conditions and permissions
//! are pure functions in [`core`]. Running a transition (invoking the body,
//! resolving the target, writing the state, notifying listeners) lives in
//! [`effects`]. Saving records without losing concurrent state changes is
//! handled by [`concurrency`].
//!
//! # Core Concepts
//!
//! - **Source patterns**: exact states, `PREFIX-*` families, `*` and `+`
//! - **Transition methods**: bodies guarded by per-method rules
//! - **State fields**: bind methods to a model and own their signals
//! - **Dynamic targets**: pick the next state from a return value or a function
//!
//! # Example
//!
//! ```rust
//! use statecraft::builder::TransitionBuilder;
//! use statecraft::core::{CallArgs, StateValue};
//! use statecraft::effects::{ReturnValue, StateField, TransitionError, TransitionMethod};
//! use std::convert::Infallible;
//!
//! #[derive(Debug)]
//! struct Article {
//!     state: StateValue,
//!     reviewed: bool,
//! }
//!
//! fn get(article: &Article) -> StateValue {
//!     article.state.clone()
//! }
//!
//! fn set(article: &mut Article, state: StateValue) {
//!     article.state = state;
//! }
//!
//! let submit = TransitionMethod::new("submit", |_: &mut Article, _: &CallArgs| {
//!     Ok::<_, Infallible>(())
//! })
//! .rule(TransitionBuilder::new().source("draft").target("review"))
//! .unwrap();
//!
//! let decide = TransitionMethod::new("decide", |article: &mut Article, _: &CallArgs| {
//!     article.reviewed = true;
//!     Ok::<_, Infallible>("published")
//! })
//! .rule(
//!     TransitionBuilder::new()
//!         .source("review")
//!         .dynamic(ReturnValue::one_of(["published", "rejected"])),
//! )
//! .unwrap();
//!
//! let field = StateField::builder("state", get, set)
//!     .method(&submit)
//!     .method(&decide)
//!     .build()
//!     .unwrap();
//!
//! let mut article = Article { state: "draft".into(), reviewed: false };
//! assert!(matches!(
//!     decide.call(&mut article, CallArgs::new()),
//!     Err(TransitionError::NotAllowed(_))
//! ));
//!
//! submit.call(&mut article, CallArgs::new()).unwrap();
//! decide.call(&mut article, CallArgs::new()).unwrap();
//! assert_eq!(field.state(&article), StateValue::from("published"));
//! assert!(article.reviewed);
//! ```

pub mod builder;
pub mod concurrency;
pub mod core;
pub mod effects;

// Re-export commonly used types
pub use builder::{BuildError, StateFieldBuilder, TransitionBuilder};
pub use concurrency::{
    ensure_guarded, ConcurrencyError, ConcurrentRecord, InMemoryStore, Persisted, RecordStore,
};
pub use core::{CallArgs, Condition, Permission, Principal, SourcePattern, StateValue};
pub use effects::{
    can_proceed, has_transition_perm, Computed, ReturnValue, StateField, Target, TransitionError,
    TransitionMethod, TransitionNotAllowed, TransitionRecord,
};
