//! Document Approval Workflow
//!
//! This example demonstrates a review workflow declared with transition methods.
//!
//! Key concepts:
//! - Linear workflow (draft -> review -> approved/rejected -> published)
//! - Conditions and permissions gate transitions
//! - A dynamic target picks approved or rejected from the reviewer's verdict
//! - An error fallback records failed publications
//! - Optimistic saves reject edits made from a stale copy
//!
//! Run with: cargo run --example document_workflow

use serde::{Deserialize, Serialize};
use statecraft::builder::TransitionBuilder;
use statecraft::concurrency::{ensure_guarded, ConcurrentRecord, InMemoryStore, Persisted};
use statecraft::core::{CallArgs, Principal, StateValue};
use statecraft::effects::{ReturnValue, StateField, TransitionEvent, TransitionMethod};
use statecraft::state_enum;
use std::convert::Infallible;
use thiserror::Error;
use uuid::Uuid;

state_enum! {
    enum DocState {
        Draft => "draft",
        Review => "review",
        Approved => "approved",
        Rejected => "rejected",
        Published => "published",
        PublishFailed => "publish_failed",
    }
}

// Document entity
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Document {
    title: String,
    state: StateValue,
    word_count: usize,
}

impl Persisted for Document {
    const TABLE: &'static str = "documents";

    fn state_columns() -> &'static [&'static str] {
        &["state"]
    }
}

fn get(doc: &Document) -> StateValue {
    doc.state.clone()
}

fn set(doc: &mut Document, state: StateValue) {
    doc.state = state;
}

struct Editor;

impl Principal<Document> for Editor {
    fn has_perm(&self, permission: &str, _object: Option<&Document>) -> bool {
        permission == "documents.review"
    }
}

#[derive(Debug, Error)]
#[error("CDN rejected upload of '{0}'")]
struct PublishError(String);

fn main() {
    println!("=== Document Approval Workflow ===\n");

    let submit = TransitionMethod::new("submit", |_: &mut Document, _: &CallArgs| {
        Ok::<_, Infallible>(())
    })
    .rule(
        TransitionBuilder::new()
            .source(DocState::Draft)
            .target(DocState::Review)
            .condition("long_enough", |doc: &Document| doc.word_count >= 100),
    )
    .unwrap();

    let review = TransitionMethod::new("review", |_: &mut Document, args: &CallArgs| {
        let approve = args.get(0).and_then(|v| v.as_bool()).unwrap_or(false);
        let verdict = if approve {
            DocState::Approved
        } else {
            DocState::Rejected
        };
        Ok::<_, Infallible>(StateValue::from(verdict))
    })
    .rule(
        TransitionBuilder::new()
            .source(DocState::Review)
            .dynamic(ReturnValue::one_of([DocState::Approved, DocState::Rejected]))
            .permission("documents.review"),
    )
    .unwrap();

    let publish = TransitionMethod::new("publish", |doc: &mut Document, _: &CallArgs| {
        if doc.title.is_empty() {
            return Err(PublishError(doc.title.clone()));
        }
        Ok(())
    })
    .rule(
        TransitionBuilder::new()
            .source(DocState::Approved)
            .target(DocState::Published)
            .on_error(DocState::PublishFailed)
            .on_success(|doc: &mut Document, _, _, _| {
                println!("  [Hook] '{}' is live", doc.title);
            }),
    )
    .unwrap();

    let field = StateField::builder("state", get, set)
        .model_name("Document")
        .protected()
        .on_post_transition(|event: &TransitionEvent<'_, Document>| {
            println!(
                "  [Audit] {}: {} -> {:?}",
                event.method_name,
                event.source,
                event.target.state().map(ToString::to_string)
            );
            Ok(())
        })
        .method(&submit)
        .method(&review)
        .method(&publish)
        .build()
        .unwrap();

    ensure_guarded::<Document>(&field).unwrap();
    println!("Transitions: {:?}\n", field.transition_names().collect::<Vec<_>>());

    let store = InMemoryStore::new();
    let id = Uuid::new_v4();
    let mut doc = ConcurrentRecord::new(
        id,
        Document {
            title: "Quarterly report".to_string(),
            state: DocState::Draft.into(),
            word_count: 250,
        },
    )
    .unwrap();
    doc.save(&store).unwrap();

    println!("Step 1: Submit for review");
    let available: Vec<_> = field.available_transitions(&doc).map(|t| t.name()).collect();
    println!("  Available: {available:?}");
    submit.call(&mut doc, CallArgs::new()).unwrap();
    doc.save(&store).unwrap();

    println!("\nStep 2: Review");
    println!(
        "  Editor may review: {}",
        review.has_permission(&doc, &Editor).unwrap()
    );
    review.call(&mut doc, CallArgs::new().arg(true)).unwrap();
    doc.save(&store).unwrap();

    println!("\nStep 3: Publish from a stale copy");
    let mut stale = ConcurrentRecord::<Document>::load(&store, id).unwrap();
    publish.call(&mut doc, CallArgs::new()).unwrap();
    doc.save(&store).unwrap();
    stale.title.push_str(" (draft 2)");
    match stale.save(&store) {
        Ok(()) => println!("  Stale copy saved"),
        Err(err) => println!("  ✗ {err}"),
    }

    println!("\nStep 4: A failing publication falls back");
    let mut untitled = ConcurrentRecord::new(
        Uuid::new_v4(),
        Document {
            title: String::new(),
            state: DocState::Approved.into(),
            word_count: 120,
        },
    )
    .unwrap();
    if let Err(err) = publish.call(&mut untitled, CallArgs::new()) {
        println!("  ✗ {err}");
    }
    println!(
        "  State is now {:?}",
        DocState::try_from(field.state(&untitled)).unwrap()
    );

    println!("\nKey Takeaways:");
    println!("- Rules are declared per method and frozen when the field is built");
    println!("- Blocked calls never run the body or notify listeners");
    println!("- Error fallbacks are written before the error reaches the caller");
    println!("- Saves compare the stored state with the one that was loaded");
}
