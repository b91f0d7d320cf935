//! End-to-end behaviour of transition calls: blocking, fallbacks, signal
//! ordering, dynamic targets and side-effect-free inspection.

use statecraft::builder::TransitionBuilder;
use statecraft::core::{CallArgs, Principal, StateValue};
use statecraft::effects::{
    can_proceed, has_transition_perm, BoxError, Computed, ReturnValue, SignalKind, StateField,
    Target, TransitionError, TransitionEvent, TransitionMethod,
};
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("bad value: {0}")]
struct ValueError(String);

#[derive(Debug)]
struct Job {
    state: StateValue,
    owner: Option<String>,
    runs: u32,
    behaviour: Option<String>,
}

impl Job {
    fn new(state: &str) -> Self {
        Self {
            state: state.into(),
            owner: None,
            runs: 0,
            behaviour: None,
        }
    }
}

fn get(job: &Job) -> StateValue {
    job.state.clone()
}

fn set(job: &mut Job, state: StateValue) {
    job.state = state;
}

#[derive(Debug, Clone, PartialEq)]
struct Seen {
    kind: SignalKind,
    method: String,
    source: StateValue,
    target: Option<StateValue>,
    exception: Option<String>,
}

type Log = Arc<Mutex<Vec<String>>>;
type Events = Arc<Mutex<Vec<Seen>>>;

fn record_events(
    events: &Events,
) -> impl Fn(&TransitionEvent<'_, Job>) -> Result<(), BoxError> + Send + Sync + 'static {
    let events = Arc::clone(events);
    move |event: &TransitionEvent<'_, Job>| {
        events.lock().unwrap().push(Seen {
            kind: event.kind,
            method: event.method_name.to_string(),
            source: event.source.clone(),
            target: event.target.state().cloned(),
            exception: event.exception.map(|err| err.to_string()),
        });
        Ok(())
    }
}

fn field_with_events<'a>(events: &Events) -> statecraft::StateFieldBuilder<'a, Job> {
    StateField::builder("state", get, set)
        .model_name("Job")
        .on_pre_transition(record_events(events))
        .on_post_transition(record_events(events))
}

fn noop(name: &str) -> TransitionMethod<Job, (), Infallible> {
    TransitionMethod::new(name, |job: &mut Job, _: &CallArgs| {
        job.runs += 1;
        Ok(())
    })
}

fn failing(name: &str) -> TransitionMethod<Job, (), ValueError> {
    TransitionMethod::new(name, |job: &mut Job, _: &CallArgs| {
        job.runs += 1;
        Err(ValueError("boom".into()))
    })
}

#[test]
fn call_from_unmatched_state_is_blocked_silently() {
    let events = Events::default();
    let publish = noop("publish")
        .rule(TransitionBuilder::new().source("draft").target("published"))
        .unwrap();
    let _field = field_with_events(&events).method(&publish).build().unwrap();
    let mut job = Job::new("archived");

    let err = publish.call(&mut job, CallArgs::new()).unwrap_err();

    match err {
        TransitionError::NotAllowed(not_allowed) => {
            assert_eq!(not_allowed.model, "Job");
            assert_eq!(not_allowed.method, "publish");
            assert_eq!(not_allowed.state, StateValue::from("archived"));
            assert_eq!(not_allowed.condition, None);
        }
        other => panic!("expected NotAllowed, got {other:?}"),
    }
    assert_eq!(job.state, StateValue::from("archived"));
    assert_eq!(job.runs, 0);
    assert!(events.lock().unwrap().is_empty());
}

#[test]
fn failing_condition_is_reported_by_name() {
    let events = Events::default();
    let assign = noop("assign")
        .rule(
            TransitionBuilder::new()
                .source("new")
                .target("assigned")
                .condition("not_archived", |job: &Job| job.state != StateValue::from("archived"))
                .condition("has_owner", |job: &Job| job.owner.is_some()),
        )
        .unwrap();
    let _field = field_with_events(&events).method(&assign).build().unwrap();
    let mut job = Job::new("new");

    let err = assign.call(&mut job, CallArgs::new()).unwrap_err();

    match err {
        TransitionError::NotAllowed(not_allowed) => {
            assert_eq!(not_allowed.condition.as_deref(), Some("has_owner"));
        }
        other => panic!("expected NotAllowed, got {other:?}"),
    }
    assert_eq!(job.state, StateValue::from("new"));
    assert_eq!(job.runs, 0);
    assert!(events.lock().unwrap().is_empty());

    job.owner = Some("ann".into());
    assign.call(&mut job, CallArgs::new()).unwrap();
    assert_eq!(job.state, StateValue::from("assigned"));
}

#[test]
fn failing_body_writes_and_announces_fallback() {
    let events = Events::default();
    let process = failing("process")
        .rule(
            TransitionBuilder::new()
                .source("new")
                .target("done")
                .on_error("failed"),
        )
        .unwrap();
    let _field = field_with_events(&events).method(&process).build().unwrap();
    let mut job = Job::new("new");

    let err = process.call(&mut job, CallArgs::new()).unwrap_err();

    assert_eq!(err.into_method_error(), Some(ValueError("boom".into())));
    assert_eq!(job.state, StateValue::from("failed"));
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, SignalKind::PreTransition);
    assert_eq!(events[0].target, Some(StateValue::from("done")));
    assert_eq!(
        events[1],
        Seen {
            kind: SignalKind::PostTransition,
            method: "process".into(),
            source: StateValue::from("new"),
            target: Some(StateValue::from("failed")),
            exception: Some("bad value: boom".into()),
        }
    );
}

#[test]
fn failing_body_without_fallback_keeps_state() {
    let events = Events::default();
    let process = failing("process")
        .rule(TransitionBuilder::new().source("new").target("done"))
        .unwrap();
    let _field = field_with_events(&events).method(&process).build().unwrap();
    let mut job = Job::new("new");

    let err = process.call(&mut job, CallArgs::new()).unwrap_err();

    assert_eq!(err.method_error(), Some(&ValueError("boom".into())));
    assert_eq!(job.state, StateValue::from("new"));
    assert_eq!(job.runs, 1);
    let kinds: Vec<_> = events.lock().unwrap().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![SignalKind::PreTransition]);
}

#[test]
fn on_success_runs_after_post_event() {
    let log = Log::default();
    let body_log = Arc::clone(&log);
    let success_log = Arc::clone(&log);
    let finish = TransitionMethod::new("finish", move |_: &mut Job, _: &CallArgs| {
        body_log.lock().unwrap().push("body".to_string());
        Ok::<_, Infallible>(())
    })
    .rule(
        TransitionBuilder::new()
            .source("running")
            .target("done")
            .on_success(move |job: &mut Job, source, target, _| {
                let target = target.map(ToString::to_string).unwrap_or_default();
                success_log
                    .lock()
                    .unwrap()
                    .push(format!("on_success {source}->{target}"));
                job.owner = Some("archiver".into());
            }),
    )
    .unwrap();
    let pre_log = Arc::clone(&log);
    let post_log = Arc::clone(&log);
    let _field = StateField::builder("state", get, set)
        .on_pre_transition(move |_: &TransitionEvent<'_, Job>| {
            pre_log.lock().unwrap().push("pre".to_string());
            Ok(())
        })
        .on_post_transition(move |event: &TransitionEvent<'_, Job>| {
            post_log
                .lock()
                .unwrap()
                .push(format!("post sees {}", event.instance.state));
            Ok(())
        })
        .method(&finish)
        .build()
        .unwrap();
    let mut job = Job::new("running");

    finish.call(&mut job, CallArgs::new()).unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["pre", "body", "post sees done", "on_success running->done"]
    );
    assert_eq!(job.owner.as_deref(), Some("archiver"));
}

#[test]
fn on_success_skipped_when_blocked_or_failing() {
    let calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&calls);
    let process = failing("process")
        .rule(
            TransitionBuilder::new()
                .source("new")
                .target("done")
                .on_error("failed")
                .on_success(move |_: &mut Job, _, _, _| *counter.lock().unwrap() += 1),
        )
        .unwrap();
    let _field = StateField::builder("state", get, set)
        .method(&process)
        .build()
        .unwrap();
    let mut job = Job::new("new");

    assert!(process.call(&mut job, CallArgs::new()).is_err());
    assert!(process.call(&mut job, CallArgs::new()).is_err());

    assert_eq!(*calls.lock().unwrap(), 0);
}

#[test]
fn return_value_target_follows_body_result() {
    let events = Events::default();
    let choose = TransitionMethod::new("choose", |_: &mut Job, args: &CallArgs| {
        let choice = args
            .get_kwarg("choice")
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        Ok::<_, Infallible>(StateValue::from(choice))
    })
    .rule(
        TransitionBuilder::new()
            .source("start")
            .dynamic(ReturnValue::one_of(["a", "b"])),
    )
    .unwrap();
    let _field = field_with_events(&events).method(&choose).build().unwrap();
    let mut job = Job::new("start");

    let returned = choose
        .call(&mut job, CallArgs::new().kwarg("choice", "a"))
        .unwrap();
    assert_eq!(returned, StateValue::from("a"));
    assert_eq!(job.state, StateValue::from("a"));
    {
        let events = events.lock().unwrap();
        assert_eq!(events[0].target, None);
        assert_eq!(events[1].target, Some(StateValue::from("a")));
    }

    events.lock().unwrap().clear();
    let mut job = Job::new("start");
    let err = choose
        .call(&mut job, CallArgs::new().kwarg("choice", "c"))
        .unwrap_err();

    match err {
        TransitionError::InvalidResult(invalid) => {
            assert_eq!(invalid.state, Some(StateValue::from("c")));
            assert_eq!(invalid.allowed, vec![StateValue::from("a"), StateValue::from("b")]);
        }
        other => panic!("expected InvalidResult, got {other:?}"),
    }
    assert_eq!(job.state, StateValue::from("start"));
    let kinds: Vec<_> = events.lock().unwrap().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![SignalKind::PreTransition]);
}

#[test]
fn invalid_result_takes_error_fallback() {
    let decide = TransitionMethod::new("decide", |_: &mut Job, _: &CallArgs| {
        Ok::<_, Infallible>("maybe")
    })
    .rule(
        TransitionBuilder::new()
            .source("review")
            .dynamic(ReturnValue::one_of(["approved", "rejected"]))
            .on_error("needs_review"),
    )
    .unwrap();
    let _field = StateField::builder("state", get, set)
        .method(&decide)
        .build()
        .unwrap();
    let mut job = Job::new("review");

    let err = decide.call(&mut job, CallArgs::new()).unwrap_err();

    assert!(matches!(err, TransitionError::InvalidResult(_)));
    assert_eq!(job.state, StateValue::from("needs_review"));
}

#[test]
fn computed_target_sees_instance_and_arguments() {
    let route = noop("route")
        .rule(
            TransitionBuilder::new().source("triage").dynamic(
                Computed::new(|job: &Job, args: &CallArgs| {
                    let urgent = args.get(0).and_then(|v| v.as_bool()).unwrap_or(false);
                    match (urgent, job.owner.is_some()) {
                        (true, _) => StateValue::from("escalated"),
                        (false, true) => StateValue::from("assigned"),
                        (false, false) => StateValue::from("queued"),
                    }
                })
                .allowed(["escalated", "assigned", "queued"]),
            ),
        )
        .unwrap();
    let _field = StateField::builder("state", get, set)
        .method(&route)
        .build()
        .unwrap();

    let mut urgent = Job::new("triage");
    route.call(&mut urgent, CallArgs::new().arg(true)).unwrap();
    assert_eq!(urgent.state, StateValue::from("escalated"));

    let mut owned = Job::new("triage");
    owned.owner = Some("bo".into());
    route.call(&mut owned, CallArgs::new()).unwrap();
    assert_eq!(owned.state, StateValue::from("assigned"));
}

#[test]
fn validation_only_rule_still_sends_post_event() {
    let events = Events::default();
    let audit = noop("audit")
        .rule(TransitionBuilder::new().source("*"))
        .unwrap();
    let _field = field_with_events(&events).method(&audit).build().unwrap();
    let mut job = Job::new("running");

    audit.call(&mut job, CallArgs::new()).unwrap();

    assert_eq!(job.state, StateValue::from("running"));
    assert_eq!(job.runs, 1);
    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].kind, SignalKind::PostTransition);
    assert_eq!(events[1].target, None);
}

#[test]
fn wildcard_sources_pick_the_most_specific_rule() {
    let cancel = noop("cancel")
        .rule(TransitionBuilder::new().source("WRK-*").target("cancelled-work"))
        .unwrap()
        .rule(TransitionBuilder::new().source("WRK-REVIEW-*").target("cancelled-review"))
        .unwrap()
        .rule(TransitionBuilder::new().source("+").target("cancelled"))
        .unwrap();
    let _field = StateField::builder("state", get, set)
        .method(&cancel)
        .build()
        .unwrap();

    let mut job = Job::new("WRK-REVIEW-LEGAL");
    cancel.call(&mut job, CallArgs::new()).unwrap();
    assert_eq!(job.state, StateValue::from("cancelled-review"));

    let mut job = Job::new("WRK-DRAFT");
    cancel.call(&mut job, CallArgs::new()).unwrap();
    assert_eq!(job.state, StateValue::from("cancelled-work"));

    let mut job = Job::new("idle");
    cancel.call(&mut job, CallArgs::new()).unwrap();
    assert_eq!(job.state, StateValue::from("cancelled"));

    assert!(cancel.call(&mut job, CallArgs::new()).unwrap_err().is_not_allowed());
}

#[test]
fn inspection_never_changes_anything() {
    let events = Events::default();
    let start = noop("start")
        .rule(
            TransitionBuilder::new()
                .source("new")
                .target("running")
                .condition("has_owner", |job: &Job| job.owner.is_some()),
        )
        .unwrap();
    let _field = field_with_events(&events).method(&start).build().unwrap();
    let mut job = Job::new("new");

    for _ in 0..5 {
        assert_eq!(can_proceed(&start, &job, false), Ok(true));
        assert_eq!(can_proceed(&start, &job, true), Ok(false));
    }
    assert!(events.lock().unwrap().is_empty());
    assert_eq!(job.runs, 0);
    assert!(start.call(&mut job, CallArgs::new()).unwrap_err().is_not_allowed());

    job.owner = Some("cy".into());
    assert_eq!(can_proceed(&start, &job, true), Ok(true));
    assert!(start.call(&mut job, CallArgs::new()).is_ok());
}

struct Staff {
    global: Vec<&'static str>,
    per_job: Vec<&'static str>,
}

impl Principal<Job> for Staff {
    fn has_perm(&self, permission: &str, object: Option<&Job>) -> bool {
        match object {
            Some(_) => self.per_job.iter().any(|p| *p == permission),
            None => self.global.iter().any(|p| *p == permission),
        }
    }
}

#[test]
fn permissions_accept_object_or_global_grants() {
    let approve = noop("approve")
        .rule(
            TransitionBuilder::new()
                .source("review")
                .target("approved")
                .permission("jobs.approve"),
        )
        .unwrap();
    let reopen = noop("reopen")
        .rule(
            TransitionBuilder::new()
                .source("review")
                .target("new")
                .permission(statecraft::Permission::check(|job: &Job, _: &dyn Principal<Job>| {
                    job.owner.is_none()
                })),
        )
        .unwrap();
    let field = StateField::builder("state", get, set)
        .method(&approve)
        .method(&reopen)
        .build()
        .unwrap();
    let job = Job::new("review");

    let global = Staff {
        global: vec!["jobs.approve"],
        per_job: vec![],
    };
    let object = Staff {
        global: vec![],
        per_job: vec!["jobs.approve"],
    };
    let nobody = Staff {
        global: vec![],
        per_job: vec![],
    };

    assert_eq!(has_transition_perm(&approve, &job, &global), Ok(true));
    assert_eq!(has_transition_perm(&approve, &job, &object), Ok(true));
    assert_eq!(has_transition_perm(&approve, &job, &nobody), Ok(false));
    assert_eq!(has_transition_perm(&reopen, &job, &nobody), Ok(true));

    let names: Vec<_> = field
        .available_transitions_for(&job, &nobody)
        .map(|record| record.name())
        .collect();
    assert_eq!(names, vec!["reopen"]);
}

#[test]
fn failing_pre_listener_stops_the_call() {
    let start = noop("start")
        .rule(TransitionBuilder::new().source("new").target("running"))
        .unwrap();
    let _field = StateField::builder("state", get, set)
        .on_pre_transition(|_: &TransitionEvent<'_, Job>| Err("audit log offline".into()))
        .method(&start)
        .build()
        .unwrap();
    let mut job = Job::new("new");

    let err = start.call(&mut job, CallArgs::new()).unwrap_err();

    assert!(matches!(err, TransitionError::Listener(_)));
    assert_eq!(job.runs, 0);
    assert_eq!(job.state, StateValue::from("new"));
}

#[test]
fn failing_post_listener_keeps_state_and_skips_on_success() {
    let called = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&called);
    let start = noop("start")
        .rule(
            TransitionBuilder::new()
                .source("new")
                .target("running")
                .on_success(move |_: &mut Job, _, _, _| *flag.lock().unwrap() = true),
        )
        .unwrap();
    let _field = StateField::builder("state", get, set)
        .on_post_transition(|_: &TransitionEvent<'_, Job>| Err("notifier down".into()))
        .method(&start)
        .build()
        .unwrap();
    let mut job = Job::new("new");

    let err = start.call(&mut job, CallArgs::new()).unwrap_err();

    assert_eq!(err.to_string(), "transition listener failed: notifier down");
    assert_eq!(job.state, StateValue::from("running"));
    assert!(!*called.lock().unwrap());
}

#[test]
fn transitions_write_protected_fields_and_switch_variants() {
    fn hook(job: &mut Job, variant: Option<&str>) {
        job.behaviour = variant.map(str::to_string);
    }

    let archive = noop("archive")
        .rule(TransitionBuilder::new().source("done").target("archived"))
        .unwrap();
    let field = StateField::builder("state", get, set)
        .protected()
        .variant("archived", "ArchivedJob")
        .variant_hook(hook)
        .method(&archive)
        .build()
        .unwrap();
    let mut job = Job::new("done");

    assert!(field.set_state(&mut job, "archived".into()).is_err());
    archive.call(&mut job, CallArgs::new()).unwrap();

    assert_eq!(job.state, StateValue::from("archived"));
    assert_eq!(job.behaviour.as_deref(), Some("ArchivedJob"));
    assert_eq!(field.variant_of(&job), Some("ArchivedJob"));
}

#[test]
fn error_fallback_switches_variant_before_writing() {
    fn hook(job: &mut Job, variant: Option<&str>) {
        job.behaviour = variant.map(|name| format!("{name}@{}", job.state));
    }

    let events = Events::default();
    let run = failing("run")
        .rule(
            TransitionBuilder::new()
                .source("new")
                .target("done")
                .on_error("failed"),
        )
        .unwrap();
    let field = field_with_events(&events)
        .variant("done", "DoneJob")
        .variant("failed", "FailedJob")
        .variant_hook(hook)
        .method(&run)
        .build()
        .unwrap();
    let mut job = Job::new("new");

    let err = run.call(&mut job, CallArgs::new()).unwrap_err();

    assert_eq!(err.method_error(), Some(&ValueError("boom".into())));
    assert_eq!(job.state, StateValue::from("failed"));
    assert_eq!(job.behaviour.as_deref(), Some("FailedJob@new"));
    assert_eq!(field.variant_of(&job), Some("FailedJob"));
    let post = events.lock().unwrap().last().cloned().unwrap();
    assert_eq!(post.target, Some(StateValue::from("failed")));
}

#[test]
fn post_event_target_is_unchanged_marker_for_validation_rules() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let ping = noop("ping")
        .rule(TransitionBuilder::new().source("*"))
        .unwrap();
    let _field = StateField::builder("state", get, set)
        .on_post_transition(move |event: &TransitionEvent<'_, Job>| {
            sink.lock()
                .unwrap()
                .push(matches!(event.target, Target::Unchanged));
            Ok(())
        })
        .method(&ping)
        .build()
        .unwrap();
    let mut job = Job::new("idle");

    ping.call(&mut job, CallArgs::new()).unwrap();

    assert_eq!(*seen.lock().unwrap(), vec![true]);
}
