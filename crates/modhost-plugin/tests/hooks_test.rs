//! Integration tests for custom hooks, hook actions and detaching.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde_json::json;

use modhost_plugin::prelude::*;

use helpers::TestEngine;

#[test]
fn test_hook_action_loads_component_with_event_kwargs() {
    let engine = TestEngine::new();
    engine.manager.install_custom_hook("h", Owner::Manager).expect("install h");
    engine
        .manager
        .attach_custom_hook("h", attachment!(Owner::Manager, |_| Ok(true)).load_on_true("gamma"))
        .expect("attach");

    let result = engine
        .manager
        .fire_custom_hook("h", kwargs! { "x" => 1 })
        .expect("fire");

    assert_eq!(result.loaded, vec!["gamma"]);
    assert!(result.is_clean());
    assert!(engine.manager.is_loaded("gamma"));
    assert_eq!(
        engine.construction_kwargs("gamma"),
        Some(kwargs! { "x" => 1, "loaded_by" => "manager" })
    );
}

#[test]
fn test_hook_action_only_runs_when_callback_returns_true() {
    let engine = TestEngine::new();
    engine.manager.install_custom_hook("h", Owner::Manager).expect("install h");
    engine
        .manager
        .attach_custom_hook(
            "h",
            attachment!(Owner::Manager, |event| Ok(event.get("go") == Some(&json!(true))))
                .load_on_true("gamma"),
        )
        .expect("attach");

    engine.manager.fire_custom_hook("h", kwargs! { "go" => false }).expect("fire");
    assert!(!engine.manager.is_loaded("gamma"));

    engine.manager.fire_custom_hook("h", kwargs! { "go" => true }).expect("fire");
    engine.manager.fire_custom_hook("h", kwargs! { "go" => true }).expect("fire");
    assert_eq!(engine.manager.instances_of_type("gamma"), vec!["gamma", "gamma-1"]);
}

#[test]
fn test_hook_action_unloads_instance() {
    let engine = TestEngine::new();
    engine.manager.load("alpha", kwargs!()).expect("load");
    engine.manager.install_custom_hook("stop", Owner::Manager).expect("install");
    engine
        .manager
        .attach_custom_hook("stop", attachment!(Owner::Manager, |_| Ok(true)).unload_on_true("alpha"))
        .expect("attach");

    let result = engine.manager.fire_custom_hook("stop", kwargs!()).expect("fire");

    assert_eq!(result.unloaded, vec!["alpha"]);
    assert!(!engine.manager.is_loaded("alpha"));
    // The attachment referenced alpha, so it went with it.
    assert_eq!(engine.manager.hooks().attachment_count(HookKind::Custom, "stop"), 0);
}

#[test]
fn test_failed_action_is_reported_and_firing_continues() {
    let engine = TestEngine::new();
    engine.manager.install_custom_hook("h", Owner::Manager).expect("install");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    engine
        .manager
        .attach_custom_hook("h", attachment!(Owner::Manager, |_| Ok(true)).load_on_true("missing"))
        .expect("attach failing");
    engine
        .manager
        .attach_custom_hook("h", attachment!(Owner::Manager, |_| Err(CallbackError::new("broken"))))
        .expect("attach erroring");
    engine
        .manager
        .attach_custom_hook(
            "h",
            attachment!(Owner::Manager, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            }),
        )
        .expect("attach counting");

    let result = engine.manager.fire_custom_hook("h", kwargs!()).expect("fire");

    assert_eq!(result.fired, 3);
    assert_eq!(result.failures.len(), 2);
    assert_eq!(
        result.failures[0].error,
        EngineError::UnknownComponent("missing".into())
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_detach_is_idempotent() {
    let engine = TestEngine::new();
    engine.manager.install_custom_hook("h", Owner::Manager).expect("install");
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let id = engine
        .manager
        .attach_custom_hook(
            "h",
            attachment!(Owner::Manager, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            }),
        )
        .expect("attach");

    engine.manager.fire_custom_hook("h", kwargs!()).expect("fire");
    assert!(engine.manager.detach_hook(id));
    assert!(!engine.manager.detach_hook(id));
    engine.manager.fire_custom_hook("h", kwargs!()).expect("fire");

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_callback_detached_mid_fire_is_skipped() {
    let engine = TestEngine::new();
    engine.manager.install_custom_hook("h", Owner::Manager).expect("install");
    let victim: Arc<Mutex<Option<AttachmentId>>> = Arc::default();
    let calls = Arc::new(AtomicUsize::new(0));

    let manager = engine.manager.clone();
    let target = victim.clone();
    engine
        .manager
        .attach_custom_hook(
            "h",
            attachment!(Owner::Manager, move |_| {
                if let Some(id) = *target.lock() {
                    manager.detach_hook(id);
                }
                Ok(false)
            }),
        )
        .expect("attach detacher");

    let counter = calls.clone();
    let id = engine
        .manager
        .attach_custom_hook(
            "h",
            attachment!(Owner::Manager, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            }),
        )
        .expect("attach victim");
    *victim.lock() = Some(id);

    let result = engine.manager.fire_custom_hook("h", kwargs!()).expect("fire");

    assert_eq!(result.fired, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_hook_names_are_unique_across_tables() {
    let engine = TestEngine::new();
    engine.manager.install_custom_hook("h", Owner::Manager).expect("install");
    assert_eq!(
        engine.manager.install_custom_hook("h", Owner::instance("alpha")),
        Err(EngineError::HookAlreadyInstalled("h".into()))
    );
    assert_eq!(
        engine.manager.install_custom_hook("manager.tick", Owner::Manager),
        Err(EngineError::HookAlreadyInstalled("manager.tick".into()))
    );
    assert_eq!(
        engine.manager.fire_custom_hook("nope", kwargs!()).unwrap_err(),
        EngineError::HookNotAvailable("nope".into())
    );
    assert!(
        engine
            .manager
            .attach_custom_hook("nope", attachment!(Owner::Manager, |_| Ok(false)))
            .is_err()
    );
}

#[test]
fn test_find_attachments_by_argument() {
    let engine = TestEngine::new();
    engine.manager.install_custom_hook("h", Owner::Manager).expect("install");
    let wanted = engine
        .manager
        .attach_custom_hook("h", attachment!(Owner::Manager, |_| Ok(false)).load_on_true("gamma"))
        .expect("attach");
    engine
        .manager
        .attach_custom_hook("h", attachment!(Owner::Manager, |_| Ok(false)).load_on_true("alpha"))
        .expect("attach");

    let found = engine
        .manager
        .find_hook_attachments(HookKind::Custom, "h", &HookArgument::ComponentType("gamma".into()))
        .expect("hook exists");

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, wanted);
}

#[test]
fn test_mediated_attach_records_caller() {
    let engine = TestEngine::new();
    engine.manager.load("alpha", kwargs!()).expect("load");
    let id = engine
        .mediator_of("alpha")
        .attach_system_hook("manager.tick", hook_callback(|_| Ok(false)), HookAction::None, HookArgument::None)
        .expect("attach");

    let attachments = engine.manager.hooks().snapshot(HookKind::System, "manager.tick").expect("hook");
    let attachment = attachments.iter().find(|a| a.id == id).expect("attached");
    assert_eq!(attachment.attached_by, Owner::instance("alpha"));

    assert!(
        engine
            .mediator_of("alpha")
            .attach_custom_hook("absent", hook_callback(|_| Ok(false)), HookAction::None, HookArgument::None)
            .is_none()
    );
    assert_eq!(engine.notices_for("alpha")[0].reason, NoticeReason::AttachHookFailed);
}
