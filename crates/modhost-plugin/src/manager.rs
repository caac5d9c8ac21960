//! Module manager: discovery, load, unload and the mediated entry point.
//!
//! All operations run synchronously on the caller's thread. A component's
//! factory may reenter the manager through its mediator, so no registry
//! lock is held while component code runs.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use indexmap::IndexSet;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use modhost_core::config::EngineConfig;
use modhost_core::events::{LOADED_BY_KEY, SystemHook};
use modhost_core::types::{AttachmentId, Kwargs};

use crate::activation::{Activation, ActivationConsumer, ActivationOutcome};
use crate::deferral::{DeferralTable, Dependency};
use crate::descriptor::ComponentRegistration;
use crate::discovery::{ComponentCandidate, DiscoveryContext, DiscoveryReport, DiscoverySource, Resolution};
use crate::error::EngineError;
use crate::hooks::definitions::{HookArgument, HookAttachment, HookEvent, HookKind};
use crate::hooks::dispatcher::{DispatchResult, HookActionExecutor, HookDispatcher};
use crate::hooks::registry::HookTable;
use crate::instance::LoadedInstance;
use crate::mediator::{LogLevel, ManagerNotice, Mediator, MediatorReply, MediatorRequest, NoticeReason};
use crate::owner::Owner;
use crate::registries::{InterruptCallback, InterruptTable, MethodCallback, MethodTable};
use crate::registry::ComponentRegistry;

/// Engine state shared by the manager handle and every mediator.
pub(crate) struct EngineState {
    config: EngineConfig,
    registry: ComponentRegistry,
    hooks: Arc<HookTable>,
    dispatcher: HookDispatcher,
    methods: MethodTable,
    interrupts: InterruptTable,
    discoveries: DeferralTable<Arc<dyn ComponentCandidate>>,
    activations: DeferralTable<Arc<dyn ActivationConsumer>>,
    /// Notices for instances whose factory is still running.
    pending_notices: Mutex<HashMap<String, Vec<ManagerNotice>>>,
    /// Instances whose unload is in progress.
    unloading: Mutex<HashSet<String>>,
    ticks: AtomicU64,
    replay_depth: AtomicUsize,
}

/// Bounds nested replays of deferred entries and discovery retries.
struct ReplayGuard<'a> {
    depth: &'a AtomicUsize,
}

impl<'a> ReplayGuard<'a> {
    fn enter(state: &'a EngineState) -> Result<Self, EngineError> {
        let limit = state.config.max_replay_depth;
        let depth = state.replay_depth.fetch_add(1, Ordering::SeqCst) + 1;
        if depth > limit {
            state.replay_depth.fetch_sub(1, Ordering::SeqCst);
            return Err(EngineError::ReplayLimitExceeded { depth: limit });
        }
        Ok(Self {
            depth: &state.replay_depth,
        })
    }
}

impl Drop for ReplayGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Handle on one engine instance. Cheap to clone.
#[derive(Clone)]
pub struct ModuleManager {
    state: Arc<EngineState>,
}

impl ModuleManager {
    /// Creates an engine and installs the system hooks.
    pub fn new(config: EngineConfig) -> Self {
        let hooks = Arc::new(HookTable::new());
        for hook in SystemHook::ALL {
            hooks.install_system_hook(hook.as_str());
        }

        info!(
            max_replay_depth = config.max_replay_depth,
            "Module manager initialized"
        );

        Self {
            state: Arc::new(EngineState {
                config,
                registry: ComponentRegistry::new(),
                dispatcher: HookDispatcher::new(hooks.clone()),
                hooks,
                methods: MethodTable::new(),
                interrupts: InterruptTable::new(),
                discoveries: DeferralTable::new(),
                activations: DeferralTable::new(),
                pending_notices: Mutex::new(HashMap::new()),
                unloading: Mutex::new(HashSet::new()),
                ticks: AtomicU64::new(0),
                replay_depth: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn from_state(state: Arc<EngineState>) -> Self {
        Self { state }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.state.config
    }

    /// The component registry.
    pub fn registry(&self) -> &ComponentRegistry {
        &self.state.registry
    }

    /// The hook table.
    pub fn hooks(&self) -> &HookTable {
        &self.state.hooks
    }

    /// The custom method table.
    pub fn methods(&self) -> &MethodTable {
        &self.state.methods
    }

    /// The interrupt table.
    pub fn interrupts(&self) -> &InterruptTable {
        &self.state.interrupts
    }

    // ── Discovery ──

    /// Registers one component type without a discovery source, then
    /// retries candidates that were waiting for it.
    pub fn insert_component(&self, registration: ComponentRegistration) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        self.resolve_candidate(Arc::new(registration), &mut report);
        report.deferred = self.pending_discoveries();
        report
    }

    /// Resolves every candidate of `source` in order.
    ///
    /// A candidate that defers is retried as soon as the type it waits for
    /// is registered, so a dependency chain resolves within one pass. A
    /// candidate that fails is logged and skipped.
    pub fn discover(&self, source: &dyn DiscoverySource) -> DiscoveryReport {
        let mut report = DiscoveryReport::default();
        for candidate in source.candidates() {
            self.resolve_candidate(candidate, &mut report);
        }
        report.deferred = self.pending_discoveries();

        for (candidate, dependency) in &report.deferred {
            warn!(candidate = %candidate, requires = %dependency, "Candidate unresolved after discovery");
        }
        info!(
            discovered = report.discovered.len(),
            deferred = report.deferred.len(),
            failed = report.failed.len(),
            "Discovery finished"
        );
        report
    }

    fn resolve_candidate(&self, candidate: Arc<dyn ComponentCandidate>, report: &mut DiscoveryReport) {
        let name = candidate.name().to_string();
        let resolution = candidate.resolve(&DiscoveryContext::new(self, &name));
        match resolution {
            Ok(Resolution::Ready(registration)) => {
                let component_type = registration.component_type().to_string();
                self.state.registry.register(registration);
                report.failed.remove(&name);
                report.discovered.push(component_type.clone());
                self.retry_discoveries(&component_type, report);
            }
            Ok(Resolution::Defer(dependency)) => {
                debug!(candidate = %name, requires = %dependency, "Candidate deferred");
                self.state.discoveries.defer(dependency, candidate);
            }
            Err(e) => {
                warn!(candidate = %name, error = %e, "Skipping candidate that failed to resolve");
                report.failed.insert(name, e.to_string());
            }
        }
    }

    fn retry_discoveries(&self, component_type: &str, report: &mut DiscoveryReport) {
        let ready = self
            .state
            .discoveries
            .take_satisfied(component_type, component_type);
        if ready.is_empty() {
            return;
        }

        let _guard = match ReplayGuard::enter(&self.state) {
            Ok(guard) => guard,
            Err(e) => {
                error!(
                    requires = %component_type,
                    pending = ready.len(),
                    error = %e,
                    "Discovery retry limit reached, leaving candidates pending"
                );
                for entry in ready {
                    self.state.discoveries.defer(entry.dependency, entry.token);
                }
                return;
            }
        };

        for entry in ready {
            debug!(
                candidate = %entry.token.name(),
                requires = %component_type,
                "Retrying deferred candidate"
            );
            self.resolve_candidate(entry.token, report);
        }
    }

    /// Candidates still waiting for a type.
    pub fn pending_discoveries(&self) -> BTreeMap<String, Dependency> {
        self.state
            .discoveries
            .pending()
            .into_iter()
            .map(|entry| (entry.token.name().to_string(), entry.dependency))
            .collect()
    }

    /// `Some(dependency)` when `component_type` is not discovered yet.
    pub fn require_discovered(&self, component_type: &str) -> Option<Dependency> {
        (!self.state.registry.is_discovered(component_type)).then(|| Dependency::any(component_type))
    }

    pub fn is_discovered(&self, component_type: &str) -> bool {
        self.state.registry.is_discovered(component_type)
    }

    pub fn is_loaded(&self, instance_name: &str) -> bool {
        self.state.registry.is_loaded(instance_name)
    }

    // ── Load / unload ──

    /// Loads a component as the manager.
    pub fn load(&self, component_type: &str, kwargs: Kwargs) -> Result<String, EngineError> {
        self.load_as(component_type, &Owner::Manager, kwargs)
    }

    /// Loads a component owned by `requested_by` and returns the instance
    /// name.
    pub fn load_as(
        &self,
        component_type: &str,
        requested_by: &Owner,
        mut kwargs: Kwargs,
    ) -> Result<String, EngineError> {
        let instance_name = self
            .state
            .registry
            .resolve_instance_name(component_type, &kwargs)
            .inspect_err(|e| {
                warn!(component = %component_type, requested_by = %requested_by, error = %e, "Module load refused");
            })?;

        kwargs.insert(
            LOADED_BY_KEY.to_string(),
            Value::String(requested_by.to_string()),
        );
        let mediator = Mediator::new(&self.state, &instance_name);

        let instance = match self.state.registry.create(
            component_type,
            &instance_name,
            kwargs,
            requested_by.clone(),
            mediator,
        ) {
            Ok(instance) => instance,
            Err(e) => {
                if matches!(e, EngineError::ComponentFailed { .. }) {
                    self.discard_construction(&instance_name);
                }
                self.state.pending_notices.lock().remove(&instance_name);
                warn!(
                    component = %component_type,
                    instance = %instance_name,
                    error = %e,
                    "Module load failed"
                );
                return Err(e);
            }
        };

        info!(
            instance = %instance_name,
            component = %component_type,
            owner = %requested_by,
            "Module loaded"
        );

        self.deliver_pending_notices(&instance);

        let mut event = Kwargs::new();
        event.insert("instance_name".into(), instance_name.clone().into());
        self.fire_system(SystemHook::ModuleLoaded, event);

        self.replay_activations(component_type, &instance_name);
        Ok(instance_name)
    }

    /// Unloads an instance as the manager.
    pub fn unload(&self, instance_name: &str) -> Result<(), EngineError> {
        self.unload_as(instance_name, &Owner::Manager)
    }

    /// Unloads an instance. Only its owner or the manager may do so.
    ///
    /// Order: the instance's unload hook, then subscribers of hooks it owns
    /// are notified, then its hooks, methods and interrupts are removed,
    /// then attachments referencing it are detached, then the record is
    /// removed. Instances it loaded stay loaded.
    pub fn unload_as(&self, instance_name: &str, requested_by: &Owner) -> Result<(), EngineError> {
        let instance = self
            .state
            .registry
            .get(instance_name)
            .ok_or_else(|| EngineError::NotLoaded(instance_name.to_string()))?;

        if !requested_by.is_manager() && requested_by != instance.owner() {
            warn!(
                instance = %instance_name,
                owner = %instance.owner(),
                requested_by = %requested_by,
                "Unload refused"
            );
            return Err(EngineError::Forbidden {
                instance: instance_name.to_string(),
                requester: requested_by.to_string(),
            });
        }

        if !self.state.unloading.lock().insert(instance_name.to_string()) {
            return Err(EngineError::NotLoaded(instance_name.to_string()));
        }

        instance.component().on_unload();
        self.cascade_cleanup(instance_name);
        self.state.registry.remove(instance_name);
        self.state.pending_notices.lock().remove(instance_name);
        self.state.unloading.lock().remove(instance_name);

        info!(instance = %instance_name, requested_by = %requested_by, "Module unloaded");

        let mut event = Kwargs::new();
        event.insert("instance_name".into(), instance_name.into());
        event.insert("requested_by".into(), requested_by.to_string().into());
        self.fire_system(SystemHook::ModuleUnloaded, event);
        Ok(())
    }

    fn cascade_cleanup(&self, instance_name: &str) {
        let hooks = &self.state.hooks;

        for hook in hooks.custom_hooks_owned_by(instance_name) {
            let subscribers: IndexSet<String> = hooks
                .snapshot(HookKind::Custom, &hook)
                .unwrap_or_default()
                .iter()
                .flat_map(|a| {
                    let by = match &a.attached_by {
                        Owner::Instance(name) => Some(name.clone()),
                        Owner::Manager => None,
                    };
                    by.into_iter().chain(a.argument.instance().map(str::to_string))
                })
                .filter(|name| name != instance_name)
                .collect();

            let notice = ManagerNotice::provider_unloaded(hook.clone());
            for subscriber in &subscribers {
                if let Some(target) = self.state.registry.get(subscriber) {
                    debug!(hook = %hook, subscriber = %subscriber, "Notifying subscriber of provider unload");
                    target.component().communicate(&notice);
                }
            }
            hooks.remove_custom_hook(&hook);
        }

        self.state.methods.remove_owned_by(instance_name);
        self.state.interrupts.remove_owned_by(instance_name);
        hooks.detach_referencing(instance_name);
    }

    /// Removes what a failed factory installed under its reserved name.
    /// Attachments owned by others stay, even when they target that name.
    fn discard_construction(&self, instance_name: &str) {
        let hooks = &self.state.hooks;
        for hook in hooks.custom_hooks_owned_by(instance_name) {
            hooks.remove_custom_hook(&hook);
        }
        self.state.methods.remove_owned_by(instance_name);
        self.state.interrupts.remove_owned_by(instance_name);
        hooks.detach_attached_by(instance_name);
    }

    /// Unloads every instance as the manager, most recently loaded first.
    /// Returns how many were unloaded.
    pub fn unload_all(&self) -> usize {
        let loaded = self.state.registry.list_loaded();
        let mut unloaded = 0;
        for name in loaded.keys().rev() {
            if !self.state.registry.is_loaded(name) {
                continue;
            }
            match self.unload(name) {
                Ok(()) => unloaded += 1,
                Err(e) => error!(instance = %name, error = %e, "Error unloading module"),
            }
        }
        info!(unloaded, "All modules unloaded");
        unloaded
    }

    // ── Hooks ──

    pub fn install_custom_hook(&self, name: &str, owner: Owner) -> Result<(), EngineError> {
        self.state.hooks.install_custom_hook(name, owner)
    }

    pub fn attach_custom_hook(&self, hook: &str, attachment: HookAttachment) -> Result<AttachmentId, EngineError> {
        self.state.hooks.attach(HookKind::Custom, hook, attachment)
    }

    pub fn attach_system_hook(&self, hook: &str, attachment: HookAttachment) -> Result<AttachmentId, EngineError> {
        self.state.hooks.attach(HookKind::System, hook, attachment)
    }

    /// Detaches a callback. Detaching twice is a no-op.
    pub fn detach_hook(&self, id: AttachmentId) -> bool {
        self.state.hooks.detach(id)
    }

    pub fn find_hook_attachments(
        &self,
        kind: HookKind,
        hook: &str,
        argument: &HookArgument,
    ) -> Result<Vec<HookAttachment>, EngineError> {
        self.state.hooks.find_by_argument(kind, hook, argument)
    }

    /// Fires a custom hook with the given event kwargs.
    pub fn fire_custom_hook(&self, hook: &str, kwargs: Kwargs) -> Result<DispatchResult, EngineError> {
        self.state
            .dispatcher
            .fire(HookKind::Custom, &HookEvent::new(hook, kwargs), self)
    }

    /// Advances the heartbeat and fires `manager.tick` with `uptime`.
    pub fn tick(&self) -> DispatchResult {
        let uptime = self.state.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let mut event = Kwargs::new();
        event.insert("uptime".into(), uptime.into());
        self.fire_system(SystemHook::Tick, event)
    }

    /// Number of ticks so far.
    pub fn uptime(&self) -> u64 {
        self.state.ticks.load(Ordering::SeqCst)
    }

    fn fire_system(&self, hook: SystemHook, kwargs: Kwargs) -> DispatchResult {
        match self
            .state
            .dispatcher
            .fire(HookKind::System, &HookEvent::new(hook.as_str(), kwargs), self)
        {
            Ok(result) => result,
            Err(e) => {
                error!(hook = %hook, error = %e, "System hook could not fire");
                DispatchResult::default()
            }
        }
    }

    // ── Methods and interrupts ──

    pub fn install_custom_method(&self, name: &str, callback: MethodCallback, owner: Owner) -> Result<(), EngineError> {
        self.state.methods.install(name, callback, owner)
    }

    pub fn call_custom_method(&self, name: &str, args: &[Value], kwargs: &Kwargs) -> Result<Value, EngineError> {
        self.state.methods.call(name, args, kwargs)
    }

    pub fn install_interrupt(&self, name: &str, callback: InterruptCallback, owner: Owner) -> Result<(), EngineError> {
        self.state.interrupts.install(name, callback, owner)
    }

    /// Runs an interrupt handler. Handler failures are logged only.
    pub fn raise_interrupt(&self, name: &str, kwargs: &Kwargs) -> Result<(), EngineError> {
        self.state.interrupts.raise(name, kwargs)
    }

    // ── Activation ──

    /// Activates a consumer now, or stores it until its dependency loads.
    pub fn submit_activation(&self, consumer: Arc<dyn ActivationConsumer>) -> ActivationOutcome {
        self.run_activation(consumer)
    }

    fn run_activation(&self, consumer: Arc<dyn ActivationConsumer>) -> ActivationOutcome {
        let name = consumer.name().to_string();
        match consumer.activate(self) {
            Ok(Activation::Ready) => {
                info!(consumer = %name, "Consumer activated");
                ActivationOutcome::Activated
            }
            Ok(Activation::Defer(dependency)) => {
                debug!(consumer = %name, requires = %dependency, "Consumer deferred");
                self.state.activations.defer(dependency.clone(), consumer);
                ActivationOutcome::Deferred(dependency)
            }
            Ok(Activation::Cancel(reason)) => {
                info!(consumer = %name, reason = %reason, "Consumer cancelled activation");
                ActivationOutcome::Cancelled(reason)
            }
            Err(e) => {
                warn!(consumer = %name, error = %e, "Consumer activation failed");
                ActivationOutcome::Failed(e.to_string())
            }
        }
    }

    fn replay_activations(&self, component_type: &str, instance_name: &str) {
        let ready = self
            .state
            .activations
            .take_satisfied(component_type, instance_name);
        if ready.is_empty() {
            return;
        }

        let _guard = match ReplayGuard::enter(&self.state) {
            Ok(guard) => guard,
            Err(e) => {
                error!(
                    instance = %instance_name,
                    pending = ready.len(),
                    error = %e,
                    "Deferred replay limit reached, leaving entries pending"
                );
                for entry in ready {
                    self.state.activations.defer(entry.dependency, entry.token);
                }
                return;
            }
        };

        for entry in ready {
            debug!(
                consumer = %entry.token.name(),
                instance = %instance_name,
                "Replaying deferred activation"
            );
            self.run_activation(entry.token);
        }
    }

    /// Drops the pending activation of `consumer`. Returns false when
    /// nothing by that name is waiting.
    pub fn cancel_activation(&self, consumer: &str) -> bool {
        let Some(entry) = self
            .state
            .activations
            .pending()
            .into_iter()
            .find(|entry| entry.token.name() == consumer)
        else {
            return false;
        };
        let cancelled = self.state.activations.cancel(entry.id);
        if cancelled {
            info!(consumer = %consumer, requires = %entry.dependency, "Pending activation cancelled");
        }
        cancelled
    }

    /// Consumers still waiting, with what they wait for.
    pub fn pending_activations(&self) -> Vec<(String, Dependency)> {
        self.state
            .activations
            .pending()
            .into_iter()
            .map(|entry| (entry.token.name().to_string(), entry.dependency))
            .collect()
    }

    /// Checks an instance requirement for an activation consumer.
    ///
    /// Returns `Ok(None)` when satisfied and `Ok(Some(dependency))` to defer
    /// on. A multi-instance type must name the instance.
    pub fn require_instance(
        &self,
        component_type: &str,
        instance: Option<&str>,
    ) -> Result<Option<Dependency>, EngineError> {
        let descriptor = self
            .state
            .registry
            .descriptor(component_type)
            .ok_or_else(|| EngineError::UnknownComponent(component_type.to_string()))?;

        let dependency = match instance {
            None if descriptor.allows_multiple_instances() => {
                return Err(EngineError::InstanceRequired(component_type.to_string()));
            }
            None => Dependency::any(component_type),
            Some(instance) => Dependency::instance(component_type, instance),
        };

        let satisfied = self
            .state
            .registry
            .instances_of_type(component_type)
            .iter()
            .any(|name| dependency.is_satisfied_by(component_type, name));
        Ok((!satisfied).then_some(dependency))
    }

    // ── Mediated entry point ──

    /// Handles requests issued by `caller`, each independently.
    ///
    /// Failures are delivered to the caller as notices and yield
    /// `MediatorReply::Failed`. A failed `RequireInstance`, or a caller that
    /// is not a live instance, fails the call.
    pub fn mediate(
        &self,
        caller: &Owner,
        requests: Vec<MediatorRequest>,
    ) -> Result<Vec<MediatorReply>, EngineError> {
        if let Owner::Instance(name) = caller {
            if !self.state.registry.is_loaded(name) && !self.state.registry.is_constructing(name) {
                return Err(EngineError::NotLoaded(name.clone()));
            }
        }
        requests
            .into_iter()
            .map(|request| self.handle_request(caller, request))
            .collect()
    }

    fn handle_request(&self, caller: &Owner, request: MediatorRequest) -> Result<MediatorReply, EngineError> {
        let reply = match request {
            MediatorRequest::AvailableTypes => MediatorReply::Types(self.state.registry.list_discovered()),
            MediatorRequest::Log { level, message } => {
                match level {
                    LogLevel::Info => info!(instance = %caller, "{message}"),
                    LogLevel::Warning => warn!(instance = %caller, "{message}"),
                    LogLevel::Error => error!(instance = %caller, "{message}"),
                }
                MediatorReply::Done
            }
            MediatorRequest::CallCustomMethod { method, args } => {
                match self.call_custom_method(&method, &args, &Kwargs::new()) {
                    Ok(value) => MediatorReply::Value(value),
                    Err(e) => self.route_failure(caller, NoticeReason::CallMethodFailed, e),
                }
            }
            MediatorRequest::AttachCustomHook { hook, callback, action, argument } => {
                let attachment = HookAttachment::new(caller.clone(), callback).with_action(action, argument);
                match self.attach_custom_hook(&hook, attachment) {
                    Ok(id) => MediatorReply::Attached(id),
                    Err(e) => self.route_failure(caller, NoticeReason::AttachHookFailed, e),
                }
            }
            MediatorRequest::AttachSystemHook { hook, callback, action, argument } => {
                let attachment = HookAttachment::new(caller.clone(), callback).with_action(action, argument);
                match self.attach_system_hook(&hook, attachment) {
                    Ok(id) => MediatorReply::Attached(id),
                    Err(e) => self.route_failure(caller, NoticeReason::AttachHookFailed, e),
                }
            }
            MediatorRequest::LoadModule { component_type, kwargs } => {
                match self.load_as(&component_type, caller, kwargs) {
                    Ok(name) => MediatorReply::Loaded(name),
                    Err(e) => self.route_failure(caller, NoticeReason::LoadModuleFailed, e),
                }
            }
            MediatorRequest::UnloadModule { instance } => match self.unload_as(&instance, caller) {
                Ok(()) => MediatorReply::Done,
                Err(e) => self.route_failure(caller, NoticeReason::UnloadModuleFailed, e),
            },
            MediatorRequest::InstallCustomHook { name } => match self.install_custom_hook(&name, caller.clone()) {
                Ok(()) => MediatorReply::Done,
                Err(e) => self.route_failure(caller, NoticeReason::InstallHookFailed, e),
            },
            MediatorRequest::InstallCustomMethod { name, callback } => {
                match self.install_custom_method(&name, callback, caller.clone()) {
                    Ok(()) => MediatorReply::Done,
                    Err(e) => self.route_failure(caller, NoticeReason::InstallMethodFailed, e),
                }
            }
            MediatorRequest::InstallInterrupt { name, callback } => {
                match self.install_interrupt(&name, callback, caller.clone()) {
                    Ok(()) => MediatorReply::Done,
                    Err(e) => self.route_failure(caller, NoticeReason::InstallInterruptFailed, e),
                }
            }
            MediatorRequest::RequireInstance { instance } => {
                if !self.state.registry.is_loaded(&instance) {
                    return Err(EngineError::NotLoaded(instance));
                }
                MediatorReply::Done
            }
        };
        Ok(reply)
    }

    fn route_failure(&self, caller: &Owner, reason: NoticeReason, error: EngineError) -> MediatorReply {
        warn!(caller = %caller, reason = %reason, error = %error, "Mediated request failed");
        self.notify(caller, ManagerNotice::failure(reason, error));
        MediatorReply::Failed(reason)
    }

    /// Delivers a notice now, or queues it while the recipient is being
    /// constructed.
    fn notify(&self, recipient: &Owner, notice: ManagerNotice) {
        let Owner::Instance(name) = recipient else {
            return;
        };
        if let Some(instance) = self.state.registry.get(name) {
            instance.component().communicate(&notice);
        } else if self.state.registry.is_constructing(name) {
            self.state
                .pending_notices
                .lock()
                .entry(name.clone())
                .or_default()
                .push(notice);
        } else {
            debug!(instance = %name, reason = %notice.reason, "Dropping notice for absent instance");
        }
    }

    fn deliver_pending_notices(&self, instance: &LoadedInstance) {
        let notices = self
            .state
            .pending_notices
            .lock()
            .remove(instance.name())
            .unwrap_or_default();
        for notice in notices {
            instance.component().communicate(&notice);
        }
    }
}

impl HookActionExecutor for ModuleManager {
    fn load_component(&self, component_type: &str, kwargs: Kwargs) -> Result<String, EngineError> {
        self.load(component_type, kwargs)
    }

    fn unload_component(&self, instance: &str) -> Result<(), EngineError> {
        self.unload(instance)
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleManager")
            .field("discovered", &self.state.registry.list_discovered())
            .field("loaded", &self.state.registry.list_loaded())
            .field("uptime", &self.uptime())
            .finish()
    }
}
