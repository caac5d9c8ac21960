//! Component registry: discovered types and loaded instances.
//!
//! The registry owns instance naming and the multi-instance policy. It does
//! not fire lifecycle hooks; the manager does that after a create commits.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, warn};

use modhost_core::events::MANAGER_OWNER;
use modhost_core::types::Kwargs;

use crate::component::ComponentContext;
use crate::descriptor::{ComponentDescriptor, ComponentRegistration};
use crate::error::EngineError;
use crate::instance::LoadedInstance;
use crate::mediator::Mediator;
use crate::owner::Owner;

/// Load kwarg overriding the base instance name.
pub const INSTANCE_NAME_KEY: &str = "instance_name";
/// Load kwarg appended to the base instance name as `-<suffix>`.
pub const INSTANCE_SUFFIX_KEY: &str = "instance_suffix";

/// Registry of discovered component types and loaded instances.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    /// Type name → registration.
    discovered: RwLock<IndexMap<String, ComponentRegistration>>,
    /// Instance name → instance, in load order.
    loaded: RwLock<IndexMap<String, Arc<LoadedInstance>>>,
    /// Instance name → type, for instances whose factory is still running.
    reserved: Mutex<HashMap<String, String>>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component type, replacing an earlier registration of the
    /// same type.
    pub fn register(&self, registration: ComponentRegistration) -> Option<ComponentRegistration> {
        let component_type = registration.component_type().to_string();
        let previous = self
            .discovered
            .write()
            .insert(component_type.clone(), registration);

        if previous.is_some() {
            warn!(component = %component_type, "Component type re-registered, replacing");
        } else {
            info!(component = %component_type, "Component type registered");
        }
        previous
    }

    pub fn registration(&self, component_type: &str) -> Option<ComponentRegistration> {
        self.discovered.read().get(component_type).cloned()
    }

    pub fn descriptor(&self, component_type: &str) -> Option<Arc<ComponentDescriptor>> {
        self.discovered
            .read()
            .get(component_type)
            .map(|r| r.descriptor.clone())
    }

    pub fn is_discovered(&self, component_type: &str) -> bool {
        self.discovered.read().contains_key(component_type)
    }

    pub fn is_loaded(&self, instance_name: &str) -> bool {
        self.loaded.read().contains_key(instance_name)
    }

    /// Returns whether a factory for this name is currently running.
    pub fn is_constructing(&self, instance_name: &str) -> bool {
        self.reserved.lock().contains_key(instance_name)
    }

    pub fn get(&self, instance_name: &str) -> Option<Arc<LoadedInstance>> {
        self.loaded.read().get(instance_name).cloned()
    }

    /// Names of loaded instances of a type, in load order.
    pub fn instances_of_type(&self, component_type: &str) -> Vec<String> {
        self.loaded
            .read()
            .values()
            .filter(|i| i.component_type() == component_type)
            .map(|i| i.name().to_string())
            .collect()
    }

    /// Discovered type names, in registration order.
    pub fn list_discovered(&self) -> Vec<String> {
        self.discovered.read().keys().cloned().collect()
    }

    /// Loaded instance names with their owners, in load order.
    pub fn list_loaded(&self) -> IndexMap<String, Owner> {
        self.loaded
            .read()
            .values()
            .map(|i| (i.name().to_string(), i.owner().clone()))
            .collect()
    }

    /// Snapshot of loaded instances, in load order.
    pub fn loaded_instances(&self) -> Vec<Arc<LoadedInstance>> {
        self.loaded.read().values().cloned().collect()
    }

    /// Computes the name a new instance of `component_type` would get.
    ///
    /// The base is the `instance_name` kwarg or the type name, followed by
    /// `-<instance_suffix>` when given. On collision a multi-instance type
    /// gets its fixed suffix if it declares one, otherwise the next free
    /// numeric suffix.
    pub fn resolve_instance_name(
        &self,
        component_type: &str,
        kwargs: &Kwargs,
    ) -> Result<String, EngineError> {
        let descriptor = self
            .descriptor(component_type)
            .ok_or_else(|| EngineError::UnknownComponent(component_type.to_string()))?;

        let mut base = kwargs
            .get(INSTANCE_NAME_KEY)
            .and_then(Value::as_str)
            .unwrap_or(component_type)
            .to_string();
        if let Some(suffix) = kwargs.get(INSTANCE_SUFFIX_KEY) {
            match suffix {
                Value::String(s) => base = format!("{base}-{s}"),
                Value::Null => {}
                other => base = format!("{base}-{other}"),
            }
        }

        let taken = self.taken_names();
        let multi = descriptor.allows_multiple_instances();

        if !multi && taken.values().any(|ty| ty == component_type) {
            return Err(EngineError::AlreadyLoaded(component_type.to_string()));
        }

        if !taken.contains_key(&base) {
            return Ok(base);
        }

        if !multi {
            return Err(EngineError::AlreadyLoaded(base));
        }

        if let Some(fixed) = &descriptor.multi_instance_suffix {
            let name = format!("{base}-{fixed}");
            return if taken.contains_key(&name) {
                Err(EngineError::AlreadyLoaded(name))
            } else {
                Ok(name)
            };
        }

        let next = taken
            .keys()
            .filter_map(|name| numeric_suffix(name, &base))
            .max()
            .map_or(1, |n| n + 1);
        Ok(format!("{base}-{next}"))
    }

    /// Checks required arguments, runs the factory and commits the instance.
    ///
    /// The name is reserved while the factory runs, so a reentrant load
    /// cannot claim it. No registry lock is held during the factory call.
    pub fn create(
        &self,
        component_type: &str,
        instance_name: &str,
        kwargs: Kwargs,
        owner: Owner,
        mediator: Mediator,
    ) -> Result<Arc<LoadedInstance>, EngineError> {
        let registration = self
            .registration(component_type)
            .ok_or_else(|| EngineError::UnknownComponent(component_type.to_string()))?;

        if let Some(arg) = registration.descriptor.missing_argument(&kwargs) {
            return Err(EngineError::MissingArgument {
                component_type: component_type.to_string(),
                argument: arg.name.clone(),
            });
        }

        if self.is_loaded(instance_name) {
            return Err(EngineError::AlreadyLoaded(instance_name.to_string()));
        }
        {
            let mut reserved = self.reserved.lock();
            if reserved.contains_key(instance_name) {
                return Err(EngineError::AlreadyLoaded(instance_name.to_string()));
            }
            reserved.insert(instance_name.to_string(), component_type.to_string());
        }

        debug!(instance = %instance_name, component = %component_type, "Constructing instance");

        let context = ComponentContext {
            instance_name: instance_name.to_string(),
            component_type: component_type.to_string(),
            kwargs: kwargs.clone(),
            mediator,
        };
        let built = (registration.factory)(context);
        self.reserved.lock().remove(instance_name);

        let component = built.map_err(|e| EngineError::ComponentFailed {
            component_type: component_type.to_string(),
            message: e.to_string(),
        })?;

        let instance = Arc::new(LoadedInstance::new(
            instance_name.to_string(),
            registration.descriptor.clone(),
            component,
            kwargs,
            owner,
        ));
        self.loaded
            .write()
            .insert(instance_name.to_string(), instance.clone());
        Ok(instance)
    }

    /// Removes an instance record.
    pub fn remove(&self, instance_name: &str) -> Option<Arc<LoadedInstance>> {
        self.loaded.write().shift_remove(instance_name)
    }

    /// Loaded and reserved names with their types. The manager sentinel is
    /// never available as an instance name.
    fn taken_names(&self) -> HashMap<String, String> {
        let mut taken: HashMap<String, String> = self
            .loaded
            .read()
            .values()
            .map(|i| (i.name().to_string(), i.component_type().to_string()))
            .collect();
        taken.extend(
            self.reserved
                .lock()
                .iter()
                .map(|(name, ty)| (name.clone(), ty.clone())),
        );
        taken.insert(MANAGER_OWNER.to_string(), String::new());
        taken
    }
}

/// Parses `n` out of `<base>-<n>`.
fn numeric_suffix(name: &str, base: &str) -> Option<u64> {
    let digits = name.strip_prefix(base)?.strip_prefix('-')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::component::{CapabilityTable, Component, factory};

    struct Blank(CapabilityTable);

    impl Component for Blank {
        fn capabilities(&self) -> &CapabilityTable {
            &self.0
        }
    }

    fn registration(descriptor: ComponentDescriptor) -> ComponentRegistration {
        ComponentRegistration::new(
            descriptor,
            factory(|_| Ok(Arc::new(Blank(CapabilityTable::new())) as Arc<dyn Component>)),
        )
    }

    fn registry() -> ComponentRegistry {
        let registry = ComponentRegistry::new();
        registry.register(registration(ComponentDescriptor::new("alpha", "single")));
        registry.register(registration(ComponentDescriptor::new("beta", "multi").multi_instance()));
        registry.register(registration(
            ComponentDescriptor::new("gamma", "fixed suffix")
                .multi_instance()
                .with_instance_suffix("aux"),
        ));
        registry.register(registration(
            ComponentDescriptor::new("delta", "needs uid").with_required_arg("uid", "unit id"),
        ));
        registry
    }

    fn load(registry: &ComponentRegistry, ty: &str, kwargs: Kwargs) -> Result<String, EngineError> {
        let name = registry.resolve_instance_name(ty, &kwargs)?;
        registry.create(ty, &name, kwargs, Owner::Manager, Mediator::detached(&name))?;
        Ok(name)
    }

    #[test]
    fn test_numeric_suffix() {
        assert_eq!(numeric_suffix("beta-12", "beta"), Some(12));
        assert_eq!(numeric_suffix("beta-x", "beta"), None);
        assert_eq!(numeric_suffix("beta-", "beta"), None);
        assert_eq!(numeric_suffix("betamax-1", "beta"), None);
        assert_eq!(numeric_suffix("beta-1-2", "beta"), None);
    }

    #[test]
    fn test_multi_instance_naming() {
        let registry = registry();
        let names: Vec<_> = (0..3)
            .map(|_| load(&registry, "beta", Kwargs::new()).expect("load"))
            .collect();
        assert_eq!(names, vec!["beta", "beta-1", "beta-2"]);

        registry.remove("beta-1");
        assert_eq!(load(&registry, "beta", Kwargs::new()).expect("load"), "beta-3");
    }

    #[test]
    fn test_single_instance_rejected() {
        let registry = registry();
        load(&registry, "alpha", Kwargs::new()).expect("first load");
        let mut kwargs = Kwargs::new();
        kwargs.insert(INSTANCE_NAME_KEY.into(), json!("other"));
        assert!(matches!(
            load(&registry, "alpha", kwargs),
            Err(EngineError::AlreadyLoaded(name)) if name == "alpha"
        ));
    }

    #[test]
    fn test_fixed_suffix_rule() {
        let registry = registry();
        assert_eq!(load(&registry, "gamma", Kwargs::new()).expect("load"), "gamma");
        assert_eq!(load(&registry, "gamma", Kwargs::new()).expect("load"), "gamma-aux");
        assert!(matches!(
            load(&registry, "gamma", Kwargs::new()),
            Err(EngineError::AlreadyLoaded(name)) if name == "gamma-aux"
        ));
    }

    #[test]
    fn test_explicit_name_and_suffix() {
        let registry = registry();
        let mut kwargs = Kwargs::new();
        kwargs.insert(INSTANCE_NAME_KEY.into(), json!("kitchen"));
        kwargs.insert(INSTANCE_SUFFIX_KEY.into(), json!(2));
        assert_eq!(load(&registry, "beta", kwargs.clone()).expect("load"), "kitchen-2");
        assert_eq!(load(&registry, "beta", kwargs).expect("load"), "kitchen-2-1");
        assert_eq!(registry.instances_of_type("beta"), vec!["kitchen-2", "kitchen-2-1"]);
    }

    #[test]
    fn test_missing_required_argument() {
        let registry = registry();
        let err = load(&registry, "delta", Kwargs::new()).unwrap_err();
        assert_eq!(
            err,
            EngineError::MissingArgument {
                component_type: "delta".into(),
                argument: "uid".into()
            }
        );
        assert!(!registry.is_loaded("delta"));
    }

    #[test]
    fn test_unknown_type() {
        let registry = registry();
        assert!(matches!(
            registry.resolve_instance_name("omega", &Kwargs::new()),
            Err(EngineError::UnknownComponent(_))
        ));
    }

    #[test]
    fn test_factory_failure_releases_name() {
        let registry = ComponentRegistry::new();
        registry.register(ComponentRegistration::new(
            ComponentDescriptor::new("broken", "always fails"),
            factory(|_| Err("no device".into())),
        ));
        let err = load(&registry, "broken", Kwargs::new()).unwrap_err();
        assert!(matches!(err, EngineError::ComponentFailed { .. }));
        assert!(!registry.is_constructing("broken"));
        assert!(registry.list_loaded().is_empty());
    }

    #[test]
    fn test_manager_name_is_reserved() {
        let registry = registry();
        let mut kwargs = Kwargs::new();
        kwargs.insert(INSTANCE_NAME_KEY.into(), json!("manager"));
        assert!(matches!(
            registry.resolve_instance_name("alpha", &kwargs),
            Err(EngineError::AlreadyLoaded(_))
        ));
        assert_eq!(
            registry.resolve_instance_name("beta", &kwargs).expect("name"),
            "manager-1"
        );
    }

    #[test]
    fn test_list_loaded_records_owner() {
        let registry = registry();
        let name = registry
            .resolve_instance_name("beta", &Kwargs::new())
            .expect("name");
        registry
            .create("beta", &name, Kwargs::new(), Owner::instance("alpha"), Mediator::detached(&name))
            .expect("create");
        assert_eq!(registry.list_loaded().get("beta"), Some(&Owner::instance("alpha")));
    }
}
