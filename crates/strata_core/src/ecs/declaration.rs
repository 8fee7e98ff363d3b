//! # Declarations
//!
//! Immutable schema records consumed by the runtime:
//! - [`ComponentDec`]: a named component type, optionally a singleton
//! - [`EntityDec`]: a named, ordered set of component declarations
//! - [`SystemDec`]: a callable plus its ordered parameter types
//! - [`ProcessDec`]: an ordered list of systems
//!
//! A [`Registry`] owns one consistent set of them. Building it validates
//! references, assigns dense entity indices (sorted by name), and computes
//! every system's dispatch plan once.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::component::{ComponentType, ParamType};
use super::resolver::{Args, SystemPlan};
use crate::error::{RegistryError, RegistryResult, SystemResult};

/// A named component type.
#[derive(Debug)]
pub struct ComponentDec {
    name: String,
    ty: ComponentType,
    singleton: bool,
}

impl ComponentDec {
    /// A per-entity component.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: ComponentType) -> Self {
        Self {
            name: name.into(),
            ty,
            singleton: false,
        }
    }

    /// A component with exactly one instance per environment.
    #[must_use]
    pub fn singleton(name: impl Into<String>, ty: ComponentType) -> Self {
        Self {
            name: name.into(),
            ty,
            singleton: true,
        }
    }

    /// Declaration name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runtime type description.
    #[inline]
    #[must_use]
    pub fn ty(&self) -> &ComponentType {
        &self.ty
    }

    /// Whether this is a singleton.
    #[inline]
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.singleton
    }
}

/// Outcome of looking up a type among an entity's components.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentMatch {
    /// Exactly one component is assignable; its column index.
    Found(usize),
    /// No component is assignable.
    Missing,
    /// Several components are assignable.
    Ambiguous,
}

/// A named entity layout.
#[derive(Debug)]
pub struct EntityDec {
    name: String,
    components: Vec<Arc<ComponentDec>>,
    index: usize,
}

impl EntityDec {
    /// Declaration name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Component declarations, in column order.
    #[inline]
    #[must_use]
    pub fn components(&self) -> &[Arc<ComponentDec>] {
        &self.components
    }

    /// Dense index, stable for the registry's lifetime.
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Finds the single component assignable to `param`.
    #[must_use]
    pub fn find(&self, param: TypeId) -> ComponentMatch {
        let mut found = None;
        for (column, component) in self.components.iter().enumerate() {
            if component.ty().is_assignable_to(param) {
                if found.is_some() {
                    return ComponentMatch::Ambiguous;
                }
                found = Some(column);
            }
        }
        found.map_or(ComponentMatch::Missing, ComponentMatch::Found)
    }
}

/// Callable body of a system.
pub type SystemFn = dyn Fn(&mut Args<'_>) -> SystemResult + Send + Sync;

/// A system: logic plus the parameter types it asks for.
///
/// # Example
///
/// ```rust,ignore
/// let tick = SystemDec::new("tick", |args| {
///     let counter = args.take::<Counter>(0)?;
///     counter.n += 1;
///     Ok(())
/// })
/// .param::<Counter>();
/// ```
pub struct SystemDec {
    name: String,
    params: Vec<ParamType>,
    run: Box<SystemFn>,
    plan: SystemPlan,
}

impl SystemDec {
    /// Creates a system with no parameters yet.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, run: F) -> Self
    where
        F: Fn(&mut Args<'_>) -> SystemResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: Vec::new(),
            run: Box::new(run),
            plan: SystemPlan::default(),
        }
    }

    /// Appends a parameter of type `U`.
    #[must_use]
    pub fn param<U: ?Sized + 'static>(mut self) -> Self {
        self.params.push(ParamType::of::<U>());
        self
    }

    /// Declaration name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter types, in order.
    #[inline]
    #[must_use]
    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    /// Dispatch plan computed when the registry was built.
    #[must_use]
    pub fn plan(&self) -> &SystemPlan {
        &self.plan
    }

    pub(crate) fn invoke(&self, args: &mut Args<'_>) -> SystemResult {
        (self.run)(args)
    }
}

impl fmt::Debug for SystemDec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemDec")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// An ordered list of systems run as one dispatch pass.
#[derive(Debug)]
pub struct ProcessDec {
    name: String,
    order: Vec<Arc<SystemDec>>,
}

impl ProcessDec {
    /// Declaration name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Systems, in execution order.
    #[inline]
    #[must_use]
    pub fn order(&self) -> &[Arc<SystemDec>] {
        &self.order
    }
}

// =============================================================================
// Registry
// =============================================================================

/// One validated, immutable set of declarations.
#[derive(Debug)]
pub struct Registry {
    components: Vec<Arc<ComponentDec>>,
    singletons: Vec<Arc<ComponentDec>>,
    singleton_index: HashMap<TypeId, usize>,
    entities: Vec<Arc<EntityDec>>,
    systems: Vec<Arc<SystemDec>>,
    processes: Vec<Arc<ProcessDec>>,
}

impl Registry {
    /// Starts a registry.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// All component declarations, sorted by name.
    #[must_use]
    pub fn components(&self) -> &[Arc<ComponentDec>] {
        &self.components
    }

    /// Singleton declarations, sorted by name. Position = singleton index.
    #[must_use]
    pub fn singletons(&self) -> &[Arc<ComponentDec>] {
        &self.singletons
    }

    /// Entity declarations, sorted by name. Position = [`EntityDec::index`].
    #[must_use]
    pub fn entities(&self) -> &[Arc<EntityDec>] {
        &self.entities
    }

    /// System declarations, in registration order.
    #[must_use]
    pub fn systems(&self) -> &[Arc<SystemDec>] {
        &self.systems
    }

    /// Process declarations, in registration order.
    #[must_use]
    pub fn processes(&self) -> &[Arc<ProcessDec>] {
        &self.processes
    }

    /// Singleton index of a runtime type.
    #[must_use]
    pub fn singleton_index(&self, ty: TypeId) -> Option<usize> {
        self.singleton_index.get(&ty).copied()
    }

    /// Type-to-index map of the singleton table.
    #[must_use]
    pub fn singleton_map(&self) -> &HashMap<TypeId, usize> {
        &self.singleton_index
    }

    /// Looks up a component declaration by name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<Arc<ComponentDec>> {
        self.components.iter().find(|c| c.name() == name).cloned()
    }

    /// Looks up an entity declaration by name.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<Arc<EntityDec>> {
        self.entities
            .binary_search_by(|e| e.name().cmp(name))
            .ok()
            .map(|i| Arc::clone(&self.entities[i]))
    }

    /// Looks up a system declaration by name.
    #[must_use]
    pub fn system(&self, name: &str) -> Option<Arc<SystemDec>> {
        self.systems.iter().find(|s| s.name() == name).cloned()
    }

    /// Looks up a process declaration by name.
    #[must_use]
    pub fn process(&self, name: &str) -> Option<Arc<ProcessDec>> {
        self.processes.iter().find(|p| p.name() == name).cloned()
    }

    /// Checks whether `dec` is one of this registry's entity declarations.
    #[must_use]
    pub fn owns_entity(&self, dec: &EntityDec) -> bool {
        self.entities
            .get(dec.index())
            .is_some_and(|own| std::ptr::eq(own.as_ref(), dec))
    }

    /// Checks whether `process` is one of this registry's processes.
    #[must_use]
    pub fn owns_process(&self, process: &ProcessDec) -> bool {
        self.processes
            .iter()
            .any(|own| std::ptr::eq(own.as_ref(), process))
    }
}

/// Builder for [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    components: Vec<ComponentDec>,
    entities: Vec<(String, Vec<String>)>,
    systems: Vec<SystemDec>,
    processes: Vec<(String, Vec<String>)>,
}

fn check_unique<'a>(
    kind: &'static str,
    names: impl IntoIterator<Item = &'a str>,
) -> RegistryResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(RegistryError::DuplicateName {
                kind,
                name: name.to_owned(),
            });
        }
    }
    Ok(())
}

impl RegistryBuilder {
    /// Declares a per-entity component.
    #[must_use]
    pub fn component(mut self, name: impl Into<String>, ty: ComponentType) -> Self {
        self.components.push(ComponentDec::new(name, ty));
        self
    }

    /// Declares a singleton component.
    #[must_use]
    pub fn singleton(mut self, name: impl Into<String>, ty: ComponentType) -> Self {
        self.components.push(ComponentDec::singleton(name, ty));
        self
    }

    /// Declares an entity layout from component names, in column order.
    #[must_use]
    pub fn entity<I, S>(mut self, name: impl Into<String>, components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities
            .push((name.into(), components.into_iter().map(Into::into).collect()));
        self
    }

    /// Declares a system.
    #[must_use]
    pub fn system(mut self, system: SystemDec) -> Self {
        self.systems.push(system);
        self
    }

    /// Declares a process from system names, in execution order.
    #[must_use]
    pub fn process<I, S>(mut self, name: impl Into<String>, systems: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.processes
            .push((name.into(), systems.into_iter().map(Into::into).collect()));
        self
    }

    /// Validates declarations and computes dispatch plans.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] on duplicate names, dangling references,
    /// singletons listed in entity layouts, or two singletons of one type.
    pub fn build(self) -> RegistryResult<Arc<Registry>> {
        check_unique("component", self.components.iter().map(ComponentDec::name))?;
        check_unique("entity", self.entities.iter().map(|(n, _)| n.as_str()))?;
        check_unique("system", self.systems.iter().map(SystemDec::name))?;
        check_unique("process", self.processes.iter().map(|(n, _)| n.as_str()))?;

        let mut components: Vec<Arc<ComponentDec>> =
            self.components.into_iter().map(Arc::new).collect();
        components.sort_by(|a, b| a.name().cmp(b.name()));

        let singletons: Vec<Arc<ComponentDec>> = components
            .iter()
            .filter(|c| c.is_singleton())
            .cloned()
            .collect();
        let mut singleton_index = HashMap::new();
        for (index, singleton) in singletons.iter().enumerate() {
            if let Some(previous) = singleton_index.insert(singleton.ty().type_id(), index) {
                return Err(RegistryError::DuplicateSingletonType {
                    first: singletons[previous].name().to_owned(),
                    second: singleton.name().to_owned(),
                    ty: singleton.ty().type_name(),
                });
            }
        }

        let mut layouts = self.entities;
        layouts.sort_by(|a, b| a.0.cmp(&b.0));
        let mut entities = Vec::with_capacity(layouts.len());
        for (index, (name, names)) in layouts.into_iter().enumerate() {
            let mut columns = Vec::with_capacity(names.len());
            for component in names {
                let Some(dec) = components.iter().find(|c| c.name() == component) else {
                    return Err(RegistryError::UnknownComponent {
                        entity: name,
                        component,
                    });
                };
                if dec.is_singleton() {
                    return Err(RegistryError::SingletonInEntity {
                        entity: name,
                        component,
                    });
                }
                columns.push(Arc::clone(dec));
            }
            entities.push(Arc::new(EntityDec {
                name,
                components: columns,
                index,
            }));
        }

        let systems: Vec<Arc<SystemDec>> = self
            .systems
            .into_iter()
            .map(|mut system| {
                system.plan = SystemPlan::build(&system, &components, &singletons, &entities);
                Arc::new(system)
            })
            .collect();

        let mut processes = Vec::with_capacity(self.processes.len());
        for (name, names) in self.processes {
            let mut order = Vec::with_capacity(names.len());
            for system in names {
                let Some(dec) = systems.iter().find(|s| s.name() == system) else {
                    return Err(RegistryError::UnknownSystem {
                        process: name,
                        system,
                    });
                };
                order.push(Arc::clone(dec));
            }
            processes.push(Arc::new(ProcessDec { name, order }));
        }

        tracing::debug!(
            "Registry built: {} components ({} singletons), {} entities, {} systems, {} processes",
            components.len(),
            singletons.len(),
            entities.len(),
            systems.len(),
            processes.len()
        );

        Ok(Arc::new(Registry {
            components,
            singletons,
            singleton_index,
            entities,
            systems,
            processes,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Hp(u32);

    #[derive(Clone, Default)]
    struct Clock(u64);

    #[test]
    fn test_entities_sorted_and_indexed() {
        let registry = Registry::builder()
            .component("hp", ComponentType::of::<Hp>())
            .entity("zombie", ["hp"])
            .entity("archer", ["hp"])
            .build()
            .unwrap();

        let names: Vec<_> = registry.entities().iter().map(|e| e.name().to_owned()).collect();
        assert_eq!(names, ["archer", "zombie"]);
        assert_eq!(registry.entity("zombie").unwrap().index(), 1);
        assert!(registry.owns_entity(&registry.entity("archer").unwrap()));
    }

    #[test]
    fn test_find_reports_ambiguity() {
        let registry = Registry::builder()
            .component("hp", ComponentType::of::<Hp>())
            .component("mana", ComponentType::of::<Hp>())
            .entity("mage", ["hp", "mana"])
            .entity("brute", ["hp"])
            .build()
            .unwrap();

        let mage = registry.entity("mage").unwrap();
        assert_eq!(mage.find(TypeId::of::<Hp>()), ComponentMatch::Ambiguous);
        assert_eq!(mage.find(TypeId::of::<Clock>()), ComponentMatch::Missing);

        let brute = registry.entity("brute").unwrap();
        assert_eq!(brute.find(TypeId::of::<Hp>()), ComponentMatch::Found(0));
    }

    #[test]
    fn test_unknown_component_rejected() {
        let err = Registry::builder().entity("ghost", ["hp"]).build().unwrap_err();
        assert!(matches!(err, RegistryError::UnknownComponent { .. }));
    }

    #[test]
    fn test_singleton_in_entity_rejected() {
        let err = Registry::builder()
            .singleton("clock", ComponentType::of::<Clock>())
            .entity("e", ["clock"])
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::SingletonInEntity { .. }));
    }

    #[test]
    fn test_duplicate_singleton_type_rejected() {
        let err = Registry::builder()
            .singleton("a", ComponentType::of::<Clock>())
            .singleton("b", ComponentType::of::<Clock>())
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSingletonType { .. }));
    }

    #[test]
    fn test_unknown_system_rejected() {
        let err = Registry::builder()
            .process("main", ["missing"])
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownSystem { .. }));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Registry::builder()
            .component("hp", ComponentType::of::<Hp>())
            .component("hp", ComponentType::of::<Clock>())
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { kind: "component", .. }));
    }
}
