//! # Environment
//!
//! The storage engine: owns every tranche, the singleton table, the entity
//! lookup table with its free list, and the deferred-mutation queue, and runs
//! dispatch passes over them.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──process()──► Processing (system step) ──► Idle (flush) ──► next system
//! ```
//!
//! While idle, `add`/`remove` apply immediately. During a system step they
//! are queued and applied, in order, right after the step.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::commands::{Command, Commands, DeferredQueue};
use super::component::{Component, ComponentSet, ComponentType};
use super::declaration::{EntityDec, ProcessDec, Registry, SystemDec};
use super::entity::{next_generation, DeferredId, Entity, EntityId};
use super::resolver::{ArgSource, Args, Peers, Route, Slot};
use super::storage::Column;
use super::tranche::{fill_components, Tranche};
use crate::config::EnvironmentConfig;
use crate::diagnostics::Diagnostics;
use crate::error::{EcsError, SystemResult};
use crate::sync::{self, ActiveScope, EnvironmentId};

/// Hook appended to entity diagnostic strings.
pub type EntityFormatter = dyn Fn(&Environment, Entity) -> String + Send + Sync;

/// Engine state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// Mutations apply immediately.
    Idle,
    /// A system step is running; mutations are deferred.
    Processing,
}

impl Status {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the id → location table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityLookup {
    dec: Option<usize>,
    slot: usize,
    generation: u32,
}

impl EntityLookup {
    /// Tranche index of the owning declaration; `None` while the id is free.
    #[inline]
    #[must_use]
    pub fn dec(&self) -> Option<usize> {
        self.dec
    }

    /// Slot within the tranche.
    #[inline]
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Current generation of the id.
    #[inline]
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Deep copy of an environment's state.
///
/// Produced by [`Environment::record`], consumed by [`Environment::restore`].
pub struct EnvironmentRecord {
    tranches: Vec<Tranche>,
    lookup: Vec<EntityLookup>,
    free_list: Vec<u32>,
    singletons: Vec<Box<dyn Column>>,
    singleton_index: HashMap<TypeId, usize>,
    resolved: HashMap<DeferredId, EntityId>,
}

impl EnvironmentRecord {
    /// Recorded tranches, by declaration index.
    #[must_use]
    pub fn tranches(&self) -> &[Tranche] {
        &self.tranches
    }

    /// Recorded lookup table.
    #[must_use]
    pub fn lookup(&self) -> &[EntityLookup] {
        &self.lookup
    }

    /// Recorded free list.
    #[must_use]
    pub fn free_list(&self) -> &[u32] {
        &self.free_list
    }

    /// Number of recorded singletons.
    #[must_use]
    pub fn singleton_count(&self) -> usize {
        self.singletons.len()
    }

    /// Recorded singleton type → index map.
    #[must_use]
    pub fn singleton_index(&self) -> &HashMap<TypeId, usize> {
        &self.singleton_index
    }

    /// Replacements of deferred handles whose entities are still recorded
    /// under the id they were created with.
    #[must_use]
    pub fn resolved(&self) -> &HashMap<DeferredId, EntityId> {
        &self.resolved
    }
}

impl Clone for EnvironmentRecord {
    fn clone(&self) -> Self {
        Self {
            tranches: self.tranches.clone(),
            lookup: self.lookup.clone(),
            free_list: self.free_list.clone(),
            singletons: self.singletons.iter().map(|c| c.clone_column()).collect(),
            singleton_index: self.singleton_index.clone(),
            resolved: self.resolved.clone(),
        }
    }
}

impl fmt::Debug for EnvironmentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvironmentRecord")
            .field("tranches", &self.tranches)
            .field("lookup", &self.lookup.len())
            .field("free_list", &self.free_list)
            .field("singletons", &self.singletons.len())
            .field("resolved", &self.resolved.len())
            .finish()
    }
}

/// Argument source bound for one tranche run.
enum Bound<'b> {
    Singleton(&'b mut Box<dyn Column>, &'b ComponentType),
    Column(&'b mut Box<dyn Column>, &'b ComponentType),
    Entity,
}

/// The storage engine.
///
/// # Example
///
/// ```rust,ignore
/// let mut env = Environment::new(registry.clone());
/// let unit = registry.entity("unit").unwrap();
/// let e = env.add(&unit);
/// env.process(&registry.process("tick").unwrap());
/// assert!(e.is_valid(&env));
/// ```
pub struct Environment {
    id: EnvironmentId,
    registry: Arc<Registry>,
    config: EnvironmentConfig,
    tranches: Vec<Tranche>,
    singletons: Vec<Box<dyn Column>>,
    lookup: Vec<EntityLookup>,
    free_list: Vec<u32>,
    status: Status,
    deferred: DeferredQueue,
    diagnostics: Diagnostics,
    formatter: Option<Arc<EntityFormatter>>,
}

impl Environment {
    /// Creates an environment with the default configuration.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_config(registry, EnvironmentConfig::default())
    }

    /// Creates an environment.
    ///
    /// Builds one default-constructed instance per singleton declaration and
    /// one empty tranche per entity declaration.
    #[must_use]
    pub fn with_config(registry: Arc<Registry>, config: EnvironmentConfig) -> Self {
        let singletons = registry
            .singletons()
            .iter()
            .map(|dec| {
                let mut column = dec.ty().new_column(1);
                column.push_default();
                column
            })
            .collect();
        let tranches = registry
            .entities()
            .iter()
            .map(|dec| Tranche::new(Arc::clone(dec), config.tranche_capacity))
            .collect();

        let env = Self {
            id: EnvironmentId::next(),
            tranches,
            singletons,
            lookup: Vec::with_capacity(config.lookup_capacity),
            free_list: Vec::new(),
            status: Status::Idle,
            deferred: DeferredQueue::default(),
            diagnostics: Diagnostics::new(config.capture_diagnostics, config.diagnostic_limit),
            formatter: None,
            registry,
            config,
        };
        tracing::debug!(
            "Environment {} created: {} tranches, {} singletons",
            env.id,
            env.tranches.len(),
            env.singletons.len()
        );
        env
    }

    /// Unique instance identity.
    #[inline]
    #[must_use]
    pub fn id(&self) -> EnvironmentId {
        self.id
    }

    /// Declarations this environment was built from.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Configuration in effect.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Current engine state.
    #[inline]
    #[must_use]
    pub fn status(&self) -> Status {
        self.status
    }

    /// Report sink.
    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Marks this environment active on the current thread until the
    /// returned scope is dropped.
    pub fn activate(&self) -> ActiveScope {
        ActiveScope::enter(self.id)
    }

    /// Installs a hook whose output is appended to entity diagnostic strings.
    pub fn set_entity_formatter<F>(&mut self, formatter: F)
    where
        F: Fn(&Environment, Entity) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
    }

    /// Removes the formatter hook.
    pub fn clear_entity_formatter(&mut self) {
        self.formatter = None;
    }

    pub(crate) fn entity_formatter(&self) -> Option<&EntityFormatter> {
        self.formatter.as_deref()
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Collapses a deferred handle into its resolved form once its creation
    /// has been applied. Other handles are returned unchanged.
    #[must_use]
    pub fn resolve(&self, entity: Entity) -> Entity {
        self.deferred.resolve(entity)
    }

    pub(crate) fn is_staged(&self, token: DeferredId) -> bool {
        self.deferred.is_staged(token)
    }

    /// Validates id bounds and generation.
    ///
    /// # Returns
    ///
    /// The resolved id with its tranche index and slot, or `None` on any
    /// mismatch.
    fn locate(&self, entity: Entity) -> Option<(EntityId, usize, usize)> {
        let Entity::Resolved(id) = self.resolve(entity) else {
            return None;
        };
        if id.is_null() {
            return None;
        }
        let row = self.lookup.get(id.index() as usize)?;
        if row.generation != id.generation() {
            return None;
        }
        Some((id, row.dec?, row.slot))
    }

    /// Tranche and slot of a live or staged entity.
    pub(crate) fn place(&self, entity: Entity) -> Option<(&Tranche, usize)> {
        match self.resolve(entity) {
            Entity::Deferred(token) => self.deferred.staged(token).map(|t| (t, 0)),
            resolved => {
                let (_, tranche, slot) = self.locate(resolved)?;
                Some((self.tranches.get(tranche)?, slot))
            }
        }
    }

    pub(crate) fn place_mut(&mut self, entity: Entity) -> Option<(&mut Tranche, usize)> {
        match self.resolve(entity) {
            Entity::Deferred(token) => self.deferred.staged_mut(token).map(|t| (t, 0)),
            resolved => {
                let (_, tranche, slot) = self.locate(resolved)?;
                Some((self.tranches.get_mut(tranche)?, slot))
            }
        }
    }

    /// Declaration, tranche and slot of an entity.
    ///
    /// `None` for null, stale, removed or unknown handles; this is not an
    /// error by itself.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<(&EntityDec, &Tranche, usize)> {
        self.place(entity)
            .map(|(tranche, slot)| (tranche.dec().as_ref(), tranche, slot))
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tranches.iter().map(Tranche::len).sum()
    }

    /// Checks whether no entities are live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tranches.iter().all(Tranche::is_empty)
    }

    /// All live entities, tranche by tranche in storage order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.tranches
            .iter()
            .flat_map(|tranche| tranche.entries().iter().copied())
    }

    /// All tranches, by declaration index.
    #[must_use]
    pub fn tranches(&self) -> &[Tranche] {
        &self.tranches
    }

    /// Tranche of one declaration.
    #[must_use]
    pub fn tranche(&self, dec: &EntityDec) -> Option<&Tranche> {
        self.tranches
            .get(dec.index())
            .filter(|tranche| std::ptr::eq(tranche.dec().as_ref(), dec))
    }

    /// The id → location table.
    #[must_use]
    pub fn lookup(&self) -> &[EntityLookup] {
        &self.lookup
    }

    /// Reclaimed ids, next reuse last.
    #[must_use]
    pub fn free_list(&self) -> &[u32] {
        &self.free_list
    }

    // =========================================================================
    // Singletons
    // =========================================================================

    fn singleton_slot<T: Component>(&self) -> Option<usize> {
        let index = self.registry.singleton_index(TypeId::of::<T>());
        if index.is_none() {
            self.diagnostics
                .error(EcsError::UnknownSingleton(std::any::type_name::<T>()));
        }
        index
    }

    /// The singleton instance of `T`.
    ///
    /// Reports an error and returns `None` if `T` is not a declared singleton.
    #[must_use]
    pub fn singleton<T: Component>(&self) -> Option<&T> {
        let index = self.singleton_slot::<T>()?;
        self.singletons.get(index)?.get(0)?.downcast_ref::<T>()
    }

    /// Mutable singleton access. See [`Environment::singleton`].
    pub fn singleton_mut<T: Component>(&mut self) -> Option<&mut T> {
        let index = self.singleton_slot::<T>()?;
        self.singletons.get_mut(index)?.get_mut(0)?.downcast_mut::<T>()
    }

    // =========================================================================
    // Add / Remove
    // =========================================================================

    fn owned_dec(&self, dec: &EntityDec) -> Option<Arc<EntityDec>> {
        let owned = self
            .registry
            .entities()
            .get(dec.index())
            .filter(|own| std::ptr::eq(own.as_ref(), dec))
            .cloned();
        if owned.is_none() {
            self.diagnostics
                .error(EcsError::ForeignDeclaration(dec.name().to_owned()));
        }
        owned
    }

    /// Adds an entity with default components.
    pub fn add(&mut self, dec: &EntityDec) -> Entity {
        self.add_with(dec, ComponentSet::new())
    }

    /// Adds an entity, filling declared components from `provided`.
    ///
    /// Idle: created immediately, returns a resolved handle.
    /// Processing: staged, returns a deferred handle that resolves after the
    /// current system step.
    ///
    /// # Returns
    ///
    /// The null handle if `dec` belongs to another registry.
    pub fn add_with(&mut self, dec: &EntityDec, provided: ComponentSet) -> Entity {
        let Some(owned) = self.owned_dec(dec) else {
            return Entity::NULL;
        };
        let values = fill_components(&owned, provided, &self.diagnostics);

        match self.status {
            Status::Idle => self
                .add_now(owned.index(), values)
                .map_or(Entity::NULL, Entity::Resolved),
            Status::Processing => self.deferred.stage(Tranche::new(owned, 1), values),
        }
    }

    fn add_now(&mut self, tranche_index: usize, values: Vec<Box<dyn Any + Send>>) -> Option<EntityId> {
        let tranche = self.tranches.get_mut(tranche_index)?;
        let slot = tranche.len();

        let id = if let Some(index) = self.free_list.pop() {
            self.deferred.forget_index(index);
            let row = self.lookup.get_mut(index as usize)?;
            row.generation = next_generation(row.generation);
            row.dec = Some(tranche_index);
            row.slot = slot;
            EntityId::new(index, row.generation)
        } else {
            let Ok(index) = u32::try_from(self.lookup.len()) else {
                self.diagnostics.error(EcsError::LookupExhausted);
                return None;
            };
            self.lookup.push(EntityLookup {
                dec: Some(tranche_index),
                slot,
                generation: 1,
            });
            EntityId::new(index, 1)
        };

        tranche.push(Entity::Resolved(id), values);
        Some(id)
    }

    /// Removes an entity.
    ///
    /// Idle: removed immediately. Processing: queued until the current
    /// system step ends.
    pub fn remove(&mut self, entity: Entity) {
        match self.status {
            Status::Idle => self.remove_now(entity),
            Status::Processing => self.deferred.remove(entity),
        }
    }

    fn remove_now(&mut self, entity: Entity) {
        let Some((id, tranche_index, slot)) = self.locate(entity) else {
            let rendered = entity.display(self).to_string();
            self.diagnostics.error(EcsError::RemoveMissing(rendered));
            return;
        };
        let Some(tranche) = self.tranches.get_mut(tranche_index) else {
            return;
        };
        let handle = Entity::Resolved(id);

        tranche.notify_remove(slot, handle);

        // Keep the tranche dense: the last entry moves into the hole.
        if let Some(moved) = tranche.swap_remove(slot).and_then(Entity::id) {
            if let Some(row) = self.lookup.get_mut(moved.index() as usize) {
                row.slot = slot;
            }
        }

        // Bump the generation so stale handles never match a reuse.
        if let Some(row) = self.lookup.get_mut(id.index() as usize) {
            row.dec = None;
            row.slot = 0;
            row.generation = next_generation(row.generation);
        }
        self.free_list.push(id.index());
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Runs every system of `process` in order.
    ///
    /// Deferred mutations queued by a system are applied right after its step,
    /// before the next system runs.
    pub fn process(&mut self, process: &ProcessDec) {
        if sync::active().is_some_and(|active| active != self.id) {
            self.diagnostics.warn(EcsError::ForeignEnvironmentActive);
        }
        let _scope = self.activate();

        if self.status != Status::Idle {
            self.diagnostics.error(EcsError::InvalidState {
                operation: "process",
                expected: Status::Idle.as_str(),
                actual: self.status.as_str(),
            });
        }

        if !self.registry.owns_process(process) {
            self.diagnostics
                .error(EcsError::ForeignDeclaration(process.name().to_owned()));
            return;
        }

        tracing::trace!("Processing {} on {}", process.name(), self.id);
        for system in process.order() {
            self.status = Status::Processing;
            self.run_system(system);
            self.status = Status::Idle;
            self.flush(system.name());
        }
    }

    fn run_system(&mut self, system: &SystemDec) {
        let plan = system.plan();
        for error in plan.errors() {
            self.diagnostics.error(error.clone());
        }

        let Self {
            id,
            registry,
            tranches,
            singletons,
            lookup,
            deferred,
            diagnostics,
            ..
        } = self;
        let registry: &Registry = registry;
        let lookup: &[EntityLookup] = lookup;
        let diagnostics: &Diagnostics = diagnostics;
        let environment = *id;

        let report = |result: SystemResult| {
            if let Err(source) = result {
                diagnostics.error(EcsError::SystemFailed {
                    system: system.name().to_owned(),
                    source,
                });
            }
        };

        match plan.route() {
            Route::Singletons(indices) => {
                let mut pool: Vec<Option<&mut Box<dyn Column>>> =
                    singletons.iter_mut().map(Some).collect();
                let mut slots = Vec::with_capacity(indices.len());
                for &k in indices {
                    let (Some(column), Some(dec)) =
                        (pool.get_mut(k).and_then(Option::take), registry.singletons().get(k))
                    else {
                        return;
                    };
                    slots.push(Slot::Value {
                        value: column.get_mut(0),
                        ty: dec.ty(),
                    });
                }
                let commands = Commands::new(deferred, registry, diagnostics);
                let peers = Peers::all(lookup, &tranches[..]);
                let mut args = Args::new(slots, commands, peers, environment, system.name());
                report(system.invoke(&mut args));
            }
            Route::Tranches(plans) => {
                for plan in plans {
                    if plan.tranche >= tranches.len() {
                        continue;
                    }
                    let (before, rest) = tranches.split_at_mut(plan.tranche);
                    let Some((tranche, after)) = rest.split_first_mut() else {
                        continue;
                    };
                    let peers = Peers::around(lookup, before, after);
                    let dec = Arc::clone(tranche.dec());
                    let (entries, columns) = tranche.split_mut();
                    let mut column_pool: Vec<Option<&mut Box<dyn Column>>> =
                        columns.iter_mut().map(Some).collect();
                    let mut singleton_pool: Vec<Option<&mut Box<dyn Column>>> =
                        singletons.iter_mut().map(Some).collect();

                    let mut bound = Vec::with_capacity(plan.sources.len());
                    for source in &plan.sources {
                        let next = match *source {
                            ArgSource::Singleton(k) => singleton_pool
                                .get_mut(k)
                                .and_then(Option::take)
                                .zip(registry.singletons().get(k))
                                .map(|(column, s)| Bound::Singleton(column, s.ty())),
                            ArgSource::Component(c) => column_pool
                                .get_mut(c)
                                .and_then(Option::take)
                                .zip(dec.components().get(c))
                                .map(|(column, d)| Bound::Column(column, d.ty())),
                            ArgSource::Entity => Some(Bound::Entity),
                        };
                        match next {
                            Some(next) => bound.push(next),
                            None => break,
                        }
                    }
                    if bound.len() != plan.sources.len() {
                        continue;
                    }

                    for slot in 0..entries.len() {
                        let slots = bound
                            .iter_mut()
                            .map(|b| match b {
                                Bound::Singleton(column, ty) => Slot::Value {
                                    value: column.get_mut(0),
                                    ty: *ty,
                                },
                                Bound::Column(column, ty) => Slot::Value {
                                    value: column.get_mut(slot),
                                    ty: *ty,
                                },
                                Bound::Entity => Slot::Entity(entries[slot]),
                            })
                            .collect();
                        let commands = Commands::new(&mut *deferred, registry, diagnostics);
                        let mut args = Args::new(slots, commands, peers, environment, system.name());
                        report(system.invoke(&mut args));
                    }
                }
            }
        }
    }

    /// Applies queued mutations in enqueue order.
    fn flush(&mut self, step: &str) {
        let commands = self.deferred.drain();
        if commands.is_empty() {
            return;
        }
        tracing::trace!("Applying {} deferred actions after {}", commands.len(), step);

        for command in commands {
            match command {
                Command::CreateEntity { dec, deferred } => {
                    let Some(mut staged) = self.deferred.take_staged(deferred) else {
                        continue;
                    };
                    let values = staged.pop_values();
                    if let Some(id) = self.add_now(dec.index(), values) {
                        self.deferred.set_resolved(deferred, id);
                    }
                }
                Command::RemoveEntity { entity } => self.remove_now(entity),
            }
        }

        if !self.deferred.is_empty() {
            self.diagnostics
                .error(EcsError::QueueNotDrained(step.to_owned(), self.deferred.len()));
        }
    }

    // =========================================================================
    // Record / Restore
    // =========================================================================

    /// Deep-copies the whole state.
    ///
    /// Reports an error and returns `None` while processing or while deferred
    /// actions are pending.
    #[must_use]
    pub fn record(&self) -> Option<EnvironmentRecord> {
        if self.status != Status::Idle {
            self.diagnostics.error(EcsError::InvalidState {
                operation: "record",
                expected: Status::Idle.as_str(),
                actual: self.status.as_str(),
            });
            return None;
        }
        if !self.deferred.is_empty() {
            self.diagnostics
                .error(EcsError::UnresolvedDeferred(self.deferred.len()));
            return None;
        }

        Some(EnvironmentRecord {
            tranches: self.tranches.clone(),
            lookup: self.lookup.clone(),
            free_list: self.free_list.clone(),
            singletons: self.singletons.iter().map(|c| c.clone_column()).collect(),
            singleton_index: self.registry.singleton_map().clone(),
            resolved: self.deferred.resolved().clone(),
        })
    }

    fn check_record(&self, record: &EnvironmentRecord) -> Result<(), String> {
        let entities = self.registry.entities();
        if record.tranches.len() != entities.len() {
            return Err(format!(
                "{} tranches recorded, registry declares {}",
                record.tranches.len(),
                entities.len()
            ));
        }
        for (tranche, dec) in record.tranches.iter().zip(entities) {
            if !Arc::ptr_eq(tranche.dec(), dec) || !tranche.is_dense() {
                return Err(format!("tranche `{}` does not fit", dec.name()));
            }
        }
        if record.singletons.len() != self.singletons.len()
            || &record.singleton_index != self.registry.singleton_map()
        {
            return Err("singleton table does not fit".to_owned());
        }
        for (index, row) in record.lookup.iter().enumerate() {
            if let Some(dec) = row.dec {
                let fits = record
                    .tranches
                    .get(dec)
                    .and_then(|t| t.entries().get(row.slot))
                    .and_then(|e| e.id())
                    .is_some_and(|id| id.index() as usize == index && id.generation() == row.generation);
                if !fits {
                    return Err(format!("lookup row {index} does not match its tranche"));
                }
            }
        }
        if record.resolved.values().any(|id| id.index() as usize >= record.lookup.len()) {
            return Err("deferred replacement outside the lookup table".to_owned());
        }
        Ok(())
    }

    /// Rebuilds an environment from a record, under a fresh instance id.
    ///
    /// A record that does not fit `registry` is reported and an empty
    /// environment is returned.
    #[must_use]
    pub fn restore(registry: Arc<Registry>, config: EnvironmentConfig, record: EnvironmentRecord) -> Self {
        let mut env = Self::with_config(registry, config);
        if let Err(reason) = env.check_record(&record) {
            env.diagnostics.error(EcsError::RecordMismatch(reason));
            return env;
        }

        env.tranches = record.tranches;
        env.lookup = record.lookup;
        env.free_list = record.free_list;
        env.singletons = record.singletons;
        env.deferred = DeferredQueue::with_resolved(record.resolved);
        tracing::debug!("Environment {} restored with {} entities", env.id, env.len());
        env
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("tranches", &self.tranches)
            .field("singletons", &self.singletons.len())
            .field("free_list", &self.free_list.len())
            .field("pending", &self.deferred.len())
            .finish()
    }
}
