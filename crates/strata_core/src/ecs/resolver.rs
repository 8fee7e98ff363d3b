//! # System Resolver
//!
//! Maps each system parameter onto a singleton, a tranche column, or the
//! current entity handle. Plans are computed once, when the registry is
//! built; dispatch only substitutes per-entity arguments.
//!
//! ## Algorithm
//!
//! 1. Collect, per parameter, every component declaration assignable to it.
//! 2. If every parameter has exactly one candidate and all candidates are
//!    singletons, the system runs once per pass with those singletons.
//! 3. Otherwise each tranche builds a pool of `[singletons] ++ [its columns]
//!    ++ [Entity]`. A tranche matches when every parameter has exactly one
//!    candidate in that pool; the system then runs once per entry.
//! 4. Ambiguity skips the tranche and is reported. No match at all is
//!    reported. Both are reported again on every pass.

use std::any::{Any, TypeId};
use std::sync::Arc;

use super::commands::Commands;
use super::component::{ComponentType, ParamType};
use super::declaration::{ComponentDec, ComponentMatch, EntityDec, SystemDec};
use super::entity::Entity;
use super::tranche::Tranche;
use super::world::EntityLookup;
use crate::error::{EcsError, SystemError};
use crate::sync::EnvironmentId;

/// Where one argument comes from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArgSource {
    /// Index into the singleton table.
    Singleton(usize),
    /// Column index within the tranche.
    Component(usize),
    /// The entity being visited.
    Entity,
}

/// Argument sources for one matching tranche.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TranchePlan {
    pub(crate) tranche: usize,
    pub(crate) sources: Vec<ArgSource>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Route {
    /// Run once with these singleton indices.
    Singletons(Vec<usize>),
    /// Run per entity of each listed tranche.
    Tranches(Vec<TranchePlan>),
}

/// Cached dispatch plan of one system.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemPlan {
    route: Route,
    errors: Vec<EcsError>,
}

impl Default for SystemPlan {
    fn default() -> Self {
        Self {
            route: Route::Tranches(Vec::new()),
            errors: Vec::new(),
        }
    }
}

fn describe(params: &[ParamType], candidates: &[Vec<&'static str>]) -> String {
    params
        .iter()
        .zip(candidates)
        .filter(|(_, names)| names.len() > 1)
        .map(|(param, names)| format!("{} matches [{}]", param.type_name(), names.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// First pair of parameters sharing a mutable source.
fn find_alias(sources: &[ArgSource]) -> Option<(usize, usize)> {
    for (first, a) in sources.iter().enumerate() {
        if *a == ArgSource::Entity {
            continue;
        }
        if let Some(offset) = sources[first + 1..].iter().position(|b| b == a) {
            return Some((first, first + 1 + offset));
        }
    }
    None
}

impl SystemPlan {
    pub(crate) fn build(
        system: &SystemDec,
        components: &[Arc<ComponentDec>],
        singletons: &[Arc<ComponentDec>],
        entities: &[Arc<EntityDec>],
    ) -> Self {
        let params = system.params();
        let mut errors = Vec::new();

        // Singleton scan, over every declared component.
        let direct: Vec<Vec<&Arc<ComponentDec>>> = params
            .iter()
            .map(|param| {
                components
                    .iter()
                    .filter(|c| c.ty().is_assignable_to(param.id()))
                    .collect()
            })
            .collect();

        if direct
            .iter()
            .all(|matches| matches.len() == 1 && matches[0].is_singleton())
        {
            let indices: Vec<usize> = direct
                .iter()
                .filter_map(|matches| singletons.iter().position(|s| Arc::ptr_eq(s, matches[0])))
                .collect();
            let sources: Vec<ArgSource> = indices.iter().map(|&k| ArgSource::Singleton(k)).collect();
            if let Some((first, second)) = find_alias(&sources) {
                errors.push(EcsError::AliasedParameter {
                    system: system.name().to_owned(),
                    first,
                    second,
                    source_name: direct[first][0].name().to_owned(),
                });
                return Self {
                    route: Route::Tranches(Vec::new()),
                    errors,
                };
            }
            return Self {
                route: Route::Singletons(indices),
                errors,
            };
        }

        let some_param_excludes_singletons = direct
            .iter()
            .any(|matches| matches.iter().all(|c| !c.is_singleton()));
        if !some_param_excludes_singletons && direct.iter().any(|matches| matches.len() > 1) {
            let names: Vec<Vec<&'static str>> = direct
                .iter()
                .map(|matches| matches.iter().map(|c| c.ty().type_name()).collect())
                .collect();
            errors.push(EcsError::AmbiguousSingletonScan {
                system: system.name().to_owned(),
                detail: describe(params, &names),
            });
        }

        // Tranche scan.
        let mut tranches = Vec::new();
        for dec in entities {
            let candidates: Vec<Vec<(ArgSource, &'static str)>> = params
                .iter()
                .map(|param| {
                    let mut found: Vec<(ArgSource, &'static str)> = singletons
                        .iter()
                        .enumerate()
                        .filter(|(_, s)| s.ty().is_assignable_to(param.id()))
                        .map(|(k, s)| (ArgSource::Singleton(k), s.ty().type_name()))
                        .collect();
                    found.extend(
                        dec.components()
                            .iter()
                            .enumerate()
                            .filter(|(_, c)| c.ty().is_assignable_to(param.id()))
                            .map(|(c, comp)| (ArgSource::Component(c), comp.ty().type_name())),
                    );
                    if param.is_entity() {
                        found.push((ArgSource::Entity, std::any::type_name::<Entity>()));
                    }
                    found
                })
                .collect();

            if candidates.iter().all(|found| found.len() == 1) {
                let sources: Vec<ArgSource> = candidates.iter().map(|found| found[0].0).collect();
                if let Some((first, second)) = find_alias(&sources) {
                    errors.push(EcsError::AliasedParameter {
                        system: system.name().to_owned(),
                        first,
                        second,
                        source_name: candidates[first][0].1.to_owned(),
                    });
                    continue;
                }
                tranches.push(TranchePlan {
                    tranche: dec.index(),
                    sources,
                });
            } else if candidates.iter().any(|found| found.len() > 1) {
                let names: Vec<Vec<&'static str>> = candidates
                    .iter()
                    .map(|found| found.iter().map(|(_, name)| *name).collect())
                    .collect();
                errors.push(EcsError::AmbiguousTrancheScan {
                    system: system.name().to_owned(),
                    entity: dec.name().to_owned(),
                    detail: describe(params, &names),
                });
            }
        }

        if tranches.is_empty() {
            errors.push(EcsError::NoMatchingTranche(system.name().to_owned()));
        }

        Self {
            route: Route::Tranches(tranches),
            errors,
        }
    }

    pub(crate) fn route(&self) -> &Route {
        &self.route
    }

    /// Resolution errors, reported on every pass.
    #[must_use]
    pub fn errors(&self) -> &[EcsError] {
        &self.errors
    }

    /// Whether the system runs once per pass on singletons alone.
    #[must_use]
    pub fn is_singleton_only(&self) -> bool {
        matches!(self.route, Route::Singletons(_))
    }

    /// Indices of the tranches the system visits.
    #[must_use]
    pub fn tranches(&self) -> Vec<usize> {
        match &self.route {
            Route::Singletons(_) => Vec::new(),
            Route::Tranches(plans) => plans.iter().map(|p| p.tranche).collect(),
        }
    }
}

// =============================================================================
// Args
// =============================================================================

pub(crate) enum Slot<'a> {
    Value {
        value: Option<&'a mut dyn Any>,
        ty: &'a ComponentType,
    },
    Entity(Entity),
}

/// Shared view of the tranches a running system does not hold mutably.
#[derive(Clone, Copy)]
pub(crate) struct Peers<'a> {
    lookup: &'a [EntityLookup],
    before: &'a [Tranche],
    after: &'a [Tranche],
    visiting: Option<usize>,
}

impl<'a> Peers<'a> {
    /// Every tranche is readable.
    pub(crate) fn all(lookup: &'a [EntityLookup], tranches: &'a [Tranche]) -> Self {
        Self {
            lookup,
            before: tranches,
            after: &[],
            visiting: None,
        }
    }

    /// Everything but the tranche between `before` and `after`.
    pub(crate) fn around(
        lookup: &'a [EntityLookup],
        before: &'a [Tranche],
        after: &'a [Tranche],
    ) -> Self {
        Self {
            lookup,
            before,
            after,
            visiting: Some(before.len()),
        }
    }

    fn tranche(&self, index: usize) -> Option<&'a Tranche> {
        match self.visiting {
            Some(visiting) if index == visiting => None,
            Some(visiting) if index > visiting => self.after.get(index - visiting - 1),
            _ => self.before.get(index),
        }
    }
}

fn render(entity: Entity) -> String {
    match entity.id() {
        Some(id) => id.to_string(),
        None => format!("{entity:?}"),
    }
}

/// Arguments of one system invocation.
///
/// Parameter `i` is fetched with [`Args::take`] (components and singletons)
/// or [`Args::entity`]. Deferred creation and removal go through
/// [`Args::commands`]. Other entities are read with [`Args::component`].
pub struct Args<'a> {
    slots: Vec<Slot<'a>>,
    commands: Commands<'a>,
    peers: Peers<'a>,
    environment: EnvironmentId,
    system: &'a str,
}

impl<'a> Args<'a> {
    pub(crate) fn new(
        slots: Vec<Slot<'a>>,
        commands: Commands<'a>,
        peers: Peers<'a>,
        environment: EnvironmentId,
        system: &'a str,
    ) -> Self {
        Self {
            slots,
            commands,
            peers,
            environment,
            system,
        }
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the system takes no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Hands out parameter `index` as `T`.
    ///
    /// Each value parameter can be taken once per invocation, which lets a
    /// system hold all of its parameters at the same time.
    ///
    /// # Errors
    ///
    /// [`SystemError::ParameterType`] if the resolved value is not assignable
    /// to `T`, [`SystemError::ParameterTaken`] if it was already taken or the
    /// parameter is the entity handle.
    pub fn take<T: ?Sized + 'static>(&mut self, index: usize) -> Result<&'a mut T, SystemError> {
        let Some(Slot::Value { value, ty }) = self.slots.get_mut(index) else {
            return Err(SystemError::ParameterTaken { index });
        };
        let ty: &'a ComponentType = *ty;
        let expected = std::any::type_name::<T>();
        if !ty.is_assignable_to(TypeId::of::<T>()) {
            return Err(SystemError::ParameterType { index, expected });
        }
        let value = value.take().ok_or(SystemError::ParameterTaken { index })?;
        ty.view_mut::<T>(value)
            .ok_or(SystemError::ParameterType { index, expected })
    }

    /// Handle of the entity being visited, for an [`Entity`] parameter.
    ///
    /// # Errors
    ///
    /// [`SystemError::ParameterType`] if parameter `index` is not the entity.
    pub fn entity(&self, index: usize) -> Result<Entity, SystemError> {
        match self.slots.get(index) {
            Some(Slot::Entity(entity)) => Ok(*entity),
            _ => Err(SystemError::ParameterType {
                index,
                expected: std::any::type_name::<Entity>(),
            }),
        }
    }

    /// Strict read of another entity's component.
    ///
    /// Reaches live entities outside the tranche being visited and entities
    /// staged during this step. Entities of the visited tranche are only
    /// reachable through the parameters. Reports an error and returns `None`
    /// if the entity is dead, lacks a single `T`, or is in the visited
    /// tranche.
    #[must_use]
    pub fn component<T: ?Sized + 'static>(&self, entity: Entity) -> Option<&T> {
        self.peer(entity, true)
    }

    /// Lenient read of another entity's component. Returns `None` silently.
    #[must_use]
    pub fn try_component<T: ?Sized + 'static>(&self, entity: Entity) -> Option<&T> {
        self.peer(entity, false)
    }

    fn peer<T: ?Sized + 'static>(&self, entity: Entity, strict: bool) -> Option<&T> {
        let report = |error: EcsError| {
            if strict {
                self.commands.diagnostics().error(error);
            }
        };

        let entity = self.commands.resolve(entity);
        let Entity::Resolved(id) = entity else {
            let staged = self.commands.component::<T>(entity);
            if staged.is_none() {
                report(EcsError::DeadEntity(render(entity)));
            }
            return staged;
        };

        let Some((dec, slot)) = self
            .peers
            .lookup
            .get(id.index() as usize)
            .filter(|row| !id.is_null() && row.generation() == id.generation())
            .and_then(|row| Some((row.dec()?, row.slot())))
        else {
            report(EcsError::DeadEntity(render(entity)));
            return None;
        };
        let Some(tranche) = self.peers.tranche(dec) else {
            report(EcsError::EntityInUse(render(entity)));
            return None;
        };

        match tranche.dec().find(TypeId::of::<T>()) {
            ComponentMatch::Found(column) => tranche.view::<T>(column, slot),
            ComponentMatch::Missing => {
                report(EcsError::MissingComponent {
                    entity: render(entity),
                    component: std::any::type_name::<T>(),
                });
                None
            }
            ComponentMatch::Ambiguous => {
                report(EcsError::AmbiguousComponent {
                    entity: render(entity),
                    component: std::any::type_name::<T>(),
                });
                None
            }
        }
    }

    /// Deferred mutation queue for this step.
    pub fn commands(&mut self) -> &mut Commands<'a> {
        &mut self.commands
    }

    /// Environment being processed.
    #[must_use]
    pub fn environment(&self) -> EnvironmentId {
        self.environment
    }

    /// Name of the running system.
    #[must_use]
    pub fn system(&self) -> &str {
        self.system
    }
}
