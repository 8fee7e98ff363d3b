//! # Deferred Mutation
//!
//! While a system step runs, entity creation and removal are recorded as
//! [`Command`]s and applied in enqueue order once the step ends.
//!
//! A created entity is staged immediately in a one-entry tranche so the
//! system can read and write its components before it exists for real.

use std::collections::HashMap;
use std::sync::Arc;

use super::component::ComponentSet;
use super::declaration::{ComponentMatch, EntityDec, Registry};
use super::entity::{DeferredId, Entity, EntityId};
use super::tranche::{fill_components, Tranche};
use crate::diagnostics::Diagnostics;
use crate::error::EcsError;

/// A queued mutation.
#[derive(Clone, Debug)]
pub enum Command {
    /// Create the staged entity for real.
    CreateEntity {
        /// Declaration of the new entity.
        dec: Arc<EntityDec>,
        /// Token of the staging record.
        deferred: DeferredId,
    },

    /// Remove an entity.
    RemoveEntity {
        /// Handle to remove; may be deferred.
        entity: Entity,
    },
}

/// Pending commands plus staging records.
///
/// `resolved` keeps at most one replacement per lookup index: when an index
/// is handed out again, the token that pointed at its previous allocation
/// is forgotten.
#[derive(Debug, Default)]
pub(crate) struct DeferredQueue {
    commands: Vec<Command>,
    staged: HashMap<DeferredId, Tranche>,
    resolved: HashMap<DeferredId, EntityId>,
    origins: HashMap<u32, DeferredId>,
}

impl DeferredQueue {
    /// Stages a new entity and queues its creation.
    pub(crate) fn stage(
        &mut self,
        mut tranche: Tranche,
        values: Vec<Box<dyn std::any::Any + Send>>,
    ) -> Entity {
        let token = DeferredId::next();
        let entity = Entity::Deferred(token);
        tranche.push(entity, values);
        self.commands.push(Command::CreateEntity {
            dec: Arc::clone(tranche.dec()),
            deferred: token,
        });
        self.staged.insert(token, tranche);
        entity
    }

    pub(crate) fn remove(&mut self, entity: Entity) {
        self.commands.push(Command::RemoveEntity { entity });
    }

    pub(crate) fn len(&self) -> usize {
        self.commands.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub(crate) fn drain(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub(crate) fn take_staged(&mut self, token: DeferredId) -> Option<Tranche> {
        self.staged.remove(&token)
    }

    pub(crate) fn staged(&self, token: DeferredId) -> Option<&Tranche> {
        self.staged.get(&token)
    }

    pub(crate) fn staged_mut(&mut self, token: DeferredId) -> Option<&mut Tranche> {
        self.staged.get_mut(&token)
    }

    pub(crate) fn is_staged(&self, token: DeferredId) -> bool {
        self.staged.contains_key(&token)
    }

    /// Rebuilds the replacement table of a recorded environment.
    pub(crate) fn with_resolved(resolved: HashMap<DeferredId, EntityId>) -> Self {
        let origins = resolved.iter().map(|(token, id)| (id.index(), *token)).collect();
        Self {
            resolved,
            origins,
            ..Self::default()
        }
    }

    pub(crate) fn set_resolved(&mut self, token: DeferredId, id: EntityId) {
        self.forget_index(id.index());
        self.origins.insert(id.index(), token);
        self.resolved.insert(token, id);
    }

    /// Drops the replacement pointing at `index`, which is being reused.
    pub(crate) fn forget_index(&mut self, index: u32) {
        if let Some(token) = self.origins.remove(&index) {
            self.resolved.remove(&token);
        }
    }

    pub(crate) fn resolved(&self) -> &HashMap<DeferredId, EntityId> {
        &self.resolved
    }

    /// Replacement handle of a deferred entity whose creation completed.
    pub(crate) fn resolve(&self, entity: Entity) -> Entity {
        match entity {
            Entity::Deferred(token) => self
                .resolved
                .get(&token)
                .map_or(entity, |id| Entity::Resolved(*id)),
            resolved @ Entity::Resolved(_) => resolved,
        }
    }
}

/// Deferred add/remove available to a running system.
pub struct Commands<'a> {
    queue: &'a mut DeferredQueue,
    registry: &'a Registry,
    diagnostics: &'a Diagnostics,
}

impl<'a> Commands<'a> {
    pub(crate) fn new(
        queue: &'a mut DeferredQueue,
        registry: &'a Registry,
        diagnostics: &'a Diagnostics,
    ) -> Self {
        Self {
            queue,
            registry,
            diagnostics,
        }
    }

    /// Stages a new entity with default components.
    ///
    /// # Returns
    ///
    /// A deferred handle, or the null handle if `dec` is foreign.
    pub fn add(&mut self, dec: &EntityDec) -> Entity {
        self.add_with(dec, ComponentSet::new())
    }

    /// Stages a new entity with provided components.
    pub fn add_with(&mut self, dec: &EntityDec, provided: ComponentSet) -> Entity {
        let Some(owned) = self
            .registry
            .entities()
            .get(dec.index())
            .filter(|own| std::ptr::eq(own.as_ref(), dec))
        else {
            self.diagnostics
                .error(EcsError::ForeignDeclaration(dec.name().to_owned()));
            return Entity::NULL;
        };

        let values = fill_components(dec, provided, self.diagnostics);
        self.queue.stage(Tranche::new(Arc::clone(owned), 1), values)
    }

    /// Queues removal of `entity`.
    pub fn remove(&mut self, entity: Entity) {
        self.queue.remove(entity);
    }

    fn staged_column<T: ?Sized + 'static>(&self, entity: Entity) -> Option<(DeferredId, usize)> {
        let Entity::Deferred(token) = entity else {
            return None;
        };
        let tranche = self.queue.staged(token)?;
        match tranche.dec().find(std::any::TypeId::of::<T>()) {
            ComponentMatch::Found(column) => Some((token, column)),
            _ => None,
        }
    }

    /// Reads a component of an entity staged during this step.
    #[must_use]
    pub fn component<T: ?Sized + 'static>(&self, entity: Entity) -> Option<&T> {
        let (token, column) = self.staged_column::<T>(entity)?;
        self.queue.staged(token)?.view::<T>(column, 0)
    }

    /// Writes a component of an entity staged during this step.
    pub fn component_mut<T: ?Sized + 'static>(&mut self, entity: Entity) -> Option<&mut T> {
        let (token, column) = self.staged_column::<T>(entity)?;
        self.queue.staged_mut(token)?.view_mut::<T>(column, 0)
    }

    /// Current form of a handle, resolved if its creation completed.
    pub(crate) fn resolve(&self, entity: Entity) -> Entity {
        self.queue.resolve(entity)
    }

    pub(crate) fn diagnostics(&self) -> &'a Diagnostics {
        self.diagnostics
    }

    /// Registry the environment was built from.
    #[must_use]
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// Number of queued commands.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
