//! # Entity Handles
//!
//! Entities are lightweight, copyable handles consisting of either:
//! - A resolved [`EntityId`]: an index into the lookup table plus a
//!   generation counter for safe reuse
//! - A [`DeferredId`]: a token for an entity created during a dispatch pass,
//!   which becomes a resolved id once the pass flushes
//!
//! Every accessor takes the [`Environment`] explicitly and collapses a
//! deferred handle into its resolved form before looking anything up.

use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::declaration::{ComponentDec, ComponentMatch, EntityDec};
use super::world::Environment;
use crate::error::EcsError;

/// Unique identifier for a live entity allocation.
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index into the entity lookup table
/// - Upper 32 bits: Generation counter for detecting stale references
///
/// Generations start at 1, so the all-zero value never names a real entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new entity ID from index and generation.
    ///
    /// # Arguments
    ///
    /// * `index` - The index into the lookup table (0 to 2^32-1)
    /// * `generation` - The generation counter (1 to 2^32-1 for real entities)
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the entity ID.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Null/invalid entity ID.
    pub const NULL: Self = Self(0);

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.index(), self.generation())
    }
}

/// Next generation for a recycled index. Zero is reserved for the null handle.
#[inline]
#[must_use]
pub(crate) const fn next_generation(generation: u32) -> u32 {
    match generation.wrapping_add(1) {
        0 => 1,
        next => next,
    }
}

static NEXT_DEFERRED: AtomicU64 = AtomicU64::new(1);

/// Token for an entity whose creation is pending.
///
/// Unique across all environments in the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeferredId(u64);

impl DeferredId {
    pub(crate) fn next() -> Self {
        Self(NEXT_DEFERRED.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw token value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Diagnostic state of a handle relative to one environment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityStatus {
    /// The null handle.
    Null,
    /// A deferred handle this environment knows nothing about.
    EnvironmentUnavailable,
    /// Creation is pending until the current system step ends.
    Deferred,
    /// The entity was removed, or the handle is stale.
    Deleted,
    /// A live entity.
    Active,
}

/// Handle to an entity.
///
/// Equality and hashing compare the raw handle: two resolved handles are equal
/// iff their ids and generations match, two deferred handles iff they share a
/// token. Call [`Entity::resolve`] or [`Environment::resolve`] before comparing
/// a handle kept from a dispatch pass against one obtained afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Entity {
    /// An allocated entity.
    Resolved(EntityId),
    /// An entity created mid-pass.
    Deferred(DeferredId),
}

impl Default for Entity {
    fn default() -> Self {
        Self::NULL
    }
}

impl From<EntityId> for Entity {
    fn from(id: EntityId) -> Self {
        Self::Resolved(id)
    }
}

impl Entity {
    /// The null handle. Never valid.
    pub const NULL: Self = Self::Resolved(EntityId::NULL);

    /// Checks if this is the null handle.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        matches!(self, Self::Resolved(id) if id.is_null())
    }

    /// Raw id, without consulting any environment.
    #[inline]
    #[must_use]
    pub const fn id(self) -> Option<EntityId> {
        match self {
            Self::Resolved(id) => Some(id),
            Self::Deferred(_) => None,
        }
    }

    /// Collapses a deferred handle into its resolved form, if creation has completed.
    pub fn resolve(&mut self, env: &Environment) {
        *self = env.resolve(*self);
    }

    /// Checks whether the handle refers to a live (or staged) entity.
    #[must_use]
    pub fn is_valid(self, env: &Environment) -> bool {
        env.place(self).is_some()
    }

    /// Checks whether the entity has a component assignable to `T`.
    #[must_use]
    pub fn has_component<T: ?Sized + 'static>(self, env: &Environment) -> bool {
        env.place(self).is_some_and(|(tranche, _)| {
            !matches!(tranche.dec().find(TypeId::of::<T>()), ComponentMatch::Missing)
        })
    }

    /// Checks whether the entity has a component assignable to `dec`'s type.
    #[must_use]
    pub fn has_component_dec(self, env: &Environment, dec: &ComponentDec) -> bool {
        env.place(self).is_some_and(|(tranche, _)| {
            !matches!(tranche.dec().find(dec.ty().type_id()), ComponentMatch::Missing)
        })
    }

    fn column_for<T: ?Sized + 'static>(self, env: &Environment, strict: bool) -> Option<usize> {
        let Some((tranche, _)) = env.place(self) else {
            if strict {
                env.diagnostics()
                    .error(EcsError::DeadEntity(self.display(env).to_string()));
            }
            return None;
        };

        match tranche.dec().find(TypeId::of::<T>()) {
            ComponentMatch::Found(column) => Some(column),
            ComponentMatch::Missing => {
                if strict {
                    env.diagnostics().error(EcsError::MissingComponent {
                        entity: self.display(env).to_string(),
                        component: std::any::type_name::<T>(),
                    });
                }
                None
            }
            ComponentMatch::Ambiguous => {
                if strict {
                    env.diagnostics().error(EcsError::AmbiguousComponent {
                        entity: self.display(env).to_string(),
                        component: std::any::type_name::<T>(),
                    });
                }
                None
            }
        }
    }

    fn lookup<T: ?Sized + 'static>(self, env: &Environment, strict: bool) -> Option<&T> {
        let column = self.column_for::<T>(env, strict)?;
        let (tranche, slot) = env.place(self)?;
        tranche.view::<T>(column, slot)
    }

    fn lookup_mut<T: ?Sized + 'static>(self, env: &mut Environment, strict: bool) -> Option<&mut T> {
        let column = self.column_for::<T>(env, strict)?;
        let (tranche, slot) = env.place_mut(self)?;
        tranche.view_mut::<T>(column, slot)
    }

    /// Strict component access.
    ///
    /// Reports an error and returns `None` if the entity is dead or has no
    /// single component assignable to `T`.
    #[must_use]
    pub fn component<T: ?Sized + 'static>(self, env: &Environment) -> Option<&T> {
        self.lookup(env, true)
    }

    /// Strict mutable component access. See [`Entity::component`].
    pub fn component_mut<T: ?Sized + 'static>(self, env: &mut Environment) -> Option<&mut T> {
        self.lookup_mut(env, true)
    }

    /// Lenient component access. Returns `None` silently.
    #[must_use]
    pub fn try_component<T: ?Sized + 'static>(self, env: &Environment) -> Option<&T> {
        self.lookup(env, false)
    }

    /// Lenient mutable component access. Returns `None` silently.
    pub fn try_component_mut<T: ?Sized + 'static>(self, env: &mut Environment) -> Option<&mut T> {
        self.lookup_mut(env, false)
    }

    /// Declaration of the entity, if it is live or staged.
    #[must_use]
    pub fn entity_dec(self, env: &Environment) -> Option<Arc<EntityDec>> {
        env.place(self).map(|(tranche, _)| Arc::clone(tranche.dec()))
    }

    /// Resolved identifier, for hashing and logging.
    ///
    /// `None` while creation is still pending.
    #[must_use]
    pub fn identifier(self, env: &Environment) -> Option<EntityId> {
        env.resolve(self).id()
    }

    /// Current state of the handle in `env`.
    #[must_use]
    pub fn status(self, env: &Environment) -> EntityStatus {
        if self.is_null() {
            return EntityStatus::Null;
        }

        match env.resolve(self) {
            Self::Deferred(token) if env.is_staged(token) => EntityStatus::Deferred,
            Self::Deferred(_) => EntityStatus::EnvironmentUnavailable,
            resolved if env.place(resolved).is_some() => EntityStatus::Active,
            _ => EntityStatus::Deleted,
        }
    }

    /// Diagnostic rendering against `env`, including the environment's
    /// formatter hook if one is set.
    #[must_use]
    pub fn display(self, env: &Environment) -> EntityDisplay<'_> {
        EntityDisplay { entity: self, env }
    }
}

/// Renders without an environment: only the null handle is recognizable.
impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("[Entity:Null]")
        } else {
            f.write_str("[Entity:EnvUnavailable]")
        }
    }
}

/// See [`Entity::display`].
pub struct EntityDisplay<'a> {
    entity: Entity,
    env: &'a Environment,
}

impl fmt::Display for EntityDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.entity.status(self.env);
        if status == EntityStatus::Null {
            return f.write_str("[Entity:Null]");
        }

        let suffix = self
            .env
            .entity_formatter()
            .map(|hook| format!(":{}", hook(self.env, self.entity)))
            .unwrap_or_default();
        let name = self
            .entity
            .entity_dec(self.env)
            .map(|dec| dec.name().to_owned())
            .unwrap_or_default();

        match (status, self.env.resolve(self.entity)) {
            (EntityStatus::Deferred, Entity::Deferred(token)) => {
                write!(f, "[Entity:{name}:Deferred:{}{suffix}]", token.get())
            }
            (EntityStatus::Active, Entity::Resolved(id)) => {
                write!(f, "[Entity:{name}:{}:{}{suffix}]", id.index(), id.generation())
            }
            (EntityStatus::Deleted, _) => write!(f, "[Entity:Deleted{suffix}]"),
            _ => write!(f, "[Entity:EnvUnavailable{suffix}]"),
        }
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Resolved(id) => (id.index(), id.generation()).serialize(serializer),
            Self::Deferred(_) => Err(serde::ser::Error::custom(EcsError::SerializeDeferred)),
        }
    }
}

impl<'de> Deserialize<'de> for Entity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (index, generation) = <(u32, u32)>::deserialize(deserializer)?;
        Ok(Self::Resolved(EntityId::new(index, generation)))
    }
}

// =============================================================================
// ComponentRef
// =============================================================================

/// Weak reference to one component of an entity.
///
/// Forwards to the entity's accessors with the same strict/lenient split.
pub struct ComponentRef<T: ?Sized> {
    entity: Entity,
    _marker: PhantomData<fn() -> *const T>,
}

impl<T: ?Sized + 'static> ComponentRef<T> {
    /// Wraps a handle.
    #[inline]
    #[must_use]
    pub const fn new(entity: Entity) -> Self {
        Self {
            entity,
            _marker: PhantomData,
        }
    }

    /// The underlying handle.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> Entity {
        self.entity
    }

    /// Checks that the entity is live and has a `T`.
    #[must_use]
    pub fn is_valid(&self, env: &Environment) -> bool {
        self.entity.has_component::<T>(env)
    }

    /// Strict access.
    #[must_use]
    pub fn get<'e>(&self, env: &'e Environment) -> Option<&'e T> {
        self.entity.component::<T>(env)
    }

    /// Strict mutable access.
    pub fn get_mut<'e>(&self, env: &'e mut Environment) -> Option<&'e mut T> {
        self.entity.component_mut::<T>(env)
    }

    /// Lenient access.
    #[must_use]
    pub fn try_get<'e>(&self, env: &'e Environment) -> Option<&'e T> {
        self.entity.try_component::<T>(env)
    }

    /// Lenient mutable access.
    pub fn try_get_mut<'e>(&self, env: &'e mut Environment) -> Option<&'e mut T> {
        self.entity.try_component_mut::<T>(env)
    }
}

impl<T: ?Sized> Clone for ComponentRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ComponentRef<T> {}

impl<T: ?Sized> PartialEq for ComponentRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.entity == other.entity
    }
}

impl<T: ?Sized> Eq for ComponentRef<T> {}

impl<T: ?Sized> std::hash::Hash for ComponentRef<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.entity.hash(state);
    }
}

impl<T: ?Sized> fmt::Debug for ComponentRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentRef").field(&self.entity).finish()
    }
}

impl<T: ?Sized> Default for ComponentRef<T> {
    fn default() -> Self {
        Self {
            entity: Entity::NULL,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> From<Entity> for ComponentRef<T> {
    fn from(entity: Entity) -> Self {
        Self {
            entity,
            _marker: PhantomData,
        }
    }
}
