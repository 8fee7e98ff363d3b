//! # Component Types
//!
//! Components are plain data attached to entities. Each runtime type is
//! described once by a [`ComponentType`]: how to construct, store, clone and
//! notify it, and which parameter types it can be viewed as.
//!
//! Assignability is explicit. A component is assignable to its own type and
//! to every view registered on its builder, typically a `dyn Trait`:
//!
//! ```rust,ignore
//! trait Named { fn name(&self) -> &str; }
//!
//! let ty = ComponentType::builder::<Label>()
//!     .view::<dyn Named>(|c| c, |c| c)
//!     .build();
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use super::entity::Entity;
use super::storage::{Column, ComponentStorage};

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Clone`: Snapshots deep-copy storage
/// - `Default`: Missing values are default-constructed
/// - `Send`: Environments may move between threads between passes
pub trait Component: Any + Clone + Default + Send {}

impl<T: Any + Clone + Default + Send> Component for T {}

/// Removal notification.
///
/// Registered with [`ComponentTypeBuilder::on_remove`]; fired once per
/// component per removal, in declaration order, before storage is compacted.
pub trait OnRemove {
    /// Called with the handle of the entity being removed.
    fn on_remove(&mut self, entity: Entity);
}

// =============================================================================
// Views
// =============================================================================

trait View<U: ?Sized>: Send + Sync {
    fn view<'a>(&self, value: &'a dyn Any) -> Option<&'a U>;
    fn view_mut<'a>(&self, value: &'a mut dyn Any) -> Option<&'a mut U>;
}

struct FnView<T, U: ?Sized> {
    by_ref: fn(&T) -> &U,
    by_mut: fn(&mut T) -> &mut U,
}

impl<T: 'static, U: ?Sized + 'static> View<U> for FnView<T, U> {
    fn view<'a>(&self, value: &'a dyn Any) -> Option<&'a U> {
        value.downcast_ref::<T>().map(self.by_ref)
    }

    fn view_mut<'a>(&self, value: &'a mut dyn Any) -> Option<&'a mut U> {
        value.downcast_mut::<T>().map(self.by_mut)
    }
}

struct ViewEntry {
    name: &'static str,
    // Box<Box<dyn View<U>>>, keyed by TypeId::of::<U>()
    caster: Box<dyn Any + Send + Sync>,
}

fn identity<T>(value: &T) -> &T {
    value
}

fn identity_mut<T>(value: &mut T) -> &mut T {
    value
}

fn new_column<T: Component>(capacity: usize) -> Box<dyn Column> {
    Box::new(ComponentStorage::<T>::with_capacity(capacity))
}

fn new_value<T: Component>() -> Box<dyn Any + Send> {
    Box::new(T::default())
}

fn clone_value<T: Component>(value: &dyn Any) -> Option<Box<dyn Any + Send>> {
    value
        .downcast_ref::<T>()
        .map(|v| Box::new(v.clone()) as Box<dyn Any + Send>)
}

fn notify_remove<T: OnRemove + 'static>(value: &mut dyn Any, entity: Entity) {
    if let Some(component) = value.downcast_mut::<T>() {
        component.on_remove(entity);
    }
}

// =============================================================================
// ComponentType
// =============================================================================

/// Runtime description of one component type.
pub struct ComponentType {
    type_id: TypeId,
    type_name: &'static str,
    new_column: fn(usize) -> Box<dyn Column>,
    new_value: fn() -> Box<dyn Any + Send>,
    clone_value: fn(&dyn Any) -> Option<Box<dyn Any + Send>>,
    on_remove: Option<fn(&mut dyn Any, Entity)>,
    views: HashMap<TypeId, ViewEntry>,
}

impl ComponentType {
    /// Describes `T` with no views beyond itself and no removal hook.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::builder::<T>().build()
    }

    /// Starts describing `T`.
    #[must_use]
    pub fn builder<T: Component>() -> ComponentTypeBuilder<T> {
        ComponentTypeBuilder {
            ty: Self {
                type_id: TypeId::of::<T>(),
                type_name: std::any::type_name::<T>(),
                new_column: new_column::<T>,
                new_value: new_value::<T>,
                clone_value: clone_value::<T>,
                on_remove: None,
                views: HashMap::new(),
            },
            _marker: std::marker::PhantomData,
        }
        .view::<T>(identity::<T>, identity_mut::<T>)
    }

    /// The concrete runtime type.
    #[inline]
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The concrete type's name.
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Checks whether this is exactly `T`.
    #[inline]
    #[must_use]
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Checks whether values of this type can be handed out as `param`.
    #[inline]
    #[must_use]
    pub fn is_assignable_to(&self, param: TypeId) -> bool {
        self.views.contains_key(&param)
    }

    /// Names of every type this component is assignable to.
    pub fn view_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.views.values().map(|entry| entry.name)
    }

    /// Checks whether a removal hook is registered.
    #[inline]
    #[must_use]
    pub fn has_on_remove(&self) -> bool {
        self.on_remove.is_some()
    }

    fn caster<U: ?Sized + 'static>(&self) -> Option<&dyn View<U>> {
        self.views
            .get(&TypeId::of::<U>())
            .and_then(|entry| entry.caster.downcast_ref::<Box<dyn View<U>>>())
            .map(|caster| &**caster)
    }

    /// Views a stored value as `U`.
    ///
    /// # Returns
    ///
    /// `None` if the value is not of this type or `U` is not a registered view.
    #[must_use]
    pub fn view<'a, U: ?Sized + 'static>(&self, value: &'a dyn Any) -> Option<&'a U> {
        self.caster::<U>()?.view(value)
    }

    /// Views a stored value mutably as `U`.
    pub fn view_mut<'a, U: ?Sized + 'static>(&self, value: &'a mut dyn Any) -> Option<&'a mut U> {
        self.caster::<U>()?.view_mut(value)
    }

    pub(crate) fn new_column(&self, capacity: usize) -> Box<dyn Column> {
        (self.new_column)(capacity)
    }

    pub(crate) fn new_value(&self) -> Box<dyn Any + Send> {
        (self.new_value)()
    }

    pub(crate) fn clone_value(&self, value: &dyn Any) -> Option<Box<dyn Any + Send>> {
        (self.clone_value)(value)
    }

    pub(crate) fn notify_remove(&self, value: &mut dyn Any, entity: Entity) {
        if let Some(hook) = self.on_remove {
            hook(value, entity);
        }
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentType")
            .field("type_name", &self.type_name)
            .field("views", &self.views.len())
            .field("on_remove", &self.on_remove.is_some())
            .finish()
    }
}

/// Builder for [`ComponentType`].
pub struct ComponentTypeBuilder<T> {
    ty: ComponentType,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Component> ComponentTypeBuilder<T> {
    /// Makes `T` assignable to `U`.
    ///
    /// # Arguments
    ///
    /// * `by_ref` - Shared cast, usually `|c| c`
    /// * `by_mut` - Exclusive cast, usually `|c| c`
    #[must_use]
    pub fn view<U: ?Sized + 'static>(
        mut self,
        by_ref: fn(&T) -> &U,
        by_mut: fn(&mut T) -> &mut U,
    ) -> Self {
        let caster: Box<dyn View<U>> = Box::new(FnView { by_ref, by_mut });
        self.ty.views.insert(
            TypeId::of::<U>(),
            ViewEntry {
                name: std::any::type_name::<U>(),
                caster: Box::new(caster),
            },
        );
        self
    }

    /// Registers the [`OnRemove`] hook of `T`.
    #[must_use]
    pub fn on_remove(mut self) -> Self
    where
        T: OnRemove,
    {
        self.ty.on_remove = Some(notify_remove::<T>);
        self
    }

    /// Finishes the description.
    #[must_use]
    pub fn build(self) -> ComponentType {
        self.ty
    }
}

// =============================================================================
// Parameters and provided values
// =============================================================================

/// A system parameter type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ParamType {
    type_id: TypeId,
    type_name: &'static str,
}

impl ParamType {
    /// Parameter of type `U`: a component, a view such as `dyn Trait`, or [`Entity`].
    #[must_use]
    pub fn of<U: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<U>(),
            type_name: std::any::type_name::<U>(),
        }
    }

    /// Runtime type id of the requested parameter.
    ///
    /// Named apart from `Any::type_id`, which would win method lookup on a
    /// `&ParamType` receiver.
    #[inline]
    #[must_use]
    pub fn id(self) -> TypeId {
        self.type_id
    }

    /// Type name, for diagnostics.
    #[inline]
    #[must_use]
    pub fn type_name(self) -> &'static str {
        self.type_name
    }

    /// Checks whether this parameter asks for the entity handle.
    #[inline]
    #[must_use]
    pub fn is_entity(self) -> bool {
        self.type_id == TypeId::of::<Entity>()
    }
}

/// Values supplied to [`crate::Environment::add_with`].
///
/// Each value fills the declared component of exactly its type.
#[derive(Default)]
pub struct ComponentSet {
    pub(crate) values: Vec<ProvidedValue>,
}

pub(crate) struct ProvidedValue {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) value: Box<dyn Any + Send>,
}

impl ComponentSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value.
    #[must_use]
    pub fn with<T: Component>(mut self, value: T) -> Self {
        self.values.push(ProvidedValue {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            value: Box::new(value),
        });
        self
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Checks whether no values were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for ComponentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.values.iter().map(|v| v.type_name))
            .finish()
    }
}
