//! # Tranches
//!
//! Dense columnar storage for every entity sharing one [`EntityDec`]:
//! an ordered entry list plus one column per declared component, all of the
//! same length and index-aligned. Slot `k` of every column belongs to
//! `entries[k]`.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use super::component::{Component, ComponentSet};
use super::declaration::EntityDec;
use super::entity::Entity;
use super::storage::{Column, ComponentStorage};
use crate::diagnostics::Diagnostics;
use crate::error::EcsError;

/// Storage for all entities of one declaration.
pub struct Tranche {
    dec: Arc<EntityDec>,
    entries: Vec<Entity>,
    columns: Vec<Box<dyn Column>>,
}

impl Tranche {
    pub(crate) fn new(dec: Arc<EntityDec>, capacity: usize) -> Self {
        let columns = dec
            .components()
            .iter()
            .map(|c| c.ty().new_column(capacity))
            .collect();
        Self {
            dec,
            entries: Vec::with_capacity(capacity),
            columns,
        }
    }

    /// Declaration this tranche stores.
    #[inline]
    #[must_use]
    pub fn dec(&self) -> &Arc<EntityDec> {
        &self.dec
    }

    /// Number of entities.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if the tranche is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entity handles, in storage order.
    #[inline]
    #[must_use]
    pub fn entries(&self) -> &[Entity] {
        &self.entries
    }

    /// Typed column by index.
    #[must_use]
    pub fn column<T: Component>(&self, column: usize) -> Option<&ComponentStorage<T>> {
        self.columns
            .get(column)?
            .as_any()
            .downcast_ref::<ComponentStorage<T>>()
    }

    /// First column storing exactly `T`.
    #[must_use]
    pub fn storage<T: Component>(&self) -> Option<&ComponentStorage<T>> {
        let column = self
            .dec
            .components()
            .iter()
            .position(|c| c.ty().type_id() == TypeId::of::<T>())?;
        self.column(column)
    }

    /// Checks that every column has one value per entry.
    #[must_use]
    pub fn is_dense(&self) -> bool {
        self.columns.iter().all(|c| c.len() == self.entries.len())
    }

    /// Views the value at (`column`, `slot`) as `T`.
    #[must_use]
    pub fn view<T: ?Sized + 'static>(&self, column: usize, slot: usize) -> Option<&T> {
        let ty = self.dec.components().get(column)?.ty();
        ty.view::<T>(self.columns.get(column)?.get(slot)?)
    }

    /// Views the value at (`column`, `slot`) mutably as `T`.
    pub fn view_mut<T: ?Sized + 'static>(&mut self, column: usize, slot: usize) -> Option<&mut T> {
        let ty = self.dec.components().get(column)?.ty();
        ty.view_mut::<T>(self.columns.get_mut(column)?.get_mut(slot)?)
    }

    /// Appends an entity. Missing or mistyped values are default-constructed.
    pub(crate) fn push(&mut self, entity: Entity, values: Vec<Box<dyn Any + Send>>) {
        let mut values = values.into_iter();
        for column in &mut self.columns {
            match values.next() {
                Some(value) => {
                    if column.push_boxed(value).is_err() {
                        column.push_default();
                    }
                }
                None => column.push_default(),
            }
        }
        self.entries.push(entity);
    }

    /// Fires removal hooks for the entity at `slot`, in declaration order.
    pub(crate) fn notify_remove(&mut self, slot: usize, entity: Entity) {
        for (component, column) in self.dec.components().iter().zip(&mut self.columns) {
            if !component.ty().has_on_remove() {
                continue;
            }
            if let Some(value) = column.get_mut(slot) {
                component.ty().notify_remove(value, entity);
            }
        }
    }

    /// Removes `slot`, moving the last entry into it.
    ///
    /// # Returns
    ///
    /// The entity now stored at `slot`, if one was moved.
    pub(crate) fn swap_remove(&mut self, slot: usize) -> Option<Entity> {
        if slot >= self.entries.len() {
            return None;
        }
        self.entries.swap_remove(slot);
        for column in &mut self.columns {
            column.swap_remove(slot);
        }
        self.entries.get(slot).copied()
    }

    /// Takes the values of the last entry out, in column order.
    pub(crate) fn pop_values(&mut self) -> Vec<Box<dyn Any + Send>> {
        self.entries.pop();
        self.dec
            .components()
            .iter()
            .zip(&mut self.columns)
            .map(|(component, column)| column.pop_boxed().unwrap_or_else(|| component.ty().new_value()))
            .collect()
    }

    pub(crate) fn split_mut(&mut self) -> (&[Entity], &mut [Box<dyn Column>]) {
        (&self.entries, &mut self.columns)
    }
}

impl Clone for Tranche {
    fn clone(&self) -> Self {
        Self {
            dec: Arc::clone(&self.dec),
            entries: self.entries.clone(),
            columns: self.columns.iter().map(|c| c.clone_column()).collect(),
        }
    }
}

impl fmt::Debug for Tranche {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tranche")
            .field("dec", &self.dec.name())
            .field("len", &self.entries.len())
            .field("columns", &self.columns.len())
            .finish()
    }
}

/// Resolves the initial component values of a new entity.
///
/// Each declared slot takes the provided value of its exact type, or a
/// default. A slot matched by several provided values keeps the first and
/// reports the ambiguity; a value matching no slot is reported as unused. A
/// value matching several slots is cloned into each.
pub(crate) fn fill_components(
    dec: &EntityDec,
    provided: ComponentSet,
    diagnostics: &Diagnostics,
) -> Vec<Box<dyn Any + Send>> {
    let mut provided = provided.values;
    let mut used = vec![0_usize; provided.len()];

    let chosen: Vec<Option<usize>> = dec
        .components()
        .iter()
        .map(|component| {
            let mut matched = None;
            for (j, value) in provided.iter().enumerate() {
                if value.type_id != component.ty().type_id() {
                    continue;
                }
                if matched.is_none() {
                    matched = Some(j);
                } else {
                    diagnostics.error(EcsError::AmbiguousProvidedComponent {
                        entity: dec.name().to_owned(),
                        component: component.ty().type_name(),
                    });
                }
            }
            if let Some(j) = matched {
                used[j] += 1;
            }
            matched
        })
        .collect();

    for (value, uses) in provided.iter().zip(&used) {
        if *uses == 0 {
            diagnostics.error(EcsError::UnusedProvidedComponent {
                entity: dec.name().to_owned(),
                component: value.type_name,
            });
        }
    }

    let mut slots: Vec<Option<Box<dyn Any + Send>>> =
        provided.drain(..).map(|v| Some(v.value)).collect();

    dec.components()
        .iter()
        .zip(chosen)
        .map(|(component, matched)| {
            let Some(j) = matched else {
                return component.ty().new_value();
            };
            used[j] -= 1;
            let value = if used[j] == 0 {
                slots[j].take()
            } else {
                slots[j]
                    .as_deref()
                    .and_then(|v| component.ty().clone_value(v))
            };
            value.unwrap_or_else(|| component.ty().new_value())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::ComponentType;
    use crate::ecs::declaration::Registry;
    use crate::ecs::entity::EntityId;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Name(String);

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Hp(u32);

    fn unit() -> Arc<EntityDec> {
        Registry::builder()
            .component("name", ComponentType::of::<Name>())
            .component("hp", ComponentType::of::<Hp>())
            .entity("unit", ["name", "hp"])
            .build()
            .unwrap()
            .entity("unit")
            .unwrap()
    }

    fn entity(n: u32) -> Entity {
        Entity::Resolved(EntityId::new(n, 1))
    }

    #[test]
    fn test_push_and_view() {
        let mut tranche = Tranche::new(unit(), 4);
        tranche.push(entity(0), vec![Box::new(Name("a".into())), Box::new(Hp(5))]);

        assert_eq!(tranche.len(), 1);
        assert!(tranche.is_dense());
        assert_eq!(tranche.view::<Hp>(1, 0), Some(&Hp(5)));
        assert_eq!(tranche.storage::<Name>().unwrap().as_slice(), &[Name("a".into())]);
    }

    #[test]
    fn test_swap_remove_moves_last() {
        let mut tranche = Tranche::new(unit(), 4);
        for n in 0..3 {
            tranche.push(entity(n), vec![Box::new(Name(n.to_string())), Box::new(Hp(n))]);
        }

        let moved = tranche.swap_remove(0);
        assert_eq!(moved, Some(entity(2)));
        assert!(tranche.is_dense());
        assert_eq!(tranche.view::<Name>(0, 0), Some(&Name("2".into())));
        assert_eq!(tranche.view::<Hp>(1, 0), Some(&Hp(2)));

        assert_eq!(tranche.swap_remove(1), None);
        assert_eq!(tranche.len(), 1);
    }

    #[test]
    fn test_fill_defaults_and_provided() {
        let dec = unit();
        let sink = Diagnostics::default();
        let values = fill_components(&dec, ComponentSet::new().with(Hp(9)), &sink);

        assert_eq!(values.len(), 2);
        assert_eq!(values[0].downcast_ref::<Name>(), Some(&Name::default()));
        assert_eq!(values[1].downcast_ref::<Hp>(), Some(&Hp(9)));
        assert_eq!(sink.error_count(), 0);
    }

    #[test]
    fn test_fill_reports_unused_and_ambiguous() {
        let dec = unit();
        let sink = Diagnostics::default();
        let values = fill_components(
            &dec,
            ComponentSet::new().with(Hp(1)).with(Hp(2)).with(7_u8),
            &sink,
        );

        assert_eq!(values[1].downcast_ref::<Hp>(), Some(&Hp(1)));
        let errors = sink.take_errors();
        assert!(matches!(errors[0], EcsError::AmbiguousProvidedComponent { .. }));
        assert!(errors
            .iter()
            .any(|e| matches!(e, EcsError::UnusedProvidedComponent { .. })));
    }

    #[test]
    fn test_pop_values_empties_staging() {
        let mut tranche = Tranche::new(unit(), 1);
        tranche.push(entity(0), vec![Box::new(Name("x".into())), Box::new(Hp(3))]);
        let values = tranche.pop_values();

        assert!(tranche.is_empty());
        assert!(tranche.is_dense());
        assert_eq!(values[1].downcast_ref::<Hp>(), Some(&Hp(3)));
    }
}
