//! # Component Storage
//!
//! Dense, growable component arrays.
//!
//! The storage uses a dense array strategy:
//! - Slot `k` always belongs to the `k`-th entry of the owning tranche
//! - Removal swaps the last value into the hole, so there are no gaps
//! - Iteration is cache-friendly (contiguous memory)
//!
//! [`ComponentStorage`] is the typed array. [`Column`] is the type-erased
//! layer a tranche holds, one per declared component.

use std::any::Any;

use super::component::Component;

/// Type-erased view of one component array.
pub trait Column: Send {
    /// Number of stored values.
    fn len(&self) -> usize;

    /// Checks whether the column is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a default value.
    fn push_default(&mut self);

    /// Appends a boxed value.
    ///
    /// # Errors
    ///
    /// Returns the value back if it is not of the column's type.
    fn push_boxed(&mut self, value: Box<dyn Any + Send>) -> Result<(), Box<dyn Any + Send>>;

    /// Removes the value at `slot`, moving the last value into its place.
    fn swap_remove(&mut self, slot: usize);

    /// Removes and returns the last value.
    fn pop_boxed(&mut self) -> Option<Box<dyn Any + Send>>;

    /// Gets a value by slot.
    fn get(&self, slot: usize) -> Option<&dyn Any>;

    /// Gets a mutable value by slot.
    fn get_mut(&mut self, slot: usize) -> Option<&mut dyn Any>;

    /// Deep-copies the column.
    fn clone_column(&self) -> Box<dyn Column>;

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Dense storage for a single component type.
///
/// # Type Parameters
///
/// * `C` - The component type to store
///
/// # Example
///
/// ```rust,ignore
/// let mut storage: ComponentStorage<Health> = ComponentStorage::with_capacity(64);
/// storage.push(Health(10));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ComponentStorage<C> {
    data: Vec<C>,
}

impl<C: Component> ComponentStorage<C> {
    /// Creates empty storage with room for `capacity` values.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Gets a component by slot.
    ///
    /// # Returns
    ///
    /// Reference to the component, or None if slot is out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, slot: usize) -> Option<&C> {
        self.data.get(slot)
    }

    /// Gets a mutable component by slot.
    #[inline]
    pub fn get_mut(&mut self, slot: usize) -> Option<&mut C> {
        self.data.get_mut(slot)
    }

    /// Appends a component.
    #[inline]
    pub fn push(&mut self, component: C) {
        self.data.push(component);
    }

    /// Returns a slice of all components.
    ///
    /// Useful for batch processing.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[C] {
        &self.data
    }

    /// Returns a mutable slice of all components.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [C] {
        &mut self.data
    }

    /// Iterates over all components with their slots.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (usize, &C)> {
        self.data.iter().enumerate()
    }
}

impl<C: Component> Column for ComponentStorage<C> {
    #[inline]
    fn len(&self) -> usize {
        self.data.len()
    }

    fn push_default(&mut self) {
        self.data.push(C::default());
    }

    fn push_boxed(&mut self, value: Box<dyn Any + Send>) -> Result<(), Box<dyn Any + Send>> {
        let value = value.downcast::<C>()?;
        self.data.push(*value);
        Ok(())
    }

    fn swap_remove(&mut self, slot: usize) {
        if slot < self.data.len() {
            self.data.swap_remove(slot);
        }
    }

    fn pop_boxed(&mut self) -> Option<Box<dyn Any + Send>> {
        self.data
            .pop()
            .map(|value| Box::new(value) as Box<dyn Any + Send>)
    }

    #[inline]
    fn get(&self, slot: usize) -> Option<&dyn Any> {
        self.data.get(slot).map(|value| value as &dyn Any)
    }

    #[inline]
    fn get_mut(&mut self, slot: usize) -> Option<&mut dyn Any> {
        self.data.get_mut(slot).map(|value| value as &mut dyn Any)
    }

    fn clone_column(&self) -> Box<dyn Column> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Health(u32);

    #[test]
    fn test_storage_push_get() {
        let mut storage: ComponentStorage<Health> = ComponentStorage::with_capacity(4);
        storage.push(Health(3));
        storage.push(Health(7));

        assert_eq!(storage.get(1), Some(&Health(7)));
        assert!(storage.get(2).is_none());
        assert_eq!(storage.as_slice().len(), 2);
    }

    #[test]
    fn test_column_swap_remove_keeps_dense() {
        let mut column: Box<dyn Column> = Box::new(ComponentStorage::<Health>::with_capacity(4));
        for n in 0..4 {
            column.push_boxed(Box::new(Health(n))).unwrap();
        }

        column.swap_remove(1);
        assert_eq!(column.len(), 3);

        let moved = column.get(1).and_then(|v| v.downcast_ref::<Health>());
        assert_eq!(moved, Some(&Health(3)));
    }

    #[test]
    fn test_column_rejects_foreign_value() {
        let mut column = ComponentStorage::<Health>::with_capacity(1);
        let rejected = column.push_boxed(Box::new("nope"));
        assert!(rejected.is_err());
        assert!(Column::is_empty(&column));
    }

    #[test]
    fn test_clone_column_is_deep() {
        let mut column = ComponentStorage::<Health>::with_capacity(1);
        column.push(Health(1));
        let mut copy = column.clone_column();

        if let Some(value) = copy.get_mut(0).and_then(|v| v.downcast_mut::<Health>()) {
            value.0 = 99;
        }
        assert_eq!(column.get(0), Some(&Health(1)));
    }
}
