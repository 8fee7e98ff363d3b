//! # Component Access Tests
//!
//! Strict and lenient access, trait views, provided initial values and the
//! diagnostic rendering of handles.

use std::sync::Arc;

use strata_core::{
    ComponentRef, ComponentSet, ComponentType, EcsError, Entity, EntityStatus, Environment, Registry,
};

trait Labeled {
    fn label(&self) -> &str;
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Derived(String);

impl Labeled for Derived {
    fn label(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct DerivedAlternate(String);

impl Labeled for DerivedAlternate {
    fn label(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Hp(u32);

fn labeled<T: Labeled + Clone + Default + Send + 'static>() -> ComponentType {
    ComponentType::builder::<T>()
        .view::<dyn Labeled>(|c| c, |c| c)
        .build()
}

fn registry() -> Arc<Registry> {
    Registry::builder()
        .component("a", labeled::<Derived>())
        .component("b", labeled::<DerivedAlternate>())
        .component("hp", ComponentType::of::<Hp>())
        .entity("model_a", ["a"])
        .entity("model_b", ["a", "b"])
        .entity("model_alt", ["b", "hp"])
        .build()
        .unwrap()
}

// ============================================================================
// VIEWS
// ============================================================================

#[test]
fn test_view_aliases_concrete_component() {
    let registry = registry();
    let mut env = Environment::new(Arc::clone(&registry));
    let a = env.add_with(
        &registry.entity("model_a").unwrap(),
        ComponentSet::new().with(Derived("first".into())),
    );

    let by_view: *const u8 = (a.component::<dyn Labeled>(&env).unwrap() as *const dyn Labeled).cast();
    let by_type: *const u8 = (a.component::<Derived>(&env).unwrap() as *const Derived).cast();
    assert_eq!(by_view, by_type);
    assert_eq!(a.component::<dyn Labeled>(&env).unwrap().label(), "first");

    a.component_mut::<dyn Labeled>(&mut env).unwrap();
    assert_eq!(env.diagnostics().error_count(), 0);
}

#[test]
fn test_ambiguous_view_is_reported() {
    let registry = registry();
    let mut env = Environment::new(Arc::clone(&registry));
    let b = env.add(&registry.entity("model_b").unwrap());

    assert!(b.component::<dyn Labeled>(&env).is_none());
    assert!(matches!(
        env.diagnostics().take_errors()[..],
        [EcsError::AmbiguousComponent { .. }]
    ));

    // Exact types are still unambiguous.
    assert!(b.component::<Derived>(&env).is_some());
    assert!(b.component::<DerivedAlternate>(&env).is_some());
    assert!(b.try_component::<dyn Labeled>(&env).is_none());
    assert_eq!(env.diagnostics().error_count(), 1);
}

#[test]
fn test_has_component() {
    let registry = registry();
    let mut env = Environment::new(Arc::clone(&registry));
    let a = env.add(&registry.entity("model_a").unwrap());
    let alt = env.add(&registry.entity("model_alt").unwrap());

    assert!(a.has_component::<Derived>(&env));
    assert!(!a.has_component::<DerivedAlternate>(&env));
    assert!(!alt.has_component::<Derived>(&env));
    assert!(alt.has_component::<DerivedAlternate>(&env));
    assert!(alt.has_component::<dyn Labeled>(&env));

    let hp = registry.component("hp").unwrap();
    assert!(alt.has_component_dec(&env, &hp));
    assert!(!a.has_component_dec(&env, &hp));
}

// ============================================================================
// STRICT / LENIENT
// ============================================================================

#[test]
fn test_missing_component_strict_and_lenient() {
    let registry = registry();
    let mut env = Environment::new(Arc::clone(&registry));
    let a = env.add(&registry.entity("model_a").unwrap());

    assert!(a.try_component::<Hp>(&env).is_none());
    assert!(a.try_component_mut::<Hp>(&mut env).is_none());
    assert_eq!(env.diagnostics().error_count(), 0);

    assert!(a.component::<Hp>(&env).is_none());
    assert!(matches!(
        env.diagnostics().take_errors()[..],
        [EcsError::MissingComponent { .. }]
    ));
}

#[test]
fn test_component_ref_strict_and_lenient() {
    let registry = registry();
    let mut env = Environment::new(Arc::clone(&registry));
    let alt = env.add(&registry.entity("model_alt").unwrap());

    let hp = ComponentRef::<Hp>::new(alt);
    hp.get_mut(&mut env).unwrap().0 = 12;
    assert_eq!(hp.get(&env), Some(&Hp(12)));
    assert_eq!(hp.entity(), alt);
    assert_eq!(hp, ComponentRef::from(alt));

    let missing = ComponentRef::<Derived>::new(alt);
    assert!(missing.try_get(&env).is_none());
    assert_eq!(env.diagnostics().error_count(), 0);
    assert!(missing.get(&env).is_none());
    assert_eq!(env.diagnostics().error_count(), 1);
}

// ============================================================================
// PROVIDED VALUES
// ============================================================================

#[test]
fn test_provided_values_fill_matching_slots() {
    let registry = registry();
    let mut env = Environment::new(Arc::clone(&registry));
    let alt = env.add_with(
        &registry.entity("model_alt").unwrap(),
        ComponentSet::new().with(Hp(40)).with(DerivedAlternate("alt".into())),
    );

    assert_eq!(alt.component::<Hp>(&env), Some(&Hp(40)));
    assert_eq!(alt.component::<dyn Labeled>(&env).unwrap().label(), "alt");
    assert_eq!(env.diagnostics().error_count(), 0);
}

#[test]
fn test_provided_value_problems_are_reported() {
    let registry = registry();
    let mut env = Environment::new(Arc::clone(&registry));
    let a = env.add_with(
        &registry.entity("model_a").unwrap(),
        ComponentSet::new()
            .with(Derived("one".into()))
            .with(Derived("two".into()))
            .with(Hp(1)),
    );

    // First match wins; the entity is still created.
    assert!(a.is_valid(&env));
    assert_eq!(a.component::<Derived>(&env), Some(&Derived("one".into())));

    let errors = env.diagnostics().take_errors();
    assert!(errors
        .iter()
        .any(|e| matches!(e, EcsError::AmbiguousProvidedComponent { .. })));
    assert!(errors
        .iter()
        .any(|e| matches!(e, EcsError::UnusedProvidedComponent { component, .. } if component.ends_with("Hp"))));
}

// ============================================================================
// STATUS & DISPLAY
// ============================================================================

#[test]
fn test_status_and_display() {
    let registry = registry();
    let model = registry.entity("model_alt").unwrap();
    let mut env = Environment::new(Arc::clone(&registry));

    let e = env.add(&model);
    let id = e.identifier(&env).unwrap();
    assert_eq!(e.status(&env), EntityStatus::Active);
    assert_eq!(
        e.display(&env).to_string(),
        format!("[Entity:model_alt:{}:{}]", id.index(), id.generation())
    );
    assert_eq!(e.entity_dec(&env).unwrap().name(), "model_alt");

    env.set_entity_formatter(|env, entity| {
        entity
            .try_component::<Hp>(env)
            .map_or_else(|| "?".to_owned(), |hp| format!("hp={}", hp.0))
    });
    assert!(e.display(&env).to_string().ends_with(":hp=0]"));

    env.remove(e);
    assert_eq!(e.status(&env), EntityStatus::Deleted);
    assert_eq!(e.display(&env).to_string(), "[Entity:Deleted:?]");

    assert_eq!(Entity::NULL.status(&env), EntityStatus::Null);
    assert_eq!(Entity::NULL.display(&env).to_string(), "[Entity:Null]");
    assert_eq!(Entity::NULL.to_string(), "[Entity:Null]");
}
