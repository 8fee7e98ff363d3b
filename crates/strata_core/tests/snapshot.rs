//! # Snapshot Tests
//!
//! Record/restore of whole environments, copy-on-write payloads shared with
//! a snapshot, and serde forms of handles and lookup rows.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use strata_core::{
    ComponentSet, ComponentType, Cow, EcsError, Entity, EntityId, EntityLookup, EntityStatus,
    Environment, EnvironmentConfig, Registry, SystemDec,
};

#[derive(Clone, Debug, Default, PartialEq)]
struct Path(Cow<Vec<u32>>);

#[derive(Clone, Debug, Default, PartialEq)]
struct Tick(u64);

fn registry() -> Arc<Registry> {
    Registry::builder()
        .component("path", ComponentType::of::<Path>())
        .singleton("tick", ComponentType::of::<Tick>())
        .entity("walker", ["path"])
        .system(
            SystemDec::new("step", |args| {
                let tick = args.take::<Tick>(0)?;
                tick.0 += 1;
                let next = u32::try_from(tick.0).map_err(|e| e.to_string())?;
                let env = args.environment();
                args.take::<Path>(1)?.0.get_rw_in(env).push(next);
                Ok(())
            })
            .param::<Tick>()
            .param::<Path>(),
        )
        .system(
            SystemDec::new("step_active", |args| {
                // Dispatch marks the environment active, so the scoped form works too.
                args.take::<Path>(0)?.0.get_rw().push(0);
                Ok(())
            })
            .param::<Path>(),
        )
        .process("walk", ["step"])
        .process("walk_active", ["step_active"])
        .build()
        .unwrap()
}

fn walker(env: &mut Environment, registry: &Registry, start: Vec<u32>) -> Entity {
    let mut path = Cow::default();
    path.set_in(start, None);
    env.add_with(
        &registry.entity("walker").unwrap(),
        ComponentSet::new().with(Path(path)),
    )
}

// ============================================================================
// RECORD / RESTORE
// ============================================================================

#[test]
fn test_restored_environment_diverges() {
    let registry = registry();
    let walk = registry.process("walk").unwrap();
    let mut env = Environment::new(Arc::clone(&registry));
    let w = walker(&mut env, &registry, vec![7]);

    let mut restored = Environment::restore(
        Arc::clone(&registry),
        EnvironmentConfig::default(),
        env.record().unwrap(),
    );
    assert_ne!(restored.id(), env.id());
    assert!(w
        .component::<Path>(&env)
        .unwrap()
        .0
        .shares_with(&w.component::<Path>(&restored).unwrap().0));

    restored.process(&walk);
    restored.process(&walk);

    assert_eq!(w.component::<Path>(&restored).unwrap().0.get_ro(), &vec![7, 1, 2]);
    assert_eq!(w.component::<Path>(&env).unwrap().0.get_ro(), &vec![7]);
    assert_eq!(restored.singleton::<Tick>(), Some(&Tick(2)));
    assert_eq!(env.singleton::<Tick>(), Some(&Tick(0)));

    env.process(&walk);
    assert_eq!(w.component::<Path>(&env).unwrap().0.get_ro(), &vec![7, 1]);
    assert_eq!(w.component::<Path>(&restored).unwrap().0.get_ro(), &vec![7, 1, 2]);
}

#[test]
fn test_record_survives_later_writes() {
    let registry = registry();
    let mut env = Environment::new(Arc::clone(&registry));
    let w = walker(&mut env, &registry, vec![1]);
    let record = env.record().unwrap();

    env.process(&registry.process("walk_active").unwrap());
    env.process(&registry.process("walk_active").unwrap());
    assert_eq!(w.component::<Path>(&env).unwrap().0.get_ro(), &vec![1, 0, 0]);
    assert_eq!(w.component::<Path>(&env).unwrap().0.revision(), env.id().get());

    let first = record.tranches()[0].storage::<Path>().unwrap().as_slice()[0].clone();
    assert_eq!(first.0.get_ro(), &vec![1]);
    assert_eq!(first.0.revision(), 0);
}

#[test]
fn test_record_shape() {
    let registry = registry();
    let mut env = Environment::new(Arc::clone(&registry));
    let a = walker(&mut env, &registry, Vec::new());
    walker(&mut env, &registry, Vec::new());
    env.remove(a);

    let record = env.record().unwrap();
    assert_eq!(record.tranches().len(), 1);
    assert_eq!(record.tranches()[0].len(), 1);
    assert_eq!(record.lookup().len(), 2);
    assert_eq!(record.free_list(), &[0]);
    assert_eq!(record.singleton_count(), 1);
    assert_eq!(record.singleton_index(), registry.singleton_map());
}

#[test]
fn test_restore_into_foreign_registry_is_reported() {
    let mut env = Environment::new(registry());
    let own = Arc::clone(env.registry());
    walker(&mut env, &own, vec![3]);

    let restored = Environment::restore(registry(), EnvironmentConfig::default(), env.record().unwrap());
    assert!(restored.is_empty());
    assert!(matches!(
        restored.diagnostics().take_errors()[..],
        [EcsError::RecordMismatch(_)]
    ));
}

fn spawner(kept: &'static Mutex<Vec<Entity>>) -> Arc<Registry> {
    Registry::builder()
        .component("path", ComponentType::of::<Path>())
        .entity("walker", ["path"])
        .system(SystemDec::new("spawn", move |args| {
            let commands = args.commands();
            let walker = commands.registry().entity("walker").ok_or("walker not declared")?;
            let entity = commands.add(&walker);
            kept.lock().map_err(|e| e.to_string())?.push(entity);
            Ok(())
        }))
        .process("spawn", ["spawn"])
        .build()
        .unwrap()
}

#[test]
fn test_deferred_handle_resolves_in_restored_copy() {
    static KEPT: Mutex<Vec<Entity>> = Mutex::new(Vec::new());

    let registry = spawner(&KEPT);
    let mut env = Environment::new(Arc::clone(&registry));
    env.process(&registry.process("spawn").unwrap());
    let kept = KEPT.lock().unwrap()[0];
    assert!(matches!(kept, Entity::Deferred(_)));

    let record = env.record().unwrap();
    assert_eq!(record.resolved().len(), 1);
    let restored = Environment::restore(Arc::clone(&registry), EnvironmentConfig::default(), record);

    assert_eq!(kept.status(&restored), EntityStatus::Active);
    assert!(kept.is_valid(&restored));
    assert_eq!(kept.identifier(&restored), kept.identifier(&env));
    assert!(kept.component::<Path>(&restored).is_some());
    assert_eq!(restored.diagnostics().error_count(), 0);
}

#[test]
fn test_replacements_forgotten_when_index_reused() {
    static KEPT: Mutex<Vec<Entity>> = Mutex::new(Vec::new());

    let registry = spawner(&KEPT);
    let walker = registry.entity("walker").unwrap();
    let spawn = registry.process("spawn").unwrap();
    let mut env = Environment::new(Arc::clone(&registry));
    for _ in 0..3 {
        env.process(&spawn);
    }
    let kept: Vec<Entity> = KEPT.lock().unwrap().clone();
    assert_eq!(env.record().unwrap().resolved().len(), 3);

    for &entity in &kept {
        env.remove(entity);
    }
    assert!(kept.iter().all(|e| e.status(&env) == EntityStatus::Deleted));

    for _ in 0..3 {
        env.add(&walker);
    }
    assert_eq!(env.len(), 3);
    assert!(env.record().unwrap().resolved().is_empty());
    assert!(kept.iter().all(|e| !e.is_valid(&env)));
}

// ============================================================================
// SERDE
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Target {
    entity: Entity,
}

#[test]
fn test_entity_serializes_as_pair() {
    let target = Target {
        entity: Entity::Resolved(EntityId::new(3, 2)),
    };
    let text = toml::to_string(&target).unwrap();
    assert_eq!(text.trim(), "entity = [3, 2]");
    assert_eq!(toml::from_str::<Target>(&text).unwrap(), target);
}

#[test]
fn test_deferred_entity_refuses_serialization() {
    let registry = Registry::builder()
        .system(SystemDec::new("capture", |args| {
            let commands = args.commands();
            let dec = commands.registry().entity("e").ok_or("missing")?;
            let entity = commands.add(&dec);
            assert!(toml::to_string(&Target { entity }).is_err());
            Ok(())
        }))
        .component("path", ComponentType::of::<Path>())
        .entity("e", ["path"])
        .process("tick", ["capture"])
        .build()
        .unwrap();

    let mut env = Environment::new(Arc::clone(&registry));
    env.process(&registry.process("tick").unwrap());
    assert_eq!(env.diagnostics().error_count(), 0);
    assert_eq!(env.len(), 1);
}

#[test]
fn test_lookup_rows_roundtrip() {
    #[derive(Serialize, Deserialize)]
    struct Rows {
        rows: Vec<EntityLookup>,
    }

    let registry = registry();
    let mut env = Environment::new(Arc::clone(&registry));
    let a = walker(&mut env, &registry, Vec::new());
    walker(&mut env, &registry, Vec::new());
    env.remove(a);

    let rows = Rows {
        rows: env.lookup().to_vec(),
    };
    let text = toml::to_string(&rows).unwrap();
    let back: Rows = toml::from_str(&text).unwrap();

    assert_eq!(back.rows, env.lookup());
    assert_eq!(back.rows[0].dec(), None);
    assert_eq!(back.rows[0].generation(), 2);
    assert_eq!(back.rows[1].dec(), Some(0));
    assert_eq!(back.rows[1].slot(), 0);
}

// ============================================================================
// CONFIG
// ============================================================================

#[test]
fn test_headless_counts_without_capture() {
    let config = EnvironmentConfig::from_toml_str(
        "capture_diagnostics = false\ndiagnostic_limit = 0\n",
    )
    .unwrap();
    let env = Environment::with_config(registry(), config);

    assert!(env.singleton::<Path>().is_none());
    assert!(env.singleton::<Path>().is_none());
    assert_eq!(env.diagnostics().error_count(), 2);
    assert!(env.diagnostics().take().is_empty());
}
