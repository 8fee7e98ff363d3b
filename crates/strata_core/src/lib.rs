//! # STRATA Core
//!
//! Runtime of a declaration-driven Entity Component System:
//! - Entities stored in dense per-declaration tranches
//! - Generational handles that detect stale references
//! - Systems resolved against storage once, dispatched per entity
//! - Deferred add/remove while a pass is running
//! - Copy-on-write component payloads for cheap snapshots
//!
//! ## Architecture Rules
//!
//! 1. **Declarations are immutable** - a [`Registry`] is built once and shared
//! 2. **Nothing aborts a pass** - runtime problems go to [`Diagnostics`]
//! 3. **One environment, one thread** - an [`Environment`] is `&mut` while processing
//!
//! ## Example
//!
//! ```rust,ignore
//! use strata_core::{ComponentType, Environment, Registry, SystemDec};
//!
//! let registry = Registry::builder()
//!     .component("hp", ComponentType::of::<Hp>())
//!     .entity("unit", ["hp"])
//!     .system(SystemDec::new("regen", |args| {
//!         args.take::<Hp>(0)?.0 += 1;
//!         Ok(())
//!     }).param::<Hp>())
//!     .process("tick", ["regen"])
//!     .build()?;
//!
//! let mut env = Environment::new(registry.clone());
//! env.add(&registry.entity("unit").unwrap());
//! env.process(&registry.process("tick").unwrap());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod diagnostics;
pub mod ecs;
pub mod error;
pub mod sync;

pub use config::EnvironmentConfig;
pub use diagnostics::{Diagnostic, Diagnostics, Level};
pub use ecs::{
    Args, Column, Command, Commands, Component, ComponentDec, ComponentMatch, ComponentRef, ComponentSet,
    ComponentStorage, ComponentType, ComponentTypeBuilder, Cow, DeferredId, Entity, EntityDec,
    EntityDisplay, EntityFormatter, EntityId, EntityLookup, EntityStatus, Environment, EnvironmentRecord,
    OnRemove, ParamType, ProcessDec, Registry, RegistryBuilder, Status, SystemDec, SystemFn, SystemPlan,
    Tranche,
};
pub use error::{ConfigError, EcsError, RegistryError, RegistryResult, SystemError, SystemResult};
pub use sync::{ActiveScope, EnvironmentId};
