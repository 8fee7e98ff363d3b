//! # Entity Component System
//!
//! Declaration-driven ECS: entity, component, system and process
//! declarations are collected once into a [`Registry`], and an
//! [`Environment`] is the storage engine built from it.
//!
//! ## Design Philosophy
//!
//! - Entities of one declaration share a dense [`Tranche`]
//! - Handles carry an index and a generation; stale handles never alias
//! - Systems are matched to storage once, when the registry is built
//! - Mutations during a pass are deferred to the end of each system step

mod commands;
mod component;
mod cow;
mod declaration;
mod entity;
mod resolver;
mod storage;
mod tranche;
mod world;

pub use commands::{Command, Commands};
pub use component::{Component, ComponentSet, ComponentType, ComponentTypeBuilder, OnRemove, ParamType};
pub use cow::Cow;
pub use declaration::{
    ComponentDec, ComponentMatch, EntityDec, ProcessDec, Registry, RegistryBuilder, SystemDec, SystemFn,
};
pub use entity::{ComponentRef, DeferredId, Entity, EntityDisplay, EntityId, EntityStatus};
pub use resolver::{Args, SystemPlan};
pub use storage::{Column, ComponentStorage};
pub use tranche::Tranche;
pub use world::{Environment, EntityFormatter, EntityLookup, EnvironmentRecord, Status};
