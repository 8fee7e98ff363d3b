//! # Error Types
//!
//! Runtime conditions are *reported* through [`crate::Diagnostics`] and never
//! abort a dispatch pass. Only the declaration layer (registry building) and
//! configuration loading return hard errors.

use thiserror::Error;

/// Conditions reported by an [`crate::Environment`] while operating.
///
/// None of these are fatal: the operation that raised one returns a safe
/// default (a null handle, `None`, a skipped tranche) and execution continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// A mutation or snapshot API was called in the wrong engine state.
    #[error("operation `{operation}` requires the {expected} state, environment is {actual}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the operation requires.
        expected: &'static str,
        /// State the environment was actually in.
        actual: &'static str,
    },

    /// `process` started while a different environment was active.
    #[error("started processing with a different environment active; this is probably a mistake")]
    ForeignEnvironmentActive,

    /// An entity declaration that does not belong to this environment's registry.
    #[error("entity declaration `{0}` is not part of this environment's registry")]
    ForeignDeclaration(String),

    /// A declared component slot matched more than one provided value, or a
    /// provided value matched more than one declared slot.
    #[error("ambiguity in component match for {entity}; {component} matches more than one provided value")]
    AmbiguousProvidedComponent {
        /// Entity declaration being filled.
        entity: String,
        /// Component type involved.
        component: &'static str,
    },

    /// A provided value matched no declared component.
    #[error("unused component {component} provided for {entity}")]
    UnusedProvidedComponent {
        /// Entity declaration being filled.
        entity: String,
        /// Type of the unused value.
        component: &'static str,
    },

    /// Strict access through a handle that is null, stale or removed.
    #[error("attempted to access dead entity {0}")]
    DeadEntity(String),

    /// Strict access for a component type the entity's declaration lacks.
    #[error("entity {entity} has no component assignable to {component}")]
    MissingComponent {
        /// Rendered entity handle.
        entity: String,
        /// Requested type.
        component: &'static str,
    },

    /// Access for a type that more than one declared component satisfies.
    #[error("entity {entity} has more than one component assignable to {component}")]
    AmbiguousComponent {
        /// Rendered entity handle.
        entity: String,
        /// Requested type.
        component: &'static str,
    },

    /// A system read an entity of the tranche it is visiting.
    #[error("entity {0} belongs to the tranche being visited")]
    EntityInUse(String),

    /// Singleton access for a type with no singleton declaration.
    #[error("attempted to access singleton {0} that doesn't exist")]
    UnknownSingleton(&'static str),

    /// Removal of a handle that does not refer to a live entity.
    #[error("attempted to remove entity {0} that doesn't exist")]
    RemoveMissing(String),

    /// The all-singleton scan found a parameter with several candidates.
    #[error("{system}: ambiguity in singleton scan! {detail}")]
    AmbiguousSingletonScan {
        /// System name.
        system: String,
        /// Per-parameter list of competing types.
        detail: String,
    },

    /// A tranche's candidate pool had several matches for a parameter.
    #[error("{system}: ambiguity in entity scan of {entity}! {detail}")]
    AmbiguousTrancheScan {
        /// System name.
        system: String,
        /// Entity declaration that was skipped.
        entity: String,
        /// Per-parameter list of competing types.
        detail: String,
    },

    /// Two parameters of one system resolved to the same mutable source.
    #[error("{system}: parameters {first} and {second} resolve to the same {source_name}")]
    AliasedParameter {
        /// System name.
        system: String,
        /// First parameter position.
        first: usize,
        /// Second parameter position.
        second: usize,
        /// Name of the shared source.
        source_name: String,
    },

    /// Neither the singleton fast path nor any tranche matched a system.
    #[error("no entity type matches when attempting to run system {0}")]
    NoMatchingTranche(String),

    /// A system invocation returned an error.
    #[error("system {system} failed: {source}")]
    SystemFailed {
        /// System name.
        system: String,
        /// Error returned by the system.
        source: SystemError,
    },

    /// Every entity index is in use.
    #[error("entity lookup table exhausted")]
    LookupExhausted,

    /// Deferred mutations were still queued after a flush.
    #[error("deferred queue not drained after {0}: {1} actions remain")]
    QueueNotDrained(String, usize),

    /// A snapshot was requested while deferred creations were unresolved.
    #[error("cannot record environment with {0} pending deferred actions")]
    UnresolvedDeferred(usize),

    /// A deferred entity handle cannot be serialized.
    #[error("deferred entity handles must be resolved before serialization")]
    SerializeDeferred,

    /// A restored snapshot does not fit the registry it is restored against.
    #[error("record does not match registry: {0}")]
    RecordMismatch(String),
}

/// Errors returned from system logic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SystemError {
    /// The requested type is not the one resolved for this parameter.
    #[error("parameter {index} cannot be viewed as {expected}")]
    ParameterType {
        /// Parameter position.
        index: usize,
        /// Requested type.
        expected: &'static str,
    },

    /// The parameter reference was already handed out, or is not a value.
    #[error("parameter {index} is not available")]
    ParameterTaken {
        /// Parameter position.
        index: usize,
    },

    /// Failure raised by system logic.
    #[error("{0}")]
    Failed(String),
}

impl From<&str> for SystemError {
    fn from(message: &str) -> Self {
        Self::Failed(message.to_owned())
    }
}

impl From<String> for SystemError {
    fn from(message: String) -> Self {
        Self::Failed(message)
    }
}

/// Errors from building a [`crate::Registry`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Two declarations of one kind share a name.
    #[error("duplicate {kind} declaration `{name}`")]
    DuplicateName {
        /// Declaration kind.
        kind: &'static str,
        /// The duplicated name.
        name: String,
    },

    /// An entity declaration names an undeclared component.
    #[error("entity `{entity}` references unknown component `{component}`")]
    UnknownComponent {
        /// Entity declaration.
        entity: String,
        /// Missing component name.
        component: String,
    },

    /// An entity declaration lists a singleton component.
    #[error("entity `{entity}` lists singleton component `{component}`")]
    SingletonInEntity {
        /// Entity declaration.
        entity: String,
        /// Singleton component name.
        component: String,
    },

    /// A process names an undeclared system.
    #[error("process `{process}` references unknown system `{system}`")]
    UnknownSystem {
        /// Process declaration.
        process: String,
        /// Missing system name.
        system: String,
    },

    /// Two singleton declarations share one runtime type.
    #[error("singletons `{first}` and `{second}` share the runtime type {ty}")]
    DuplicateSingletonType {
        /// First declaration.
        first: String,
        /// Second declaration.
        second: String,
        /// Shared type.
        ty: &'static str,
    },
}

/// Errors from loading an [`crate::EnvironmentConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The TOML text could not be parsed.
    #[error("invalid configuration: {0}")]
    Parse(String),

    /// A value is out of range.
    #[error("invalid configuration value `{field}`: {reason}")]
    Invalid {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result type for registry building.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type returned by system logic.
pub type SystemResult = Result<(), SystemError>;
