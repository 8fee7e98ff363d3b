//! # Active Environment Tracking
//!
//! Exactly one environment is "active" per thread at a time. Activation is
//! scoped: [`ActiveScope`] marks an environment active and restores the
//! previous one when dropped, including on early returns.
//!
//! ```text
//! env_a.activate()            active = A
//!     env_b.process(..)       warns (A is active), active = B
//!     ...                     active = B
//!     <scope drop>            active = A
//! <scope drop>                active = none
//! ```

mod scope;

pub use scope::{active, ActiveScope, EnvironmentId};
