//! Error types for the simulation core.
//!
//! Registry inconsistencies (duplicate add, delete of an absent entity) and
//! out-of-bounds placements are ordinary simulation edge cases: they are
//! logged and reported through return values, never through [`WorldError`].

use crate::{EntityId, policy::PolicyError};

/// Errors surfaced to callers of the simulation core.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// A heading outside the four canonical values was supplied.
    #[error("invalid orientation: {0:?}")]
    InvalidOrientation(String),

    /// A construction parameter is out of its accepted range.
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: String,
    },

    /// A fixed world layout could not be parsed.
    #[error("invalid layout: {0}")]
    InvalidLayout(String),

    /// An agent's decision source failed; the engine applies no recovery.
    #[error("policy of agent {agent} failed")]
    Policy {
        agent: EntityId,
        #[source]
        source: PolicyError,
    },
}
