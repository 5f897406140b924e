//! Error types for the decision core.
//!
//! Decisions themselves are infallible: audience evaluation returns a
//! boolean and bucketing returns an optional variation. The only fallible
//! surface is condition decoding, which runs once when a project
//! configuration is built.

use thiserror::Error;

/// Errors raised while decoding a raw condition tree.
#[derive(Error, Debug)]
pub enum ConditionDecodeError {
    /// A condition leaf object did not deserialize to the expected shape.
    #[error("malformed condition leaf: {0}")]
    MalformedLeaf(#[from] serde_json::Error),

    /// An attribute-level tree contained something other than an operator
    /// array or a condition object.
    #[error("expected a condition object, found {found}")]
    InvalidConditionLeaf { found: &'static str },

    /// An audience-level tree contained something other than an operator
    /// array or an audience id string.
    #[error("expected an audience id, found {found}")]
    InvalidAudienceReference { found: &'static str },
}
