//! Deterministic decision core for feature experimentation.
//!
//! Given a read-only project configuration and a user (id + attributes),
//! the crate answers two questions, bit-for-bit identically across
//! processes and client implementations: does the user match an
//! experiment's audiences, and which variation (if any) do they bucket
//! into.

pub mod audience;
pub mod bucketer;
pub mod condition;
pub mod errors;
pub mod hashing;
pub mod logging;
pub mod models;
