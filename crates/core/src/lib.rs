//! `dcim-core`: primitives shared by the access-control and audit crates.
//!
//! This crate contains **no IO**: identifiers, the domain error model, and the
//! swappable snapshot cell used for process-wide read-mostly state.

pub mod error;
pub mod id;
pub mod shared;

pub use error::{DomainError, DomainResult};
pub use id::{EntityKind, TargetRef};
pub use shared::Shared;
