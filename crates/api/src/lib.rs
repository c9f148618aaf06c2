//! Router-facing access layer: configuration, the [`AccessService`] facade
//! and the outward error mapping.
//!
//! HTTP routing lives outside this workspace; a router calls into
//! [`AccessService`] and turns [`ServiceError::status_code`] into responses.

pub mod authz;
pub mod config;
pub mod error;
pub mod service;

pub use config::{AccessConfig, ConfigError, Environment};
pub use error::ServiceError;
pub use service::{AccessService, LoginResponse, TokenPair};
