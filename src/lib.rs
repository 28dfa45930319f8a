//! Namespaced secrets on a remote parameter store, accessed with federated
//! credentials.
//!
//! Secrets are scoped by organization, project and environment ([`EnvId`]),
//! stored under deterministic paths and tags ([`paths`]), and read or
//! written through the [`Store`] trait. [`infra::awsfed`] turns an identity
//! token into the short-lived credentials used to reach the store.

pub mod config;
pub mod envcli;
pub mod error;
pub mod infra;
pub mod namespace;
pub mod paths;
pub mod services;
pub mod token;

pub use error::{PathError, SetAllError};
pub use namespace::{EnvId, EnvVar};
pub use services::store::Store;
