//! Secrets backed by a hierarchical parameter store.
//!
//! [`ParameterApi`] is the transport seam: the raw calls the remote store
//! offers. [`SdkParameterApi`] implements it with AWS SSM Parameter Store.
//! [`ParameterStore`] layers the namespace path/tag model on top, and
//! [`SsmStore`] exposes it through the public [`Store`](crate::services::store::Store) trait.

mod client;
mod parameter_store;
mod store;

pub use client::SdkParameterApi;
pub use parameter_store::ParameterStore;
pub use store::SsmStore;

use anyhow::Result;

use crate::paths::{ParameterFilter, Tag};

/// A stored parameter path and its decrypted value.
#[derive(Clone, PartialEq, Eq)]
pub struct Parameter {
    pub path: String,
    pub value: String,
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Result of an attempt to create a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    /// A parameter already exists at the path; nothing was written.
    AlreadyExists,
}

/// Raw operations against the remote parameter store.
///
/// Implementations do not retry. Errors should carry the operation and the
/// path(s) involved.
#[async_trait::async_trait]
pub trait ParameterApi: Send + Sync {
    /// Paths of every parameter matching all `filters`, across all pages.
    async fn describe_parameters(&self, filters: &[ParameterFilter]) -> Result<Vec<String>>;

    /// Decrypted values for the `paths` that exist. Missing paths are omitted.
    async fn get_parameters(&self, paths: &[String]) -> Result<Vec<Parameter>>;

    /// Creates a secure parameter at `path` with `tags` in a single write.
    /// Either both the value and the tags are stored or neither is.
    async fn create_parameter(&self, path: &str, value: &str, tags: &[Tag]) -> Result<CreateOutcome>;

    /// Replaces the value of an existing parameter. Tags are left as they are.
    async fn overwrite_parameter(&self, path: &str, value: &str) -> Result<()>;

    /// Deletes `paths`. Paths that do not exist are ignored.
    async fn delete_parameters(&self, paths: &[String]) -> Result<()>;
}
