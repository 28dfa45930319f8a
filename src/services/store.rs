//! The namespace-scoped secret store contract.

use anyhow::Result;
use std::collections::HashMap;

use crate::namespace::{EnvId, EnvVar};

/// Namespace-scoped CRUD over secrets.
///
/// A missing secret is never an error: reads return an empty value (or omit
/// the name) and deletes succeed. Batch writes are not atomic.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// All secrets in the namespace.
    async fn list(&self, env_id: &EnvId) -> Result<Vec<EnvVar>>;

    /// The value of `name`, or an empty string if it is not set.
    async fn get(&self, env_id: &EnvId, name: &str) -> Result<String>;

    /// The subset of `names` that are set.
    async fn get_all(&self, env_id: &EnvId, names: &[String]) -> Result<Vec<EnvVar>>;

    /// Creates or overwrites one secret.
    async fn set(&self, env_id: &EnvId, name: &str, value: &str) -> Result<()>;

    /// Sets every entry, continuing past failures.
    ///
    /// # Errors
    ///
    /// Returns a [`SetAllError`](crate::error::SetAllError) listing every
    /// entry that could not be written. The others stay written.
    async fn set_all(&self, env_id: &EnvId, values: &HashMap<String, String>) -> Result<()>;

    async fn delete(&self, env_id: &EnvId, name: &str) -> Result<()>;

    async fn delete_all(&self, env_id: &EnvId, names: &[String]) -> Result<()>;
}
