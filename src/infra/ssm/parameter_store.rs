use anyhow::{Context, Result};
use std::collections::HashMap;
use tracing::debug;

use super::{CreateOutcome, ParameterApi};
use crate::namespace::{EnvId, EnvVar};
use crate::paths::{build_filters, build_tags, name_from_path, project_path, var_path};

/// Maps namespace-scoped secret operations onto parameter paths and tags.
pub struct ParameterStore<A> {
    api: A,
}

impl<A: ParameterApi> ParameterStore<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Every secret in the namespace, sorted by name. An empty namespace
    /// yields an empty list.
    #[tracing::instrument(skip(self), fields(env = %env_id))]
    pub async fn list_by_tags(&self, env_id: &EnvId) -> Result<Vec<EnvVar>> {
        let filters = build_filters(env_id);
        debug!(?filters, "Describing parameters");

        let paths = self
            .api
            .describe_parameters(&filters)
            .await
            .with_context(|| format!("listing secrets under '{}'", project_path(env_id)))?;
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let mut vars: Vec<EnvVar> = self
            .api
            .get_parameters(&paths)
            .await
            .with_context(|| format!("reading secrets under '{}'", project_path(env_id)))?
            .into_iter()
            .map(|p| EnvVar::new(name_from_path(&p.path), p.value))
            .collect();
        vars.sort_by(|a, b| a.name.cmp(&b.name));

        debug!(count = vars.len(), "Listed secrets");
        Ok(vars)
    }

    /// The requested secrets that exist, in request order. Names with no
    /// stored value are left out rather than reported as errors.
    #[tracing::instrument(skip(self), fields(env = %env_id))]
    pub async fn get_all(&self, env_id: &EnvId, names: &[String]) -> Result<Vec<EnvVar>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let paths: Vec<String> = names.iter().map(|name| var_path(env_id, name)).collect();
        let mut values: HashMap<String, String> = self
            .api
            .get_parameters(&paths)
            .await
            .with_context(|| format!("reading secrets {names:?} in {env_id}"))?
            .into_iter()
            .map(|p| (p.path, p.value))
            .collect();

        Ok(names
            .iter()
            .zip(&paths)
            .filter_map(|(name, path)| {
                values
                    .remove(path)
                    .map(|value| EnvVar::new(name.as_str(), value))
            })
            .collect())
    }

    /// Creates or overwrites `name` with `value`.
    ///
    /// A new parameter is created together with its namespace tags, so a
    /// failed write never leaves an untagged value that listing cannot see.
    /// An existing parameter only has its value replaced; its tags were
    /// derived from the same path when it was created.
    #[tracing::instrument(skip(self, value), fields(env = %env_id))]
    pub async fn new_parameter(&self, env_id: &EnvId, name: &str, value: &str) -> Result<()> {
        let path = var_path(env_id, name);
        let tags = build_tags(env_id, name);

        let outcome = self
            .api
            .create_parameter(&path, value, &tags)
            .await
            .with_context(|| format!("writing secret '{name}' at '{path}'"))?;

        if outcome == CreateOutcome::AlreadyExists {
            self.api
                .overwrite_parameter(&path, value)
                .await
                .with_context(|| format!("overwriting secret '{name}' at '{path}'"))?;
        }

        debug!(path, ?outcome, "Secret written");
        Ok(())
    }

    /// Deletes `names`. Names that do not exist are not an error.
    #[tracing::instrument(skip(self), fields(env = %env_id))]
    pub async fn delete_all(&self, env_id: &EnvId, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }

        let paths: Vec<String> = names.iter().map(|name| var_path(env_id, name)).collect();
        self.api
            .delete_parameters(&paths)
            .await
            .with_context(|| format!("deleting secrets {names:?} in {env_id}"))?;

        debug!(count = paths.len(), "Secrets deleted");
        Ok(())
    }
}
