//! Tenant namespace and secret entry types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::PathError;
use crate::paths::validate_segment;

/// Identifies the (organization, project, environment) scope of a set of secrets.
///
/// `env_name` keeps whatever casing the caller supplied; every path and tag
/// derived from it goes through [`EnvId::env`], which lower-cases it.
///
/// Fields are private so that every value has passed [`EnvId::validate`],
/// including values read back through serde.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawEnvId")]
pub struct EnvId {
    org_id: String,
    project_id: String,
    env_name: String,
}

#[derive(Deserialize)]
struct RawEnvId {
    org_id: String,
    #[serde(default)]
    project_id: String,
    #[serde(default)]
    env_name: String,
}

impl TryFrom<RawEnvId> for EnvId {
    type Error = PathError;

    fn try_from(raw: RawEnvId) -> Result<Self, Self::Error> {
        Self::new(raw.org_id, raw.project_id, raw.env_name)
    }
}

impl EnvId {
    /// Builds a namespace for the normal (org-scoped) flow.
    ///
    /// # Errors
    ///
    /// Returns [`PathError`] if `org_id` is empty or any non-empty field is
    /// not usable as a single path segment.
    pub fn new(
        org_id: impl Into<String>,
        project_id: impl Into<String>,
        env_name: impl Into<String>,
    ) -> Result<Self, PathError> {
        let id = Self {
            org_id: org_id.into(),
            project_id: project_id.into(),
            env_name: env_name.into(),
        };
        id.validate()?;
        Ok(id)
    }

    /// Checks that the org is set and every non-empty field is a single
    /// path segment.
    pub fn validate(&self) -> Result<(), PathError> {
        if self.org_id.is_empty() {
            return Err(PathError::Empty { kind: "org id" });
        }
        validate_segment("org id", &self.org_id)?;
        if !self.project_id.is_empty() {
            validate_segment("project id", &self.project_id)?;
        }
        if !self.env_name.is_empty() {
            validate_segment("environment name", &self.env_name)?;
        }
        Ok(())
    }

    /// The same organization and project in another environment.
    pub fn with_env(&self, env_name: impl Into<String>) -> Result<Self, PathError> {
        Self::new(self.org_id.clone(), self.project_id.clone(), env_name)
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// The environment name as supplied, before normalization.
    pub fn env_name(&self) -> &str {
        &self.env_name
    }

    /// The normalized environment name used in paths and tags.
    pub fn env(&self) -> String {
        normalize_env(&self.env_name)
    }
}

impl fmt::Display for EnvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.org_id, self.project_id, self.env())
    }
}

/// Lower-cases an environment name. Idempotent.
pub fn normalize_env(env_name: &str) -> String {
    env_name.to_lowercase()
}

/// A named secret and its plaintext value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvVar")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}
