//! Hierarchical parameter paths and tags for a namespace.
//!
//! Every stored secret lives at
//! `/jetpack-data/env/<org>/<project>/<project>/<env>/<name>`. The project
//! segment appears twice; existing stored data depends on that layout.
//! Directory-level paths carry a trailing `/` because the remote store's
//! prefix permissions are granted on them.

use crate::error::PathError;
use crate::namespace::EnvId;

pub const PATH_PREFIX: &str = "/jetpack-data/env";

pub const TAG_PROJECT_ID: &str = "project-id";
pub const TAG_ORG_ID: &str = "org-id";
pub const TAG_ENV_NAME: &str = "env-name";
pub const TAG_NAME: &str = "name";

/// A key/value tag attached to a stored parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    fn new(key: &str, value: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}

/// A describe-parameters filter. All filters in a request must match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterFilter {
    pub key: String,
    pub option: Option<String>,
    pub values: Vec<String>,
}

impl ParameterFilter {
    /// Matches every parameter below `path`, at any depth.
    pub fn recursive_path(path: String) -> Self {
        Self {
            key: "Path".to_string(),
            option: Some("Recursive".to_string()),
            values: vec![path],
        }
    }

    /// Matches parameters carrying tag `key` with `value`.
    pub fn tag(key: &str, value: &str) -> Self {
        Self {
            key: format!("tag:{key}"),
            option: None,
            values: vec![value.to_string()],
        }
    }

    /// The tag key this filter applies to, if it is a tag filter.
    pub fn tag_key(&self) -> Option<&str> {
        self.key.strip_prefix("tag:")
    }
}

/// Rejects values that would change the shape of a path when joined.
pub fn validate_segment(kind: &'static str, value: &str) -> Result<(), PathError> {
    if value.is_empty() {
        return Err(PathError::Empty { kind });
    }
    if value.contains('/') {
        return Err(PathError::Separator {
            kind,
            value: value.to_string(),
        });
    }
    if value == "." || value == ".." {
        return Err(PathError::Reserved {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

// Empty segments are skipped so an unset field never yields `//`.
fn join(base: &str, segments: &[&str]) -> String {
    let mut out = base.trim_end_matches('/').to_string();
    for segment in segments.iter().filter(|s| !s.is_empty()) {
        out.push('/');
        out.push_str(segment);
    }
    out
}

pub fn org_path(env_id: &EnvId) -> String {
    join(PATH_PREFIX, &[env_id.org_id()]) + "/"
}

pub fn project_path(env_id: &EnvId) -> String {
    join(&org_path(env_id), &[env_id.project_id()]) + "/"
}

pub fn env_path(env_id: &EnvId) -> String {
    join(&project_path(env_id), &[env_id.env().as_str()]) + "/"
}

pub fn var_path(env_id: &EnvId, name: &str) -> String {
    let env = env_id.env();
    join(
        &project_path(env_id),
        &[env_id.project_id(), env.as_str(), name],
    )
}

/// Returns the trailing segment of a parameter path.
pub fn name_from_path(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or("")
}

/// Tags for a parameter: only the non-empty namespace fields, plus `name`
/// when one is given.
pub fn build_tags(env_id: &EnvId, name: &str) -> Vec<Tag> {
    let mut tags = Vec::with_capacity(4);
    if !env_id.project_id().is_empty() {
        tags.push(Tag::new(TAG_PROJECT_ID, env_id.project_id()));
    }
    if !env_id.org_id().is_empty() {
        tags.push(Tag::new(TAG_ORG_ID, env_id.org_id()));
    }
    let env = env_id.env();
    if !env.is_empty() {
        tags.push(Tag::new(TAG_ENV_NAME, &env));
    }
    if !name.is_empty() {
        tags.push(Tag::new(TAG_NAME, name));
    }
    tags
}

/// Filters selecting every parameter of a namespace: a recursive path filter
/// at the project level plus one tag filter per non-empty namespace field.
pub fn build_filters(env_id: &EnvId) -> Vec<ParameterFilter> {
    let mut filters = vec![ParameterFilter::recursive_path(project_path(env_id))];
    if !env_id.project_id().is_empty() {
        filters.push(ParameterFilter::tag(TAG_PROJECT_ID, env_id.project_id()));
    }
    if !env_id.org_id().is_empty() {
        filters.push(ParameterFilter::tag(TAG_ORG_ID, env_id.org_id()));
    }
    let env = env_id.env();
    if !env.is_empty() {
        filters.push(ParameterFilter::tag(TAG_ENV_NAME, &env));
    }
    filters
}
