//! Resolves command-line flags and the environment into a ready store.

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::debug;

use crate::config::{
    CACHE_NAMESPACE, FedSettings, ID_TOKEN_VAR, KMS_KEY_ID_VAR, cache_root,
};
use crate::infra::awsfed::AwsFed;
use crate::infra::filecache::FileCache;
use crate::infra::ssm::SsmStore;
use crate::namespace::EnvId;
use crate::services::store::Store;
use crate::token::IdToken;

pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// Environments listed when no environment was chosen explicitly.
pub const ALL_ENVIRONMENTS: [&str; 3] = ["dev", "prod", "preview"];

/// Namespace flags shared by every subcommand.
#[derive(Debug, Clone, Default)]
pub struct ConfigFlags {
    pub org_id: Option<String>,
    pub project_id: Option<String>,
    /// `None` when the user did not pass `--environment`.
    pub environment: Option<String>,
    /// Federate without the on-disk credential cache.
    pub no_cache: bool,
}

/// Everything a subcommand needs to run.
#[derive(Clone)]
pub struct CmdConfig {
    pub store: Arc<dyn Store>,
    pub env_id: EnvId,
    /// Environments that listing commands cover.
    pub env_names: Vec<String>,
}

/// Builds the command configuration.
///
/// `bootstrapped` short-circuits all resolution; programs embedding the
/// CLI pass a prebuilt configuration here.
pub async fn gen_config(flags: &ConfigFlags, bootstrapped: Option<CmdConfig>) -> Result<CmdConfig> {
    if let Some(config) = bootstrapped {
        debug!("Using bootstrapped command config");
        return Ok(config);
    }

    let token = match std::env::var(ID_TOKEN_VAR) {
        Ok(raw) if !raw.trim().is_empty() => {
            Some(IdToken::parse(&raw).with_context(|| format!("parsing {ID_TOKEN_VAR}"))?)
        }
        _ => None,
    };

    let (env_id, env_names) = resolve_namespace(flags, token.as_ref())?;

    let fed = AwsFed::connect(FedSettings::from_env()).await;
    let ssm_config = if flags.no_cache {
        fed.gen_ssm_config_uncached(token.as_ref()).await?
    } else {
        let cache = FileCache::new(cache_root(|key| std::env::var(key).ok()), CACHE_NAMESPACE);
        fed.gen_ssm_config(&cache, token.as_ref()).await?
    };
    let ssm_config = ssm_config.with_kms_key_id(std::env::var(KMS_KEY_ID_VAR).ok());

    let store = SsmStore::connect(&ssm_config).await?;

    Ok(CmdConfig {
        store: Arc::new(store),
        env_id,
        env_names,
    })
}

/// Works out the namespace from flags, falling back to the token's
/// organization when `--org-id` is absent.
pub fn resolve_namespace(
    flags: &ConfigFlags,
    token: Option<&IdToken>,
) -> Result<(EnvId, Vec<String>)> {
    let org_id = match (&flags.org_id, token.and_then(IdToken::org_id)) {
        (Some(org_id), _) if !org_id.is_empty() => org_id.clone(),
        (_, Some(org_id)) => org_id.to_string(),
        _ => bail!("organization ID not specified. Pass --org-id or log in with an organization"),
    };

    let project_id = match &flags.project_id {
        Some(project_id) if !project_id.is_empty() => project_id.clone(),
        _ => bail!("project ID not specified. Pass --project-id"),
    };

    let environment = flags
        .environment
        .clone()
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
    let env_id = EnvId::new(org_id, project_id, environment)?;

    let env_names = if flags.environment.is_some() {
        vec![env_id.env()]
    } else {
        ALL_ENVIRONMENTS.iter().map(|e| e.to_string()).collect()
    };

    Ok((env_id, env_names))
}

/// Parses `NAME=VALUE` arguments. The value may itself contain `=`.
/// Naming the same secret twice is an error.
pub fn parse_pairs(pairs: &[String]) -> Result<HashMap<String, String>> {
    let mut values = HashMap::with_capacity(pairs.len());
    for pair in pairs {
        let Some((name, value)) = pair.split_once('=') else {
            bail!("expected NAME=VALUE, got '{pair}'");
        };
        match values.entry(name.to_string()) {
            Entry::Occupied(_) => bail!("secret '{name}' given more than once"),
            Entry::Vacant(slot) => {
                slot.insert(value.to_string());
            }
        }
    }
    Ok(values)
}
