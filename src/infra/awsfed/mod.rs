//! Federation of identity tokens into temporary AWS credentials.
//!
//! A token is exchanged through an identity pool in two calls: resolve the
//! identity id, then fetch credentials for it. [`AwsFed::credentials`] puts
//! a file cache in front of the exchange for single-user CLI use.
//! [`AwsFed::credentials_uncached`] never touches disk and is the only safe
//! entry point for a service acting on behalf of many users.

mod cognito;

pub use cognito::CognitoPool;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::{FedSettings, SsmConfig};
use crate::infra::filecache::FileCache;
use crate::paths::validate_segment;
use crate::token::IdToken;

pub const CACHE_KEY_PREFIX: &str = "awsfed";

/// Temporary AWS credentials. Serialized as JSON when cached.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
}

impl Credentials {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration <= now
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("expiration", &self.expiration)
            .finish_non_exhaustive()
    }
}

/// The login provider a token is presented under.
///
/// Tokens from the legacy auth domain must keep using the legacy provider
/// key until that domain is retired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginProvider {
    Legacy(String),
    Current(String),
}

impl LoginProvider {
    pub fn select(settings: &FedSettings, issuer: &str) -> Self {
        if issuer == format!("https://{}/", settings.legacy_provider) {
            Self::Legacy(settings.legacy_provider.clone())
        } else {
            Self::Current(settings.provider.clone())
        }
    }

    pub fn domain(&self) -> &str {
        match self {
            Self::Legacy(domain) | Self::Current(domain) => domain,
        }
    }

    /// The logins map for the exchange: exactly one provider key.
    pub fn logins(&self, raw_token: &str) -> HashMap<String, String> {
        HashMap::from([(self.domain().to_string(), raw_token.to_string())])
    }
}

/// Cache key for a token: its organization when it names one that is usable
/// as a file name, otherwise a hash of the token itself.
pub fn cache_key(token: &IdToken) -> String {
    let id = match token.org_id() {
        Some(org_id) if validate_segment("org id", org_id).is_ok() => org_id.to_string(),
        _ => hex::encode(Sha256::digest(token.raw().as_bytes())),
    };
    format!("{CACHE_KEY_PREFIX}-{id}")
}

/// An identity pool that trades login tokens for credentials.
#[async_trait::async_trait]
pub trait IdentityPool: Send + Sync {
    async fn get_id(
        &self,
        account_id: &str,
        identity_pool_id: &str,
        logins: &HashMap<String, String>,
    ) -> Result<String>;

    async fn get_credentials_for_identity(
        &self,
        identity_id: &str,
        logins: &HashMap<String, String>,
    ) -> Result<Credentials>;
}

pub struct AwsFed<P> {
    settings: FedSettings,
    pool: P,
}

impl AwsFed<CognitoPool> {
    /// Federates through Cognito in the configured region.
    pub async fn connect(settings: FedSettings) -> Self {
        let pool = CognitoPool::new(&settings.region).await;
        Self::new(settings, pool)
    }
}

impl<P: IdentityPool> AwsFed<P> {
    pub fn new(settings: FedSettings, pool: P) -> Self {
        Self { settings, pool }
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// Returns credentials for `token`, reusing a cached set while it is
    /// still valid.
    ///
    /// Unreadable, undecodable or expired cache entries fall through to a
    /// fresh exchange. A failure to write the new credentials back to the
    /// cache is returned as an error.
    #[tracing::instrument(skip_all, fields(issuer = token.issuer()))]
    pub async fn credentials(&self, cache: &FileCache, token: &IdToken) -> Result<Credentials> {
        let key = cache_key(token);

        if let Some(creds) = cached_credentials(cache, &key) {
            debug!(key, expiration = %creds.expiration, "Using cached credentials");
            return Ok(creds);
        }

        let creds = self.exchange(token).await?;

        let blob = serde_json::to_vec(&creds)?;
        cache
            .set(&key, &blob, creds.expiration)
            .with_context(|| format!("caching federated credentials under '{key}'"))?;

        Ok(creds)
    }

    /// Returns fresh credentials for `token` without reading or writing any cache.
    #[tracing::instrument(skip_all, fields(issuer = token.issuer()))]
    pub async fn credentials_uncached(&self, token: &IdToken) -> Result<Credentials> {
        self.exchange(token).await
    }

    async fn exchange(&self, token: &IdToken) -> Result<Credentials> {
        let provider = LoginProvider::select(&self.settings, token.issuer());
        let logins = provider.logins(token.raw());

        let identity_id = self
            .pool
            .get_id(
                &self.settings.account_id,
                &self.settings.identity_pool_id,
                &logins,
            )
            .await?;
        let creds = self
            .pool
            .get_credentials_for_identity(&identity_id, &logins)
            .await?;

        info!(
            provider = ?provider,
            expiration = %creds.expiration,
            "Federated identity token"
        );
        Ok(creds)
    }

    /// SSM connection settings for `creds` in the federation region.
    pub fn ssm_config(&self, creds: &Credentials) -> SsmConfig {
        SsmConfig {
            access_key_id: creds.access_key_id.clone(),
            secret_access_key: creds.secret_key.clone(),
            session_token: creds.session_token.clone(),
            region: self.settings.region.clone(),
            kms_key_id: None,
        }
    }

    /// SSM settings for a CLI user. Without a token the ambient AWS
    /// credential chain is used.
    pub async fn gen_ssm_config(&self, cache: &FileCache, token: Option<&IdToken>) -> Result<SsmConfig> {
        match token {
            None => Ok(SsmConfig::default()),
            Some(token) => Ok(self.ssm_config(&self.credentials(cache, token).await?)),
        }
    }

    /// SSM settings for one request of a multi-user service. Never cached.
    pub async fn gen_ssm_config_uncached(&self, token: Option<&IdToken>) -> Result<SsmConfig> {
        match token {
            None => Ok(SsmConfig::default()),
            Some(token) => Ok(self.ssm_config(&self.credentials_uncached(token).await?)),
        }
    }
}

fn cached_credentials(cache: &FileCache, key: &str) -> Option<Credentials> {
    let entry = match cache.get(key) {
        Ok(Some(entry)) => entry,
        Ok(None) => return None,
        Err(e) => {
            warn!(key, error = %format!("{e:#}"), "Ignoring unreadable credential cache entry");
            return None;
        }
    };

    let now = Utc::now();
    if entry.is_expired(now) {
        debug!(key, expiration = %entry.expiration, "Cached credentials expired");
        return None;
    }

    match serde_json::from_slice::<Credentials>(&entry.data) {
        Ok(creds) if !creds.is_expired(now) => Some(creds),
        Ok(_) => {
            debug!(key, "Cached credentials expired");
            None
        }
        Err(e) => {
            warn!(key, error = %e, "Ignoring undecodable credential cache entry");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> FedSettings {
        FedSettings::default()
    }

    #[test]
    fn test_legacy_issuer_selects_legacy_provider() {
        let provider = LoginProvider::select(&settings(), "https://auth.jetpack.io/");
        assert_eq!(provider, LoginProvider::Legacy("auth.jetpack.io".to_string()));

        let logins = provider.logins("raw");
        assert_eq!(logins.len(), 1);
        assert_eq!(logins.get("auth.jetpack.io").map(String::as_str), Some("raw"));
    }

    #[test]
    fn test_other_issuers_select_current_provider() {
        for issuer in [
            "https://accounts.jetpack.io/",
            "https://auth.jetpack.io",
            "auth.jetpack.io",
            "",
        ] {
            let provider = LoginProvider::select(&settings(), issuer);
            assert_eq!(provider, LoginProvider::Current("accounts.jetpack.io".to_string()));
            let logins = provider.logins("raw");
            assert_eq!(logins.len(), 1);
            assert!(logins.contains_key("accounts.jetpack.io"));
        }
    }

    #[test]
    fn test_cache_key_prefers_org_claim() {
        let tok = IdToken::new("raw", "iss", Some("org_123".to_string()));
        assert_eq!(cache_key(&tok), "awsfed-org_123");
    }

    #[test]
    fn test_cache_key_falls_back_to_token_hash() {
        let tok = IdToken::new("abc", "iss", None);
        assert_eq!(
            cache_key(&tok),
            "awsfed-ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_cache_key_hashes_unusable_org_claim() {
        for org_id in ["a/b", "..", "."] {
            let tok = IdToken::new("abc", "iss", Some(org_id.to_string()));
            assert_eq!(
                cache_key(&tok),
                "awsfed-ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
            );
        }
    }

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let creds = Credentials {
            access_key_id: "AKIA".to_string(),
            secret_key: "s3cret".to_string(),
            session_token: "session".to_string(),
            expiration: Utc::now(),
        };
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("AKIA"));
        assert!(!rendered.contains("s3cret"));
        assert!(!rendered.contains("session\""));
    }
}
