//! Runtime configuration.
//!
//! Values come from the process environment (after `.env` is loaded by the
//! binary). Lookups go through a closure so tests can supply their own
//! environment without mutating the process.

use aws_config::BehaviorVersion;
use aws_sdk_ssm::config::{Credentials, Region};
use std::fmt;
use std::path::PathBuf;

/// Environment variable that overrides the current login provider domain.
pub const AUTH_DOMAIN_VAR: &str = "ENVSEC_AUTH_DOMAIN";
pub const CACHE_DIR_VAR: &str = "ENVSEC_CACHE_DIR";
pub const KMS_KEY_ID_VAR: &str = "ENVSEC_KMS_KEY_ID";
pub const ID_TOKEN_VAR: &str = "ENVSEC_ID_TOKEN";

/// Cache namespace under the cache root.
pub const CACHE_NAMESPACE: &str = "jetpack.io/envsec";

const DEFAULT_ACCOUNT_ID: &str = "984256416385";
const DEFAULT_IDENTITY_POOL_ID: &str = "us-west-2:8111c156-085b-4ac5-b94d-f823205f6261";
const DEFAULT_LEGACY_PROVIDER: &str = "auth.jetpack.io";
const DEFAULT_PROVIDER: &str = "accounts.jetpack.io";
const DEFAULT_REGION: &str = "us-west-2";

/// Identity pool coordinates for federation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FedSettings {
    pub account_id: String,
    pub identity_pool_id: String,
    /// Provider key for tokens issued by the legacy auth domain.
    pub legacy_provider: String,
    /// Provider key for every other token.
    pub provider: String,
    pub region: String,
}

impl Default for FedSettings {
    fn default() -> Self {
        Self {
            account_id: DEFAULT_ACCOUNT_ID.to_string(),
            identity_pool_id: DEFAULT_IDENTITY_POOL_ID.to_string(),
            legacy_provider: DEFAULT_LEGACY_PROVIDER.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            region: DEFAULT_REGION.to_string(),
        }
    }
}

impl FedSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut settings = Self::default();
        if let Some(provider) = lookup(AUTH_DOMAIN_VAR).filter(|v| !v.is_empty()) {
            settings.provider = provider;
        }
        settings
    }
}

/// Root directory for the credential cache: `ENVSEC_CACHE_DIR`, then
/// `XDG_CACHE_HOME`, then `~/.cache`. Without a home directory the system
/// temp directory is used.
pub fn cache_root(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(dir) = lookup(CACHE_DIR_VAR).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    if let Some(dir) = lookup("XDG_CACHE_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }
    match lookup("HOME").filter(|v| !v.is_empty()) {
        Some(home) => PathBuf::from(home).join(".cache"),
        None => std::env::temp_dir(),
    }
}

/// How to reach the parameter store.
///
/// An empty `access_key_id` means "use the ambient AWS credential chain".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SsmConfig {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub region: String,
    pub kms_key_id: Option<String>,
}

impl SsmConfig {
    pub fn is_ambient(&self) -> bool {
        self.access_key_id.is_empty()
    }

    pub fn with_kms_key_id(mut self, kms_key_id: Option<String>) -> Self {
        self.kms_key_id = kms_key_id.filter(|id| !id.is_empty());
        self
    }

    /// Builds the SDK configuration these settings describe.
    pub async fn sdk_config(&self) -> aws_config::SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if !self.region.is_empty() {
            loader = loader.region(Region::new(self.region.clone()));
        }
        if !self.is_ambient() {
            let session_token = Some(self.session_token.clone()).filter(|t| !t.is_empty());
            loader = loader.credentials_provider(Credentials::new(
                self.access_key_id.clone(),
                self.secret_access_key.clone(),
                session_token,
                None,
                "envsec-federation",
            ));
        }
        loader.load().await
    }
}

impl fmt::Debug for SsmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SsmConfig")
            .field("access_key_id", &self.access_key_id)
            .field("region", &self.region)
            .field("kms_key_id", &self.kms_key_id)
            .finish_non_exhaustive()
    }
}
