//! The identity token handed to federation.
//!
//! Tokens reach this crate already verified by the login layer, so parsing
//! only decodes the JWT payload to read the claims federation needs. No
//! signature check happens here.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use std::fmt;

#[derive(Deserialize)]
struct Claims {
    #[serde(default)]
    iss: String,
    #[serde(default)]
    org_id: Option<String>,
}

/// A verified identity token and the claims federation depends on.
#[derive(Clone)]
pub struct IdToken {
    raw: String,
    issuer: String,
    org_id: Option<String>,
}

impl IdToken {
    pub fn new(raw: impl Into<String>, issuer: impl Into<String>, org_id: Option<String>) -> Self {
        Self {
            raw: raw.into(),
            issuer: issuer.into(),
            org_id: org_id.filter(|id| !id.is_empty()),
        }
    }

    /// Reads `iss` and `org_id` from the payload of a compact JWT.
    ///
    /// # Errors
    ///
    /// Returns an error if `raw` is not three dot-separated segments or the
    /// payload is not base64url-encoded JSON.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() != 3 {
            bail!("identity token is not a JWT ({} segments)", segments.len());
        }

        let payload = URL_SAFE_NO_PAD
            .decode(segments[1].trim_end_matches('='))
            .context("identity token payload is not base64url")?;
        let claims: Claims =
            serde_json::from_slice(&payload).context("identity token payload is not JSON")?;

        Ok(Self::new(raw, claims.iss, claims.org_id))
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn org_id(&self) -> Option<&str> {
        self.org_id.as_deref()
    }
}

impl fmt::Debug for IdToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdToken")
            .field("issuer", &self.issuer)
            .field("org_id", &self.org_id)
            .finish_non_exhaustive()
    }
}
