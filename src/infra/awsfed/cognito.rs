use anyhow::{Result, anyhow};
use aws_config::BehaviorVersion;
use aws_sdk_cognitoidentity::config::Region;
use chrono::DateTime;
use std::collections::HashMap;

use super::{Credentials, IdentityPool};

/// [`IdentityPool`] backed by Amazon Cognito Identity.
///
/// Both calls are unsigned: the login token in `logins` is the credential.
pub struct CognitoPool {
    client: aws_sdk_cognitoidentity::Client,
}

impl CognitoPool {
    pub async fn new(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .no_credentials()
            .load()
            .await;
        Self {
            client: aws_sdk_cognitoidentity::Client::new(&config),
        }
    }
}

#[async_trait::async_trait]
impl IdentityPool for CognitoPool {
    async fn get_id(
        &self,
        account_id: &str,
        identity_pool_id: &str,
        logins: &HashMap<String, String>,
    ) -> Result<String> {
        let resp = self
            .client
            .get_id()
            .account_id(account_id)
            .identity_pool_id(identity_pool_id)
            .set_logins(Some(logins.clone()))
            .send()
            .await?;

        resp.identity_id()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Cognito GetId returned no identity id"))
    }

    async fn get_credentials_for_identity(
        &self,
        identity_id: &str,
        logins: &HashMap<String, String>,
    ) -> Result<Credentials> {
        let resp = self
            .client
            .get_credentials_for_identity()
            .identity_id(identity_id)
            .set_logins(Some(logins.clone()))
            .send()
            .await?;

        let creds = resp
            .credentials()
            .ok_or_else(|| anyhow!("Cognito returned no credentials for identity '{identity_id}'"))?;
        let missing = |field: &str| anyhow!("Cognito credentials are missing {field}");

        let expiration = creds
            .expiration()
            .and_then(|exp| DateTime::from_timestamp(exp.secs(), exp.subsec_nanos()))
            .ok_or_else(|| missing("expiration"))?;

        Ok(Credentials {
            access_key_id: creds
                .access_key_id()
                .ok_or_else(|| missing("access key id"))?
                .to_string(),
            secret_key: creds
                .secret_key()
                .ok_or_else(|| missing("secret key"))?
                .to_string(),
            session_token: creds
                .session_token()
                .ok_or_else(|| missing("session token"))?
                .to_string(),
            expiration,
        })
    }
}
