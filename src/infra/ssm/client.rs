use anyhow::{Context, Result};
use aws_sdk_ssm::operation::put_parameter::PutParameterError;
use aws_sdk_ssm::types::{ParameterStringFilter, ParameterType};
use tracing::debug;

use super::{CreateOutcome, Parameter, ParameterApi};
use crate::paths::{ParameterFilter, Tag};

// GetParameters and DeleteParameters accept at most 10 names per call.
const MAX_NAMES_PER_CALL: usize = 10;

/// [`ParameterApi`] backed by AWS SSM Parameter Store.
///
/// Values are written as `SecureString` and read with decryption enabled, so
/// the credentials in use need the matching KMS permissions as well as the
/// `ssm:*Parameter*` actions on the namespace paths.
pub struct SdkParameterApi {
    client: aws_sdk_ssm::Client,
    kms_key_id: Option<String>,
}

impl SdkParameterApi {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
            kms_key_id: None,
        }
    }

    /// Encrypts new values with `kms_key_id` instead of the account default key.
    pub fn with_kms_key_id(mut self, kms_key_id: Option<String>) -> Self {
        self.kms_key_id = kms_key_id.filter(|id| !id.is_empty());
        self
    }
}

fn to_sdk_filter(filter: &ParameterFilter) -> Result<ParameterStringFilter> {
    ParameterStringFilter::builder()
        .key(&filter.key)
        .set_option(filter.option.clone())
        .set_values(Some(filter.values.clone()))
        .build()
        .with_context(|| format!("invalid SSM parameter filter '{}'", filter.key))
}

fn to_sdk_tag(tag: &Tag) -> Result<aws_sdk_ssm::types::Tag> {
    aws_sdk_ssm::types::Tag::builder()
        .key(&tag.key)
        .value(&tag.value)
        .build()
        .with_context(|| format!("invalid SSM tag '{}'", tag.key))
}

#[async_trait::async_trait]
impl ParameterApi for SdkParameterApi {
    async fn describe_parameters(&self, filters: &[ParameterFilter]) -> Result<Vec<String>> {
        let filters = filters
            .iter()
            .map(to_sdk_filter)
            .collect::<Result<Vec<_>>>()?;

        let mut paths = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let resp = self
                .client
                .describe_parameters()
                .set_parameter_filters(Some(filters.clone()))
                .set_next_token(next_token.take())
                .send()
                .await
                .context("SSM DescribeParameters failed")?;

            paths.extend(
                resp.parameters()
                    .iter()
                    .filter_map(|p| p.name().map(str::to_string)),
            );

            match resp.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(paths)
    }

    async fn get_parameters(&self, paths: &[String]) -> Result<Vec<Parameter>> {
        let mut found = Vec::with_capacity(paths.len());
        for chunk in paths.chunks(MAX_NAMES_PER_CALL) {
            let resp = self
                .client
                .get_parameters()
                .set_names(Some(chunk.to_vec()))
                .with_decryption(true)
                .send()
                .await
                .with_context(|| format!("SSM GetParameters failed for {chunk:?}"))?;

            if !resp.invalid_parameters().is_empty() {
                debug!(missing = ?resp.invalid_parameters(), "Parameters not found");
            }

            found.extend(resp.parameters().iter().filter_map(|p| {
                Some(Parameter {
                    path: p.name()?.to_string(),
                    value: p.value().unwrap_or_default().to_string(),
                })
            }));
        }
        Ok(found)
    }

    async fn create_parameter(&self, path: &str, value: &str, tags: &[Tag]) -> Result<CreateOutcome> {
        let tags = tags.iter().map(to_sdk_tag).collect::<Result<Vec<_>>>()?;

        // Tags are only accepted on creation, which makes value and tags one write.
        let resp = self
            .client
            .put_parameter()
            .name(path)
            .value(value)
            .r#type(ParameterType::SecureString)
            .overwrite(false)
            .set_key_id(self.kms_key_id.clone())
            .set_tags((!tags.is_empty()).then_some(tags))
            .send()
            .await;

        match resp {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(e)
                if e.as_service_error()
                    .is_some_and(PutParameterError::is_parameter_already_exists) =>
            {
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(e) => Err(e).with_context(|| format!("SSM PutParameter failed for '{path}'")),
        }
    }

    async fn overwrite_parameter(&self, path: &str, value: &str) -> Result<()> {
        self.client
            .put_parameter()
            .name(path)
            .value(value)
            .r#type(ParameterType::SecureString)
            .overwrite(true)
            .set_key_id(self.kms_key_id.clone())
            .send()
            .await
            .with_context(|| format!("SSM PutParameter (overwrite) failed for '{path}'"))?;
        Ok(())
    }

    async fn delete_parameters(&self, paths: &[String]) -> Result<()> {
        for chunk in paths.chunks(MAX_NAMES_PER_CALL) {
            let resp = self
                .client
                .delete_parameters()
                .set_names(Some(chunk.to_vec()))
                .send()
                .await
                .with_context(|| format!("SSM DeleteParameters failed for {chunk:?}"))?;

            if !resp.invalid_parameters().is_empty() {
                debug!(missing = ?resp.invalid_parameters(), "Parameters already absent");
            }
        }
        Ok(())
    }
}
