//! Where policy documents come from.

use std::future::Future;
use std::pin::Pin;

use aws_sdk_ssm::Client;

use crate::error::PolicyError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Backing store for policy documents, keyed by logical name.
///
/// Methods return boxed futures for dyn compatibility.
pub trait ParameterSource: Send + Sync {
    /// Fetch the raw policy string for `name`.
    fn fetch(&self, name: &str) -> BoxFuture<'_, Result<String, PolicyError>>;
}

/// SSM Parameter Store source. Policies live under a root path,
/// e.g. root `/sentinel/policies` and name `default` →
/// `/sentinel/policies/default`.
pub struct SsmParameterSource {
    client: Client,
    root: String,
}

impl SsmParameterSource {
    pub fn new(client: Client, root: impl Into<String>) -> Self {
        Self {
            client,
            root: root.into(),
        }
    }

    pub fn from_config(config: &aws_config::SdkConfig, root: impl Into<String>) -> Self {
        Self::new(Client::new(config), root)
    }

    fn parameter_path(&self, name: &str) -> String {
        format!("{}/{}", self.root.trim_end_matches('/'), name)
    }
}

impl ParameterSource for SsmParameterSource {
    fn fetch(&self, name: &str) -> BoxFuture<'_, Result<String, PolicyError>> {
        let path = self.parameter_path(name);
        Box::pin(async move {
            let resp = self
                .client
                .get_parameter()
                .name(&path)
                .with_decryption(true)
                .send()
                .await
                .map_err(|e| {
                    let err = e.into_service_error();
                    if err.is_parameter_not_found() {
                        PolicyError::NotFound(path.clone())
                    } else {
                        PolicyError::Source(err.to_string())
                    }
                })?;

            resp.parameter()
                .and_then(|p| p.value())
                .map(str::to_string)
                .ok_or_else(|| PolicyError::NotFound(path))
        })
    }
}
