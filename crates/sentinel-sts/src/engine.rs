use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use jiff::Timestamp;

use sentinel_core::identity::{self, SourceIdentity};

use crate::error::StsError;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Issued credentials are valid for one hour unless the caller says
/// otherwise.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::from_secs(3600);

/// One credential issuance.
#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub role_arn: String,
    /// Raw principal name; sanitized into the SourceIdentity.
    pub user: String,
    /// Zero means [`DEFAULT_SESSION_DURATION`].
    pub session_duration: Duration,
    pub external_id: Option<String>,
    /// Pre-supplied 8-hex request id; a fresh one is generated if absent.
    pub request_id: Option<String>,
    /// The approval backing this issuance, if any. Flows into the
    /// SourceIdentity's approval segment.
    pub approval_id: Option<String>,
}

impl IssueRequest {
    pub fn new(role_arn: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            role_arn: role_arn.into(),
            user: user.into(),
            session_duration: Duration::ZERO,
            external_id: None,
            request_id: None,
            approval_id: None,
        }
    }
}

/// Temporary credentials plus the identity context they carry.
///
/// Every successful issuance has a non-empty `source_identity`.
#[derive(Debug, Clone)]
pub struct IssuedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Timestamp,
    pub source_identity: String,
    pub assumed_role_arn: String,
}

/// Exchanges an issue request for credentials. Methods return boxed
/// futures for dyn compatibility; the server pipeline is tested against a
/// static implementation of this trait.
pub trait CredentialIssuer: Send + Sync {
    fn issue(&self, request: IssueRequest) -> BoxFuture<'_, Result<IssuedCredentials, StsError>>;
}

/// Compose the stamp for a request, generating a request id if the caller
/// did not supply one. Shared by the real engine and the server pipeline
/// (which needs the request id before the STS call for its audit entry).
pub fn compose_identity(request: &IssueRequest) -> Result<SourceIdentity, StsError> {
    let request_id = match &request.request_id {
        Some(id) => id.clone(),
        None => identity::new_request_id(),
    };
    Ok(SourceIdentity::new(
        &request.user,
        request.approval_id.as_deref(),
        &request_id,
    )?)
}

fn validate(request: &IssueRequest) -> Result<(), StsError> {
    if request.role_arn.is_empty() {
        return Err(StsError::Validation("role ARN is empty".to_string()));
    }
    if request.user.is_empty() {
        return Err(StsError::Validation("user is empty".to_string()));
    }
    Ok(())
}

/// Production engine backed by the AWS STS SDK.
pub struct StsIssuer {
    sts: aws_sdk_sts::Client,
}

impl StsIssuer {
    /// Build from an SDK config carrying the base credentials provider.
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            sts: aws_sdk_sts::Client::new(config),
        }
    }

    async fn assume(
        &self,
        request: IssueRequest,
    ) -> Result<IssuedCredentials, StsError> {
        validate(&request)?;

        // Compose first: if the stamp is invalid, no STS call happens.
        let source_identity = compose_identity(&request)?.to_string();

        let duration = if request.session_duration.is_zero() {
            DEFAULT_SESSION_DURATION
        } else {
            request.session_duration
        };
        let session_name = format!("sentinel-{}", Timestamp::now().as_nanosecond());

        tracing::info!(
            role_arn = %request.role_arn,
            source_identity = %source_identity,
            duration_secs = duration.as_secs(),
            "assuming target role"
        );

        let mut req = self
            .sts
            .assume_role()
            .role_arn(&request.role_arn)
            .role_session_name(&session_name)
            .duration_seconds(duration.as_secs() as i32)
            .source_identity(&source_identity);
        if let Some(external_id) = &request.external_id {
            req = req.external_id(external_id);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| StsError::AssumeRole(e.into_service_error().to_string()))?;

        let creds = resp.credentials().ok_or_else(|| {
            StsError::MalformedResponse("AssumeRole returned no credentials".to_string())
        })?;

        let expiration = Timestamp::from_second(creds.expiration().secs())
            .map_err(|e| StsError::MalformedResponse(e.to_string()))?;

        let assumed_role_arn = resp
            .assumed_role_user()
            .map(|u| u.arn().to_string())
            .unwrap_or_default();

        Ok(IssuedCredentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expiration,
            source_identity,
            assumed_role_arn,
        })
    }
}

impl CredentialIssuer for StsIssuer {
    fn issue(&self, request: IssueRequest) -> BoxFuture<'_, Result<IssuedCredentials, StsError>> {
        Box::pin(self.assume(request))
    }
}
