use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::types::Credentials;
use aws_sdk_sts::Client as StsClient;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::common::{AuthError, AuthRequest, AuthResult, SignedAssertion, TemporaryCredential};

/// Region used for STS when neither the flag nor the profile provides one
pub const DEFAULT_STS_REGION: &str = "us-east-1";

/// Everything `AssumeRoleWithSAML` needs for one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest<'a> {
    pub principal_arn: &'a str,
    pub role_arn: &'a str,
    pub saml_assertion: &'a str,
    pub profile: &'a str,
    pub region: Option<&'a str>,
    pub duration_seconds: Option<i32>,
}

impl<'a> ExchangeRequest<'a> {
    pub fn new(request: &'a AuthRequest, assertion: &'a SignedAssertion) -> Self {
        Self {
            principal_arn: &assertion.principal_arn,
            role_arn: request.role_arn(),
            saml_assertion: &assertion.saml_response,
            profile: request.profile(),
            region: request.region(),
            duration_seconds: request.duration_seconds(),
        }
    }
}

/// Trades a SAML assertion for temporary credentials
#[async_trait]
pub trait CredentialExchanger: Send + Sync {
    async fn exchange(&self, request: &ExchangeRequest<'_>) -> AuthResult<TemporaryCredential>;
}

/// Exchanger calling AWS STS `AssumeRoleWithSAML`
#[derive(Debug, Clone, Default)]
pub struct StsCredentialExchanger;

impl StsCredentialExchanger {
    pub fn new() -> Self {
        Self
    }

    async fn client(profile: &str, region: Option<&str>) -> StsClient {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).profile_name(profile);
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;

        let config = match config.region() {
            Some(region) => {
                debug!("Using region {} for STS", region);
                config
            }
            None => {
                debug!("No region configured, using {} for STS", DEFAULT_STS_REGION);
                config
                    .into_builder()
                    .region(Region::new(DEFAULT_STS_REGION))
                    .build()
            }
        };

        StsClient::new(&config)
    }
}

#[async_trait]
impl CredentialExchanger for StsCredentialExchanger {
    async fn exchange(&self, request: &ExchangeRequest<'_>) -> AuthResult<TemporaryCredential> {
        info!("Calling AWS STS AssumeRoleWithSAML for {}", request.role_arn);
        debug!("Principal ARN: {}", request.principal_arn);
        debug!("Duration: {:?} seconds", request.duration_seconds);

        let client = Self::client(request.profile, request.region).await;
        let output = client
            .assume_role_with_saml()
            .role_arn(request.role_arn)
            .principal_arn(request.principal_arn)
            .saml_assertion(request.saml_assertion)
            .set_duration_seconds(request.duration_seconds)
            .send()
            .await
            .map_err(|e| AuthError::exchange(DisplayErrorContext(&e).to_string()))?;

        let credentials = output
            .credentials()
            .ok_or_else(|| AuthError::exchange("STS returned no credentials"))?;

        to_temporary_credential(credentials, request.profile)
    }
}

/// Map STS credentials verbatim, keeping the broker's expiration
pub fn to_temporary_credential(
    credentials: &Credentials,
    profile: &str,
) -> AuthResult<TemporaryCredential> {
    let issued = credentials.expiration();
    let expiration = DateTime::<Utc>::from_timestamp(issued.secs(), issued.subsec_nanos())
        .ok_or_else(|| AuthError::exchange(format!("STS returned an invalid expiration: {:?}", issued)))?;

    Ok(TemporaryCredential {
        access_key_id: credentials.access_key_id().to_string(),
        secret_access_key: credentials.secret_access_key().to_string(),
        session_token: credentials.session_token().to_string(),
        expiration: Some(expiration),
        profile: profile.to_string(),
    })
}
