use chrono::{DateTime, Utc};

use super::error::{AuthError, AuthResult};

/// Bounds STS accepts for `DurationSeconds`
pub const MIN_DURATION_SECONDS: i32 = 900;
pub const MAX_DURATION_SECONDS: i32 = 43_200;

/// One credential acquisition, assembled once from the command line.
///
/// Fields are only reachable through the validating constructor and builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    /// Role ARN to assume
    role_arn: String,

    /// Google Workspace IdP identifier (`idpid`)
    idp_id: String,

    /// Google Workspace SP identifier (`spid`)
    sp_id: String,

    /// Email address to pre-fill on the sign-in page
    username: Option<String>,

    /// Cache section and AWS config profile
    profile: String,

    /// Delete the browser session directory before and after sign-in
    clean: bool,

    /// Region override for the STS client
    region: Option<String>,

    /// Requested session duration, STS default when unset
    duration_seconds: Option<i32>,
}

impl AuthRequest {
    pub fn new(
        role_arn: impl Into<String>,
        idp_id: impl Into<String>,
        sp_id: impl Into<String>,
        profile: impl Into<String>,
    ) -> AuthResult<Self> {
        let request = Self {
            role_arn: role_arn.into(),
            idp_id: idp_id.into(),
            sp_id: sp_id.into(),
            username: None,
            profile: profile.into(),
            clean: false,
            region: None,
            duration_seconds: None,
        };

        require("aws role arn", &request.role_arn)?;
        require("idp id", &request.idp_id)?;
        require("sp id", &request.sp_id)?;
        require("aws profile", &request.profile)?;

        Ok(request)
    }

    pub fn with_username(mut self, username: Option<String>) -> Self {
        self.username = username.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn with_clean(mut self, clean: bool) -> Self {
        self.clean = clean;
        self
    }

    pub fn with_region(mut self, region: Option<String>) -> Self {
        self.region = region.filter(|r| !r.trim().is_empty());
        self
    }

    pub fn with_duration_seconds(mut self, duration_seconds: Option<i32>) -> AuthResult<Self> {
        if let Some(seconds) = duration_seconds {
            if !(MIN_DURATION_SECONDS..=MAX_DURATION_SECONDS).contains(&seconds) {
                return Err(AuthError::config(format!(
                    "duration seconds must be between {} and {}, got {}",
                    MIN_DURATION_SECONDS, MAX_DURATION_SECONDS, seconds
                )));
            }
        }
        self.duration_seconds = duration_seconds;
        Ok(self)
    }

    pub fn role_arn(&self) -> &str {
        &self.role_arn
    }

    pub fn idp_id(&self) -> &str {
        &self.idp_id
    }

    pub fn sp_id(&self) -> &str {
        &self.sp_id
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn clean(&self) -> bool {
        self.clean
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn duration_seconds(&self) -> Option<i32> {
        self.duration_seconds
    }
}

fn require(name: &str, value: &str) -> AuthResult<()> {
    if value.trim().is_empty() {
        return Err(AuthError::config(format!("{} must not be empty", name)));
    }
    Ok(())
}

/// Captured assertion and the SAML provider paired with the requested role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAssertion {
    /// Base64 `SAMLResponse` exactly as posted to the AWS sign-in endpoint
    pub saml_response: String,

    /// `arn:aws:iam::<account>:saml-provider/<name>`
    pub principal_arn: String,
}

/// Role ARNs rendered on the AWS role selection page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateRoleSet {
    roles: Vec<String>,
}

impl CandidateRoleSet {
    pub fn new(roles: Vec<String>) -> Self {
        Self { roles }
    }

    pub fn contains(&self, role_arn: &str) -> bool {
        self.roles.iter().any(|r| r == role_arn)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

/// Temporary AWS credentials owned by a profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemporaryCredential {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: Option<DateTime<Utc>>,
    pub profile: String,
}

impl TemporaryCredential {
    pub fn empty(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            ..Default::default()
        }
    }

    /// Returns the expiration when every value field is set, otherwise the first missing field
    pub fn validate(&self) -> AuthResult<DateTime<Utc>> {
        if self.access_key_id.is_empty() {
            return Err(AuthError::validation("access key id"));
        }
        if self.secret_access_key.is_empty() {
            return Err(AuthError::validation("secret access key"));
        }
        if self.session_token.is_empty() {
            return Err(AuthError::validation("session token"));
        }
        self.expiration.ok_or_else(|| AuthError::validation("expiration"))
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.validate() {
            Ok(expiration) => expiration <= now,
            Err(_) => true,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
