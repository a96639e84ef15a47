use async_trait::async_trait;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use crate::common::{AuthError, AuthRequest, AuthResult, CandidateRoleSet, SignedAssertion};

pub mod assertion;
pub mod browser;
pub mod playwright;

use assertion::DecodedAssertion;
use browser::BrowserDriver;

/// Assertion consumer endpoint the IdP posts the SAML response to
pub const AWS_SAML_SIGNIN_URL: &str = "https://signin.aws.amazon.com/saml";

/// IdP-initiated SSO entry point for Google Workspace
pub const GOOGLE_INIT_SSO_URL: &str = "https://accounts.google.com/o/saml2/initsso";

const EMAIL_INPUT_SELECTOR: &str = r#"input[type="email"]"#;
const ROLE_LABEL_SELECTOR: &str = r#"label[for*="arn"]"#;
const SAML_RESPONSE_PARAM: &str = "SAMLResponse";

/// Produces a signed assertion for the requested role
#[async_trait]
pub trait AssertionProvider: Send + Sync {
    async fn signin(&self, request: &AuthRequest) -> AuthResult<SignedAssertion>;
}

/// Interactive Google Workspace sign-in driven through a [`BrowserDriver`]
pub struct AssertionSession<D> {
    driver: Mutex<D>,
    session_dir: PathBuf,
}

impl<D: BrowserDriver> AssertionSession<D> {
    pub fn new(driver: D, session_dir: impl Into<PathBuf>) -> Self {
        Self {
            driver: Mutex::new(driver),
            session_dir: session_dir.into(),
        }
    }

    /// Navigate through the IdP and return the raw `SAMLResponse` posted to AWS
    async fn capture(&self, driver: &mut D, request: &AuthRequest) -> AuthResult<String> {
        driver.observe_request(AWS_SAML_SIGNIN_URL).await?;

        let url = signin_url(request.idp_id(), request.sp_id())?;
        debug!("Navigating to {}", url);
        driver.navigate(url.as_str()).await?;

        if let Some(username) = request.username() {
            if driver.fill_if_present(EMAIL_INPUT_SELECTOR, username).await? {
                debug!("Pre-filled username {}", username);
            }
        }

        info!("Waiting for sign-in to complete in the browser");
        driver.wait_for_url(AWS_SAML_SIGNIN_URL).await?;

        let observed = driver.take_observed().await?;
        if let Some(route_error) = observed.route_error {
            return Err(AuthError::session(format!("could not route: {}", route_error)));
        }

        let roles = CandidateRoleSet::new(driver.read_label_targets(ROLE_LABEL_SELECTOR).await?);
        if roles.is_empty() {
            warn!("No roles were listed on the AWS sign-in page");
        }
        if !roles.contains(request.role_arn()) {
            return Err(AuthError::role_not_presented(request.role_arn()));
        }
        debug!("Role {} is among {} offered roles", request.role_arn(), roles.len());

        let post_data = observed.post_data.ok_or_else(|| {
            AuthError::session("reached the AWS sign-in page without observing the SAML post")
        })?;
        extract_saml_response(&post_data)
    }
}

#[async_trait]
impl<D: BrowserDriver> AssertionProvider for AssertionSession<D> {
    async fn signin(&self, request: &AuthRequest) -> AuthResult<SignedAssertion> {
        let mut driver = self.driver.lock().await;

        if request.clean() {
            driver.clear_session_dir(&self.session_dir).await?;
        }

        driver.launch(&self.session_dir).await?;
        let captured = self.capture(&mut driver, request).await;
        let closed = driver.close().await;
        let saml_response = captured?;
        closed?;

        if request.clean() {
            driver.clear_session_dir(&self.session_dir).await?;
        }

        let decoded = DecodedAssertion::from_base64(&saml_response)?;
        debug!("Assertion lists {} role values", decoded.role_values().len());
        let principal_arn = decoded
            .principal_for(request.role_arn())
            .ok_or_else(|| AuthError::principal_not_found(request.role_arn()))?;

        info!("Obtained SAML assertion for principal {}", principal_arn);
        Ok(SignedAssertion {
            saml_response,
            principal_arn,
        })
    }
}

pub fn signin_url(idp_id: &str, sp_id: &str) -> AuthResult<Url> {
    Url::parse_with_params(
        GOOGLE_INIT_SSO_URL,
        &[("idpid", idp_id), ("spid", sp_id), ("forceauthn", "false")],
    )
    .map_err(|e| AuthError::config(format!("invalid sign-in URL: {}", e)))
}

/// URL-decoded `SAMLResponse` parameter of a form-encoded POST body
pub fn extract_saml_response(post_data: &str) -> AuthResult<String> {
    url::form_urlencoded::parse(post_data.as_bytes())
        .find(|(key, _)| key == SAML_RESPONSE_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AuthError::assertion_decode("no SAMLResponse in the sign-in post"))
}
