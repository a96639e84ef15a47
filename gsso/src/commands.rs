use clap::Parser;
use std::path::PathBuf;

use crate::common::{AuthRequest, AuthResult};

#[derive(Parser, Debug, Clone)]
pub struct AuthCommand {
    /// AWS role ARN to assume
    #[arg(short = 'r', long, env = "GSSO_AWS_ROLE_ARN")]
    pub aws_role_arn: String,

    /// Google SSO IdP identifier
    #[arg(short = 'i', long, env = "GSSO_IDP_ID")]
    pub idp_id: String,

    /// Google SSO SP identifier
    #[arg(short = 's', long, env = "GSSO_SP_ID")]
    pub sp_id: String,

    /// Google email address to pre-fill
    #[arg(short = 'u', long, env = "GSSO_USERNAME")]
    pub username: Option<String>,

    /// AWS profile used as cache section and STS configuration
    #[arg(short = 'p', long, env = "GSSO_AWS_PROFILE")]
    pub aws_profile: String,

    /// Clean browser session before and after sign-in
    #[arg(short = 'c', long)]
    pub clean: bool,

    /// Region for the STS call (defaults to the profile's region)
    #[arg(long, env = "GSSO_REGION")]
    pub region: Option<String>,

    /// Requested session duration in seconds (900-43200)
    #[arg(long, env = "GSSO_DURATION_SECONDS")]
    pub duration_seconds: Option<i32>,

    /// Credential cache file
    #[arg(long, env = "GSSO_CACHE_FILE")]
    pub cache_file: Option<PathBuf>,

    /// Persistent browser profile directory
    #[arg(long, env = "GSSO_SESSION_DIR")]
    pub session_dir: Option<PathBuf>,

    /// Directory Playwright and its npm dependencies are installed into
    #[arg(long, env = "GSSO_NODE_DIR")]
    pub node_dir: Option<PathBuf>,

    /// Node.js executable used to run Playwright
    #[arg(long, env = "GSSO_NODE", default_value = "node")]
    pub node: String,

    /// npm executable used to install Playwright
    #[arg(long, env = "GSSO_NPM", default_value = "npm")]
    pub npm: String,
}

impl AuthCommand {
    pub fn to_request(&self) -> AuthResult<AuthRequest> {
        AuthRequest::new(
            self.aws_role_arn.clone(),
            self.idp_id.clone(),
            self.sp_id.clone(),
            self.aws_profile.clone(),
        )?
        .with_username(self.username.clone())
        .with_clean(self.clean)
        .with_region(self.region.clone())
        .with_duration_seconds(self.duration_seconds)
    }
}
