use std::fmt::Display;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while acquiring credentials
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Credential cache error on {path}: {message}")]
    CacheIo { path: String, message: String },

    #[error("Profile [{profile}] not found in credential cache")]
    SectionNotFound { profile: String },

    #[error("Invalid expiration timestamp {value:?}: {source}")]
    Parse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Incomplete credential: {field} must be set")]
    Validation { field: &'static str },

    #[error("Browser session error: {message}")]
    Session { message: String },

    #[error("Role {role_arn} was not offered by the identity provider")]
    RoleNotPresented { role_arn: String },

    #[error("Could not decode SAMLResponse: {message}")]
    AssertionDecode { message: String },

    #[error("Could not find a SAML provider principal for role {role_arn}")]
    PrincipalNotFound { role_arn: String },

    #[error("AssumeRoleWithSAML failed: {reason}")]
    Exchange { reason: String },

    #[error("Serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
}

impl AuthError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn cache_io(path: &Path, err: impl Display) -> Self {
        Self::CacheIo {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub fn section_not_found(profile: impl Into<String>) -> Self {
        Self::SectionNotFound {
            profile: profile.into(),
        }
    }

    pub fn parse(value: impl Into<String>, source: chrono::ParseError) -> Self {
        Self::Parse {
            value: value.into(),
            source,
        }
    }

    pub fn validation(field: &'static str) -> Self {
        Self::Validation { field }
    }

    pub fn session(message: impl Into<String>) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    pub fn role_not_presented(role_arn: impl Into<String>) -> Self {
        Self::RoleNotPresented {
            role_arn: role_arn.into(),
        }
    }

    pub fn assertion_decode(message: impl Into<String>) -> Self {
        Self::AssertionDecode {
            message: message.into(),
        }
    }

    pub fn principal_not_found(role_arn: impl Into<String>) -> Self {
        Self::PrincipalNotFound {
            role_arn: role_arn.into(),
        }
    }

    pub fn exchange(reason: impl Into<String>) -> Self {
        Self::Exchange {
            reason: reason.into(),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;
