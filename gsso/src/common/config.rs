use std::path::PathBuf;

use super::error::{AuthError, AuthResult};

/// Directory name used under the user cache and config directories
pub const APP_NAME: &str = "gsso";

/// File name of the credential cache inside the app cache directory
pub const CREDENTIALS_FILE_NAME: &str = "credentials";

/// Directory under the app cache directory holding the Playwright install
pub const NODE_DIR_NAME: &str = "node";

pub const DEFAULT_NODE: &str = "node";
pub const DEFAULT_NPM: &str = "npm";

/// Filesystem locations shared across invocations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    /// INI file holding one section per profile
    pub cache_file: PathBuf,

    /// Persistent browser profile, keyed by application rather than AWS profile
    pub session_dir: PathBuf,

    /// npm prefix Playwright is installed into
    pub node_dir: PathBuf,
}

impl AppPaths {
    /// Resolve paths, preferring explicit overrides over the platform defaults
    pub fn resolve(
        cache_file: Option<PathBuf>,
        session_dir: Option<PathBuf>,
        node_dir: Option<PathBuf>,
    ) -> AuthResult<Self> {
        let cache_file = match cache_file {
            Some(path) => path,
            None => default_cache_file()?,
        };
        let session_dir = match session_dir {
            Some(path) => path,
            None => default_session_dir()?,
        };
        let node_dir = match node_dir {
            Some(path) => path,
            None => default_node_dir()?,
        };

        Ok(Self {
            cache_file,
            session_dir,
            node_dir,
        })
    }
}

fn app_cache_dir() -> AuthResult<PathBuf> {
    dirs::cache_dir()
        .map(|dir| dir.join(APP_NAME))
        .ok_or_else(|| AuthError::config("could not determine the user cache directory"))
}

pub fn default_cache_file() -> AuthResult<PathBuf> {
    Ok(app_cache_dir()?.join(CREDENTIALS_FILE_NAME))
}

pub fn default_node_dir() -> AuthResult<PathBuf> {
    Ok(app_cache_dir()?.join(NODE_DIR_NAME))
}

pub fn default_session_dir() -> AuthResult<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_NAME))
        .ok_or_else(|| AuthError::config("could not determine the user config directory"))
}

/// Settings for the Playwright helper process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Node.js executable running the helper
    pub node: String,

    /// npm executable used to install Playwright and Chromium
    pub npm: String,

    /// npm prefix the helper resolves `playwright` from
    pub node_dir: PathBuf,

    /// Sign-in is interactive, so this stays false outside of tests
    pub headless: bool,
}

impl BrowserConfig {
    pub fn new(node_dir: impl Into<PathBuf>) -> Self {
        Self {
            node: DEFAULT_NODE.to_string(),
            npm: DEFAULT_NPM.to_string(),
            node_dir: node_dir.into(),
            headless: false,
        }
    }

    pub fn with_node(mut self, node: impl Into<String>) -> Self {
        self.node = node.into();
        self
    }

    pub fn with_npm(mut self, npm: impl Into<String>) -> Self {
        self.npm = npm.into();
        self
    }
}
