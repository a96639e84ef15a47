use async_trait::async_trait;
use serde::Deserialize;
use std::io;
use std::path::Path;
use tracing::debug;

use crate::common::{AuthError, AuthResult};

/// What the request observer saw for the watched URL.
///
/// Interception failures are recorded instead of interrupting navigation, and are only
/// inspected once the page wait has finished.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ObservedRequest {
    /// Raw form body of the watched POST, if it happened
    pub post_data: Option<String>,

    /// First interception failure, if any
    pub route_error: Option<String>,
}

/// Browser capability used by the sign-in session
#[async_trait]
pub trait BrowserDriver: Send {
    /// Start a browser with a persistent profile stored in `session_dir`
    async fn launch(&mut self, session_dir: &Path) -> AuthResult<()>;

    /// Start recording the body of requests sent to exactly `url`
    async fn observe_request(&mut self, url: &str) -> AuthResult<()>;

    async fn navigate(&mut self, url: &str) -> AuthResult<()>;

    /// Fill the first element matching `selector`; false when nothing matches
    async fn fill_if_present(&mut self, selector: &str, value: &str) -> AuthResult<bool>;

    /// Wait, without a timeout, until the page has loaded `url`
    async fn wait_for_url(&mut self, url: &str) -> AuthResult<()>;

    async fn take_observed(&mut self) -> AuthResult<ObservedRequest>;

    /// `for` attributes of the labels matching `selector`
    async fn read_label_targets(&mut self, selector: &str) -> AuthResult<Vec<String>>;

    /// Delete the persistent profile; a missing directory is fine
    async fn clear_session_dir(&mut self, session_dir: &Path) -> AuthResult<()> {
        match tokio::fs::remove_dir_all(session_dir).await {
            Ok(()) => {
                debug!("Removed browser session directory {}", session_dir.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AuthError::session(format!(
                "could not remove user data dir {}: {}",
                session_dir.display(),
                e
            ))),
        }
    }

    async fn close(&mut self) -> AuthResult<()>;
}
