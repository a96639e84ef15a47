//! Playwright browser automation
//!
//! Chromium is driven by a small Node.js helper that speaks one JSON command and one JSON reply
//! per line over stdin/stdout. Playwright and Chromium are installed with npm into an app-owned
//! prefix on first launch, and the helper resolves `require('playwright')` from there.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use super::browser::{BrowserDriver, ObservedRequest};
use crate::common::config::BrowserConfig;
use crate::common::{AuthError, AuthResult};

const HELPER_SCRIPT: &str = include_str!("playwright_helper.js");

/// Written into the node dir once Playwright and Chromium are installed
const INSTALL_MARKER: &str = ".playwright-installed";

/// Commands understood by the helper script
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum HelperCommand<'a> {
    Launch {
        user_data_dir: &'a Path,
        headless: bool,
    },
    Observe {
        url: &'a str,
    },
    Goto {
        url: &'a str,
    },
    Fill {
        selector: &'a str,
        value: &'a str,
    },
    WaitForUrl {
        url: &'a str,
    },
    Observed,
    Labels {
        selector: &'a str,
        attribute: &'a str,
    },
    Close,
}

impl HelperCommand<'_> {
    fn name(&self) -> &'static str {
        match self {
            HelperCommand::Launch { .. } => "launch",
            HelperCommand::Observe { .. } => "observe",
            HelperCommand::Goto { .. } => "goto",
            HelperCommand::Fill { .. } => "fill",
            HelperCommand::WaitForUrl { .. } => "wait for URL",
            HelperCommand::Observed => "observed",
            HelperCommand::Labels { .. } => "labels",
            HelperCommand::Close => "close",
        }
    }
}

#[derive(Debug, Deserialize)]
struct HelperReply {
    ok: bool,
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

struct HelperProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// [`BrowserDriver`] backed by Playwright's persistent Chromium context
pub struct PlaywrightDriver {
    config: BrowserConfig,
    process: Option<HelperProcess>,
}

impl PlaywrightDriver {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            process: None,
        }
    }

    /// Check that the configured Node.js binary runs
    async fn check_node_installed(&self) -> AuthResult<()> {
        let status = Command::new(&self.config.node)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(AuthError::session(format!(
                "could not run {}; install Node.js to sign in",
                self.config.node
            ))),
        }
    }

    fn is_playwright_installed(&self) -> bool {
        self.config.node_dir.join(INSTALL_MARKER).is_file()
    }

    /// Install Playwright and Chromium under the node dir unless a previous run already did
    async fn ensure_playwright_installed(&self) -> AuthResult<()> {
        let node_dir = &self.config.node_dir;
        if self.is_playwright_installed() {
            debug!("Playwright already installed in {}", node_dir.display());
            return Ok(());
        }

        info!("Installing Playwright and Chromium into {}", node_dir.display());
        tokio::fs::create_dir_all(node_dir).await.map_err(|e| {
            AuthError::session(format!("could not create {}: {}", node_dir.display(), e))
        })?;

        let prefix = node_dir.to_string_lossy().to_string();
        let prefix = prefix.as_str();
        self.run_npm(&["install", "--prefix", prefix, "--no-fund", "--no-audit", "playwright"])
            .await?;
        self.run_npm(&["exec", "--prefix", prefix, "--no", "--", "playwright", "install", "chromium"])
            .await?;

        tokio::fs::write(node_dir.join(INSTALL_MARKER), b"")
            .await
            .map_err(|e| AuthError::session(format!("could not record playwright install: {}", e)))?;
        Ok(())
    }

    /// Run npm inside the node dir, keeping its output off stdout
    async fn run_npm(&self, args: &[&str]) -> AuthResult<()> {
        debug!("Running {} {}", self.config.npm, args.join(" "));
        let status = Command::new(&self.config.npm)
            .args(args)
            .current_dir(&self.config.node_dir)
            .stdin(Stdio::null())
            .stdout(io::stderr())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| {
                AuthError::session(format!(
                    "could not run {}; install Node.js and npm: {}",
                    self.config.npm, e
                ))
            })?;

        if !status.success() {
            return Err(AuthError::session(format!(
                "could not install playwright: {} {} exited with {}",
                self.config.npm,
                args.join(" "),
                status
            )));
        }
        Ok(())
    }

    fn helper_command(&self) -> Command {
        let mut command = Command::new(&self.config.node);
        command
            .arg("-e")
            .arg(HELPER_SCRIPT)
            .current_dir(&self.config.node_dir)
            .env("NODE_PATH", self.config.node_dir.join("node_modules"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        command
    }

    fn spawn_helper(&self) -> AuthResult<HelperProcess> {
        let mut child = self
            .helper_command()
            .spawn()
            .map_err(|e| AuthError::session(format!("could not start playwright: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| AuthError::session("playwright helper has no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AuthError::session("playwright helper has no stdout"))?;

        Ok(HelperProcess {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        })
    }

    async fn send(&mut self, command: HelperCommand<'_>) -> AuthResult<serde_json::Value> {
        let name = command.name();
        let process = self
            .process
            .as_mut()
            .ok_or_else(|| AuthError::session(format!("could not {}: browser is not running", name)))?;

        let mut line = serde_json::to_string(&command)?;
        line.push('\n');
        debug!("Sending {} to playwright helper", name);

        process
            .stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| AuthError::session(format!("could not {}: {}", name, e)))?;
        process
            .stdin
            .flush()
            .await
            .map_err(|e| AuthError::session(format!("could not {}: {}", name, e)))?;

        let reply = process
            .stdout
            .next_line()
            .await
            .map_err(|e| AuthError::session(format!("could not {}: {}", name, e)))?
            .ok_or_else(|| AuthError::session(format!("could not {}: playwright helper exited", name)))?;

        parse_reply(name, &reply)
    }
}

fn parse_reply(name: &str, reply: &str) -> AuthResult<serde_json::Value> {
    let reply: HelperReply = serde_json::from_str(reply)
        .map_err(|e| AuthError::session(format!("could not {}: malformed helper reply: {}", name, e)))?;

    if reply.ok {
        Ok(reply.result)
    } else {
        Err(AuthError::session(format!(
            "could not {}: {}",
            name,
            reply.error.unwrap_or_else(|| "unknown error".to_string())
        )))
    }
}

#[async_trait]
impl BrowserDriver for PlaywrightDriver {
    async fn launch(&mut self, session_dir: &Path) -> AuthResult<()> {
        self.check_node_installed().await?;
        self.ensure_playwright_installed().await?;
        self.process = Some(self.spawn_helper()?);

        info!("Launching browser with profile {}", session_dir.display());
        let headless = self.config.headless;
        let launched = self
            .send(HelperCommand::Launch {
                user_data_dir: session_dir,
                headless,
            })
            .await;

        if launched.is_err() {
            if let Some(mut process) = self.process.take() {
                drop(process.stdin);
                if let Err(e) = process.child.kill().await {
                    warn!("Could not stop playwright helper: {}", e);
                }
            }
        }
        launched.map(|_| ())
    }

    async fn observe_request(&mut self, url: &str) -> AuthResult<()> {
        self.send(HelperCommand::Observe { url }).await?;
        Ok(())
    }

    async fn navigate(&mut self, url: &str) -> AuthResult<()> {
        self.send(HelperCommand::Goto { url }).await?;
        Ok(())
    }

    async fn fill_if_present(&mut self, selector: &str, value: &str) -> AuthResult<bool> {
        let filled = self.send(HelperCommand::Fill { selector, value }).await?;
        Ok(filled.as_bool().unwrap_or(false))
    }

    async fn wait_for_url(&mut self, url: &str) -> AuthResult<()> {
        self.send(HelperCommand::WaitForUrl { url }).await?;
        Ok(())
    }

    async fn take_observed(&mut self) -> AuthResult<ObservedRequest> {
        let observed = self.send(HelperCommand::Observed).await?;
        Ok(serde_json::from_value(observed)?)
    }

    async fn read_label_targets(&mut self, selector: &str) -> AuthResult<Vec<String>> {
        let targets = self
            .send(HelperCommand::Labels {
                selector,
                attribute: "for",
            })
            .await?;
        Ok(serde_json::from_value(targets)?)
    }

    async fn close(&mut self) -> AuthResult<()> {
        if self.process.is_none() {
            return Ok(());
        }

        let closed = self.send(HelperCommand::Close).await;
        if let Some(mut process) = self.process.take() {
            drop(process.stdin);
            process
                .child
                .wait()
                .await
                .map_err(|e| AuthError::session(format!("could not stop playwright: {}", e)))?;
        }
        closed.map(|_| ())
    }
}
