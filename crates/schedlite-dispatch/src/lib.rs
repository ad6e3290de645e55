//! schedlite-dispatch: executes a task's configured action.
//!
//! Two backends: an HTTP GET with a bounded connect timeout, and a shell
//! command run synchronously to completion. Both return the raw captured
//! output as text; failures are reported to the caller and never retried
//! here.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

/// Default connect timeout for URL actions.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 5;

/// Default shell used to run command actions.
pub const DEFAULT_SHELL: &str = "sh";

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to spawn command: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("command exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Capability to execute a task action. The engine depends on this trait so
/// tests can substitute a recording mock.
#[async_trait]
pub trait Dispatch: Send + Sync {
    /// Perform a GET against `url` and return the raw response
    /// (status line, headers, body).
    async fn execute_url(&self, url: &str) -> Result<String>;

    /// Run `command` through the shell and return its captured stdout.
    async fn execute_command(&self, command: &str) -> Result<String>;
}

/// Production dispatcher: reqwest for URLs, `sh -c` for commands.
pub struct ActionDispatcher {
    client: Client,
    shell: String,
}

impl ActionDispatcher {
    pub fn new(http_timeout: Duration, shell: impl Into<String>) -> Result<Self> {
        let client = Client::builder().connect_timeout(http_timeout).build()?;
        Ok(Self {
            client,
            shell: shell.into(),
        })
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            DEFAULT_SHELL,
        )
        .expect("failed to build default HTTP client")
    }
}

#[async_trait]
impl Dispatch for ActionDispatcher {
    async fn execute_url(&self, url: &str) -> Result<String> {
        tracing::debug!(%url, "dispatching URL action");
        let response = self.client.get(url).send().await?;

        let mut out = format!("{:?} {}\n", response.version(), response.status());
        for (key, value) in response.headers() {
            out.push_str(&format!("{}: {}\n", key, value.to_str().unwrap_or("")));
        }
        out.push('\n');
        out.push_str(&response.text().await?);
        Ok(out)
    }

    async fn execute_command(&self, command: &str) -> Result<String> {
        tracing::debug!(%command, "dispatching command action");
        let output = tokio::process::Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .output()
            .await?;

        if !output.status.success() {
            return Err(DispatchError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
