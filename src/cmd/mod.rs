pub mod ai;
pub mod config;
pub mod connection;
pub mod groups;
pub mod locations;
pub mod policies;
pub mod progress;
pub mod report;
pub mod templates;

use crate::api::ApiClient;
use crate::bulk::{BulkOperation, BulkRunner, CancelToken};
use crate::config::{Config, ConfigManager};
use crate::error::{CapmError, Result};
use colored::Colorize;

/// Options shared by every command that talks to the backend
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServerArgs {
    /// Backend URL (overrides server_url from config.toml)
    #[arg(long, env = "CAPM_SERVER")]
    pub server: Option<String>,
}

/// A connected backend session
pub struct Session {
    pub config: Config,
    pub client: ApiClient,
}

impl Session {
    /// Load config, reach the backend and make sure it holds a Graph connection
    ///
    /// The backend keys its connection on the session cookie, so a fresh
    /// process connects with the configured credentials when needed.
    pub async fn open(server: &ServerArgs) -> Result<Self> {
        let manager = ConfigManager::new()?;
        let mut config = manager.load_config()?;
        if let Some(url) = &server.server {
            config.server_url = url.trim_end_matches('/').to_string();
        }

        let client = ApiClient::new(&config.server_url)?;
        let health = client.health().await?;
        tracing::debug!(
            "Backend {} reachable, connected={}",
            config.server_url,
            health.connected
        );

        if !health.connected {
            let credentials = manager.load_credentials()?.ok_or(CapmError::NotConnected)?;
            let result = client.connect(&credentials, config.verify_ssl).await?;
            tracing::info!("{}", result.message);
        }

        Ok(Self { config, client })
    }

    /// Runner for `operation`, honouring the configured timeout and Ctrl-C
    pub fn runner(&self, operation: BulkOperation) -> BulkRunner {
        let token = CancelToken::new();
        let on_signal = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} Cancelling bulk run...", "⚠".yellow().bold());
                on_signal.cancel();
            }
        });

        BulkRunner::new(operation)
            .with_timeout(self.config.action_timeout())
            .with_cancel(token)
    }
}

/// Ask for confirmation unless `--yes` was given
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }

    let answer = dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?;

    if !answer {
        println!("{}", "Cancelled.".yellow());
    }
    Ok(answer)
}
