use crate::api::ApiClient;
use crate::cmd::ServerArgs;
use crate::config::ConfigManager;
use crate::error::{CapmError, Result};
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct HealthArgs {
    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Args, Debug)]
pub struct DisconnectArgs {
    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Tenant ID (overrides config)
    #[arg(long)]
    pub tenant_id: Option<String>,

    /// Client ID of the app registration
    #[arg(long)]
    pub client_id: Option<String>,

    /// Client secret of the app registration
    #[arg(long, env = "CAPM_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,
}

fn server_url(server: &ServerArgs, manager: &ConfigManager) -> Result<String> {
    match &server.server {
        Some(url) => Ok(url.clone()),
        None => Ok(manager.load_config()?.server_url),
    }
}

/// Check that the backend is reachable
pub async fn health(args: HealthArgs) -> Result<()> {
    let manager = ConfigManager::new()?;
    let url = server_url(&args.server, &manager)?;
    let client = ApiClient::new(&url)?;

    let spinner = crate::cmd::progress::create_spinner(&format!("Contacting {}...", url));
    match client.health().await {
        Ok(status) => {
            crate::cmd::progress::finish_success(&spinner, &format!("Backend is up at {}", url));
            let connection = if status.connected {
                "connected".green()
            } else {
                "not connected (new session)".yellow()
            };
            println!("→ Graph connection: {}", connection);
            Ok(())
        }
        Err(e) => {
            crate::cmd::progress::finish_error(&spinner, "Backend unreachable");
            Err(e)
        }
    }
}

/// Verify credentials by connecting the backend to the tenant
pub async fn connect(args: ConnectArgs) -> Result<()> {
    let manager = ConfigManager::new()?;
    let config = manager.load_config()?;
    let url = server_url(&args.server, &manager)?;

    let credentials = match (args.tenant_id, args.client_id, args.client_secret) {
        (Some(tenant_id), Some(client_id), Some(client_secret)) => crate::config::Credentials {
            tenant_id,
            client_id,
            client_secret,
        },
        _ => manager.load_credentials()?.ok_or(CapmError::NotConnected)?,
    };

    println!(
        "{} tenant {} via {}",
        "Connecting".cyan().bold(),
        credentials.tenant_id.cyan(),
        url
    );

    let client = ApiClient::new(&url)?;
    let result = client.connect(&credentials, config.verify_ssl).await?;

    println!("{} {}", "✓".green(), result.message);
    println!("→ {} policies visible to the app registration", result.policy_count);
    Ok(())
}

/// Drop the backend's Graph connection for this session
pub async fn disconnect(args: DisconnectArgs) -> Result<()> {
    let manager = ConfigManager::new()?;
    let url = server_url(&args.server, &manager)?;
    let client = ApiClient::new(&url)?;

    let message = client.disconnect().await?;
    println!("{} {}", "✓".green(), message);
    Ok(())
}
