use crate::config::{Config, ConfigManager};
use crate::error::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Key to set (server_url, log_level, verify_ssl, action_timeout_secs,
    /// tenant_id, client_id, client_secret)
    pub key: String,

    pub value: String,
}

fn mask(secret: &str) -> String {
    if secret.is_empty() {
        return "(not set)".to_string();
    }
    let visible: String = secret.chars().take(4).collect();
    format!("{}{}", visible, "*".repeat(8))
}

fn print_config(manager: &ConfigManager, config: &Config) {
    println!("{} {}", "Config file:".bold(), manager.config_file().display());
    println!("  server_url           {}", config.server_url);
    println!(
        "  log_level            {}",
        if config.log_level.is_empty() { "(default)" } else { &config.log_level }
    );
    println!("  verify_ssl           {}", config.verify_ssl);
    match config.action_timeout_secs {
        Some(secs) => println!("  action_timeout_secs  {}", secs),
        None => println!("  action_timeout_secs  (none)"),
    }

    match &config.credentials {
        Some(creds) => {
            println!("  tenant_id            {}", creds.tenant_id);
            println!("  client_id            {}", creds.client_id);
            println!("  client_secret        {}", mask(&creds.client_secret));
        }
        None if manager.env_file().exists() => {
            println!(
                "  credentials          {} {}",
                "from".dimmed(),
                manager.env_file().display()
            );
        }
        None => println!("  credentials          {}", "(not configured)".yellow()),
    }
}

/// Print the current configuration with secrets masked
pub fn show() -> Result<()> {
    let manager = ConfigManager::new()?;
    let config = manager.load_config()?;
    print_config(&manager, &config);
    Ok(())
}

/// Update one configuration key
pub fn set(args: SetArgs) -> Result<()> {
    let manager = ConfigManager::new()?;
    manager.set_value(&args.key, &args.value)?;
    let shown = if args.key == "client_secret" { mask(&args.value) } else { args.value.clone() };
    println!("{} {} = {}", "✓".green(), args.key, shown);
    Ok(())
}
