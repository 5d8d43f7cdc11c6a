use crate::api::groups;
use crate::cmd::progress::{create_spinner, finish_error, finish_success, finish_warning};
use crate::cmd::{confirm, ServerArgs, Session};
use crate::error::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Create the persona and exclusion groups the policy framework assigns to
pub async fn create(args: CreateArgs) -> Result<()> {
    let session = Session::open(&args.server).await?;

    println!(
        "{} This creates the CA-BreakGlassAccounts, CA-Persona-* and per-persona exclusion groups.",
        "→".cyan()
    );
    println!("  Existing groups are skipped. Requires a delegated sign-in on the backend.");
    if !confirm("Create framework groups?", args.yes)? {
        return Ok(());
    }

    let spinner = create_spinner("Creating framework groups...");
    let result = match groups::create_ca_groups(&session.client).await {
        Ok(result) => result,
        Err(e) => {
            finish_error(&spinner, "Group creation failed");
            return Err(e);
        }
    };

    if result.failed() == 0 {
        finish_success(&spinner, &result.message);
    } else {
        finish_warning(&spinner, &result.message);
        for error in &result.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    println!(
        "Total: {} | Created: {} | Skipped: {} | Failed: {}",
        result.total,
        result.created.to_string().green(),
        result.skipped.to_string().yellow(),
        result.failed().to_string().red()
    );
    Ok(())
}
