use crate::api::templates::{self, PolicyTemplate};
use crate::bulk::operations::deploy_templates;
use crate::bulk::BulkOperation;
use crate::cmd::progress::{bulk_progress, finish_bulk};
use crate::cmd::{confirm, ServerArgs, Session};
use crate::error::{CapmError, Result};
use crate::table::StateBadge;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Only show one category
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Template names (catalog key or display name)
    #[arg(required_unless_present_any = ["all", "category"])]
    pub names: Vec<String>,

    /// Deploy every template in the catalog
    #[arg(long, conflicts_with = "names")]
    pub all: bool,

    /// Deploy every template in a category
    #[arg(long, conflicts_with_all = ["names", "all"])]
    pub category: Option<String>,

    /// Show what would be deployed without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

fn colored_state(state: &str) -> String {
    match StateBadge::for_state(state) {
        StateBadge::Success => state.green().to_string(),
        StateBadge::Warning => "report-only".yellow().to_string(),
        StateBadge::Secondary => state.dimmed().to_string(),
    }
}

/// List the template catalog grouped by category
pub async fn list(args: ListArgs) -> Result<()> {
    let session = Session::open(&args.server).await?;
    let catalog = templates::list_templates(&session.client).await?;

    for (category, members) in catalog.grouped() {
        if args
            .category
            .as_deref()
            .is_some_and(|wanted| !wanted.eq_ignore_ascii_case(category))
        {
            continue;
        }

        println!("\n{}", category.to_uppercase().cyan().bold());
        for template in members {
            println!(
                "  {:<55} {:<20} {}",
                template.label(),
                colored_state(&template.state),
                template.name.dimmed()
            );
        }
    }

    println!("\n{} {} templates available", "→".cyan(), catalog.templates.len());
    Ok(())
}

/// Deploy templates one at a time with a live log
pub async fn deploy(args: DeployArgs) -> Result<()> {
    let session = Session::open(&args.server).await?;
    let catalog = templates::list_templates(&session.client).await?;

    let selected: Vec<&PolicyTemplate> = if args.all {
        catalog.templates.iter().collect()
    } else if let Some(category) = &args.category {
        catalog
            .templates
            .iter()
            .filter(|t| t.category.eq_ignore_ascii_case(category))
            .collect()
    } else {
        args.names
            .iter()
            .map(|name| {
                catalog.find(name).ok_or_else(|| {
                    CapmError::InvalidArgument(format!("Template '{}' not found in catalog", name))
                })
            })
            .collect::<Result<_>>()?
    };

    if selected.is_empty() {
        println!("{} No templates matched", "ℹ".yellow());
        return Ok(());
    }

    if args.dry_run {
        println!("\n{}", "DRY RUN - No changes will be made".yellow().bold());
        println!("\n{} Templates that would be deployed:", "→".cyan());
        for template in &selected {
            println!("  • {} ({})", template.label(), colored_state(&template.state));
        }
        return Ok(());
    }

    let prompt = if args.all {
        "Deploy ALL templates? This will create many policies.".to_string()
    } else {
        format!("Deploy {} template(s)?", selected.len())
    };
    if !confirm(&prompt, args.yes)? {
        return Ok(());
    }

    let runner = session.runner(BulkOperation::DeployTemplates);
    let (bar, on_progress) = bulk_progress(BulkOperation::DeployTemplates, selected.len());
    let summary = deploy_templates(&session.client, &selected, &runner, on_progress).await;
    finish_bulk(&bar, &summary);

    if summary.succeeded > 0 {
        println!(
            "\n{} Deployed {} of {} templates",
            "✓".green().bold(),
            summary.succeeded,
            summary.total
        );
    }

    Ok(())
}
