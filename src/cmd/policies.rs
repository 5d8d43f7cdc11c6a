//! Conditional Access policy table commands

use crate::api::policies;
use crate::bulk::operations::delete_selected;
use crate::bulk::BulkOperation;
use crate::cmd::progress::{bulk_progress, finish_bulk};
use crate::cmd::{confirm, ServerArgs, Session};
use crate::error::{CapmError, Result};
use crate::model::{STATE_DISABLED, STATE_ENABLED, STATE_REPORT_ONLY};
use crate::table::{PolicyRow, StateBadge, TableViewModel};
use clap::Args;
use colored::Colorize;

/// Sortable table columns and the attribute each one reads
const COLUMNS: [(&str, &str); 4] = [
    ("name", "displayName"),
    ("state", "state"),
    ("created", "createdDateTime"),
    ("modified", "modifiedDateTime"),
];

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Sort by column (name, state, created, modified or any attribute name)
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Filter by state (enabled, report-only, disabled)
    #[arg(long)]
    pub state: Option<String>,

    /// Show IDs and modification dates under each row
    #[arg(long)]
    pub details: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Policy ID
    pub id: String,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Policy IDs to delete, processed in the order given
    #[arg(required_unless_present = "all")]
    pub ids: Vec<String>,

    /// Delete every policy in the tenant
    #[arg(long, conflicts_with = "ids")]
    pub all: bool,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Map a CLI column name to the policy attribute it sorts on
pub fn sort_attribute(column: &str) -> &str {
    COLUMNS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(column))
        .map(|(_, attribute)| *attribute)
        .unwrap_or(column)
}

/// Map a CLI state filter to the Graph state value
pub fn state_filter(state: &str) -> &str {
    match state {
        "enabled" => STATE_ENABLED,
        "report-only" | "reportonly" => STATE_REPORT_ONLY,
        "disabled" => STATE_DISABLED,
        other => other,
    }
}

fn print_row(row: &PolicyRow, details: bool) {
    let state = match row.state_badge {
        StateBadge::Success => row.state_label().green().to_string(),
        StateBadge::Warning => row.state_label().yellow().to_string(),
        StateBadge::Secondary if row.state == STATE_DISABLED => row.state_label().red().to_string(),
        StateBadge::Secondary => row.state_label().to_string(),
    };

    let name = if row.display_name.chars().count() > 48 {
        format!("{}...", row.display_name.chars().take(45).collect::<String>())
    } else {
        row.display_name.clone()
    };

    println!("{:<50} {:<15} {:<18}", name, state, row.created);

    if details {
        println!("   ID: {}", row.id.dimmed());
        println!("   Modified: {}", row.modified.dimmed());
        println!();
    }
}

/// List Conditional Access policies as a sorted table
pub async fn list(args: ListArgs) -> Result<()> {
    println!("{} Conditional Access policies...", "Listing".cyan().bold());

    let session = Session::open(&args.server).await?;
    let mut table = TableViewModel::new();
    table.set_items(policies::list_policies(&session.client).await?);

    if table.items().is_empty() {
        println!("\n{} No Conditional Access policies found", "ℹ".yellow());
        return Ok(());
    }

    if let Some(column) = &args.sort {
        let attribute = sort_attribute(column);
        table.set_sort(attribute);
        if args.desc {
            table.set_sort(attribute);
        }
    }

    let counts = table.state_counts();
    println!(
        "\n{} {} CA policies found ({} enabled, {} report-only, {} disabled)\n",
        "→".cyan(),
        table.items().len(),
        counts.enabled.to_string().green(),
        counts.report_only.to_string().yellow(),
        counts.disabled.to_string().red()
    );

    let header = |label: &str, attribute: &str| format!("{} {}", label, table.sort_indicator(attribute));
    println!(
        "{:<50} {:<15} {:<18}",
        header("Name", "displayName").bold(),
        header("State", "state").bold(),
        header("Created", "createdDateTime").bold()
    );
    println!("{}", "─".repeat(85));

    let wanted = args.state.as_deref().map(state_filter);
    for row in table.rows() {
        if wanted.is_some_and(|state| row.state != state) {
            continue;
        }
        print_row(&row, args.details);
    }

    Ok(())
}

/// Print one policy's full JSON
pub async fn show(args: ShowArgs) -> Result<()> {
    let session = Session::open(&args.server).await?;
    let policy = policies::get_policy(&session.client, &args.id).await?;
    println!("{}", serde_json::to_string_pretty(&policy)?);
    Ok(())
}

/// Delete policies one at a time with a live log
pub async fn delete(args: DeleteArgs) -> Result<()> {
    let session = Session::open(&args.server).await?;
    let mut table = TableViewModel::new();
    table.set_items(policies::list_policies(&session.client).await?);

    if args.all {
        table.select_all();
    } else {
        for id in &args.ids {
            if table.get(id).is_none() {
                println!("{} Policy {} not found, skipping", "⚠".yellow(), id.dimmed());
            } else if !table.is_selected(id) {
                table.toggle_selection(id);
            }
        }
    }

    let Some(label) = table.selection_label() else {
        println!("{} No policies selected", "ℹ".yellow());
        return Ok(());
    };
    println!("→ {}", label);

    let prompt = format!("Delete {} selected policies?", table.selection().len());
    if !confirm(&prompt, args.yes)? {
        return Ok(());
    }

    let runner = session.runner(BulkOperation::DeletePolicies);
    let (bar, on_progress) = bulk_progress(BulkOperation::DeletePolicies, table.selection().len());
    let summary = delete_selected(&session.client, &mut table, &runner, on_progress).await;

    let summary = match summary {
        Ok(summary) => summary,
        Err(e) => {
            bar.abandon();
            return Err(CapmError::ApiError(format!(
                "Policies were deleted but the list could not be refreshed: {}",
                e
            )));
        }
    };
    finish_bulk(&bar, &summary);

    if summary.succeeded > 0 {
        println!(
            "\n{} Deleted {} of {} policies, {} remain in the tenant",
            "✓".green().bold(),
            summary.succeeded,
            summary.total,
            table.items().len()
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_attribute_maps_known_columns() {
        assert_eq!(sort_attribute("name"), "displayName");
        assert_eq!(sort_attribute("Created"), "createdDateTime");
        assert_eq!(sort_attribute("conditions"), "conditions");
    }

    #[test]
    fn test_state_filter_aliases() {
        assert_eq!(state_filter("report-only"), STATE_REPORT_ONLY);
        assert_eq!(state_filter("enabled"), STATE_ENABLED);
        assert_eq!(state_filter("custom"), "custom");
    }
}
