use crate::api::report::{self, FindingsExport, ReportAnalysis};
use crate::bulk::operations::deploy_recommendations;
use crate::bulk::BulkOperation;
use crate::cmd::progress::{bulk_progress, create_spinner, finish_bulk, finish_error, finish_success};
use crate::cmd::{confirm, ServerArgs, Session};
use crate::error::{CapmError, Result};
use crate::table::SelectionSet;
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Assessment report to upload (.html, .csv or .xlsx)
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct ExportArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Assessment report to upload (.html, .csv or .xlsx)
    pub file: PathBuf,

    /// Where to write the workbook (defaults to the name the backend suggests)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Assessment report to upload (.html, .csv or .xlsx)
    pub file: PathBuf,

    /// Recommendation number as listed by `report analyze` (repeatable)
    #[arg(long = "index", required_unless_present = "all")]
    pub indices: Vec<usize>,

    /// Deploy every recommendation
    #[arg(long, conflicts_with = "indices")]
    pub all: bool,

    /// Skip confirmation prompt
    #[arg(short = 'y', long)]
    pub yes: bool,
}

async fn upload_and_analyze(session: &Session, file: &Path) -> Result<ReportAnalysis> {
    let spinner = create_spinner(&format!("Uploading {}...", file.display()));
    if let Err(e) = report::upload_report(&session.client, file).await {
        finish_error(&spinner, "Upload failed");
        return Err(e);
    }

    spinner.set_message("Analyzing report...");
    match report::analyze_report(&session.client).await {
        Ok(analysis) => {
            let message = if analysis.message.is_empty() {
                format!("Analyzed {} findings", analysis.stats.total_findings)
            } else {
                analysis.message.clone()
            };
            finish_success(&spinner, &message);
            Ok(analysis)
        }
        Err(e) => {
            finish_error(&spinner, "Analysis failed");
            Err(e)
        }
    }
}

fn print_analysis(analysis: &ReportAnalysis) {
    let stats = &analysis.stats;
    println!("\n{}", "Report summary".cyan().bold());
    println!("  Findings:       {}", stats.total_findings);

    let mut statuses: Vec<_> = stats.by_status.iter().collect();
    statuses.sort();
    for (status, count) in statuses {
        let line = format!("  {:<15} {}", format!("{}:", status), count);
        match status.as_str() {
            "Failed" => println!("{}", line.red()),
            "Passed" => println!("{}", line.green()),
            _ => println!("{}", line),
        }
    }
    println!("  Policy types:   {}", stats.mapped_policy_types);

    let failed: Vec<_> = analysis.failed_findings().collect();
    if !failed.is_empty() {
        println!("\n{}", "Failed findings".red().bold());
        for finding in failed {
            println!("  ✗ {} {}", finding.title, format!("[{}]", finding.severity).dimmed());
        }
    }

    if analysis.recommendations.is_empty() {
        println!("\n{} No policy recommendations for this report", "ℹ".yellow());
        return;
    }

    println!("\n{}", "Recommended policies".cyan().bold());
    for (i, rec) in analysis.recommendations.iter().enumerate() {
        println!(
            "  {:>3}. {:<55} {:>4}% match  {}",
            i + 1,
            rec.policy_display_name,
            rec.match_percent(),
            rec.policy_category.dimmed()
        );
        if !rec.finding_title.is_empty() {
            println!("       {} {}", "for".dimmed(), rec.finding_title.dimmed());
        }
    }
}

/// Collect the 1-based recommendation numbers into backend indices
pub fn select_indices(numbers: &[usize], available: usize) -> Result<SelectionSet<usize>> {
    let mut selection = SelectionSet::new();
    for &number in numbers {
        if number == 0 || number > available {
            return Err(CapmError::InvalidArgument(format!(
                "Recommendation {} out of range (1-{})",
                number, available
            )));
        }
        selection.insert(number - 1);
    }
    Ok(selection)
}

/// Upload a report and print its findings and recommendations
pub async fn analyze(args: AnalyzeArgs) -> Result<()> {
    let session = Session::open(&args.server).await?;
    let analysis = upload_and_analyze(&session, &args.file).await?;
    print_analysis(&analysis);
    Ok(())
}

/// Output path for an export: explicit, else the backend's name, else a fixed default
pub fn export_path(output: Option<PathBuf>, export: &FindingsExport) -> PathBuf {
    output.unwrap_or_else(|| {
        let name = export
            .file_name
            .as_deref()
            .and_then(|n| Path::new(n).file_name())
            .map(PathBuf::from);
        name.unwrap_or_else(|| PathBuf::from("security_findings.xlsx"))
    })
}

/// Upload and analyze a report, then save the findings workbook
pub async fn export(args: ExportArgs) -> Result<()> {
    let session = Session::open(&args.server).await?;
    let analysis = upload_and_analyze(&session, &args.file).await?;
    if analysis.findings.is_empty() {
        println!("{} No findings to export", "ℹ".yellow());
        return Ok(());
    }

    let spinner = create_spinner("Exporting findings...");
    let export = match report::export_findings(&session.client).await {
        Ok(export) => export,
        Err(e) => {
            finish_error(&spinner, "Export failed");
            return Err(e);
        }
    };

    let path = export_path(args.output, &export);
    tokio::fs::write(&path, &export.bytes).await?;
    finish_success(
        &spinner,
        &format!("Exported {} findings to {}", analysis.findings.len(), path.display()),
    );
    Ok(())
}

/// Upload a report and deploy the chosen recommendations
pub async fn deploy(args: DeployArgs) -> Result<()> {
    let session = Session::open(&args.server).await?;
    let analysis = upload_and_analyze(&session, &args.file).await?;
    print_analysis(&analysis);

    let available = analysis.recommendations.len();
    if available == 0 {
        return Ok(());
    }

    let selection = if args.all {
        let mut all = SelectionSet::new();
        all.replace(0..available);
        all
    } else {
        select_indices(&args.indices, available)?
    };
    let indices: Vec<usize> = selection.iter().copied().collect();

    let prompt = format!("Deploy {} recommended policies?", indices.len());
    if !confirm(&prompt, args.yes)? {
        return Ok(());
    }

    let runner = session.runner(BulkOperation::DeployRecommendations);
    let (bar, on_progress) = bulk_progress(BulkOperation::DeployRecommendations, indices.len());
    let summary = deploy_recommendations(
        &session.client,
        &analysis.recommendations,
        &indices,
        &runner,
        on_progress,
    )
    .await;
    finish_bulk(&bar, &summary);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_indices_converts_and_dedups() {
        let selection = select_indices(&[3, 1, 3], 5).unwrap();
        assert_eq!(selection.iter().copied().collect::<Vec<_>>(), vec![2, 0]);
    }

    #[test]
    fn test_export_path_prefers_explicit_output() {
        let export = FindingsExport {
            file_name: Some("security_findings_20240101_120000.xlsx".to_string()),
            bytes: Vec::new(),
        };
        assert_eq!(
            export_path(Some(PathBuf::from("out.xlsx")), &export),
            PathBuf::from("out.xlsx")
        );
        assert_eq!(
            export_path(None, &export),
            PathBuf::from("security_findings_20240101_120000.xlsx")
        );
    }

    #[test]
    fn test_export_path_ignores_directories_in_suggested_name() {
        let export = FindingsExport {
            file_name: Some("../../etc/findings.xlsx".to_string()),
            bytes: Vec::new(),
        };
        assert_eq!(export_path(None, &export), PathBuf::from("findings.xlsx"));

        let unnamed = FindingsExport { file_name: None, bytes: Vec::new() };
        assert_eq!(export_path(None, &unnamed), PathBuf::from("security_findings.xlsx"));
    }

    #[test]
    fn test_select_indices_rejects_out_of_range() {
        assert!(select_indices(&[0], 2).is_err());
        assert!(select_indices(&[3], 2).is_err());
    }
}
