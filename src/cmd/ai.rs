use crate::api::ai::{self, AiStats};
use crate::api::policies;
use crate::cmd::progress::{create_spinner, finish_error, finish_success};
use crate::cmd::{ServerArgs, Session};
use crate::error::Result;
use crate::model::PolicyItem;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct ExplainArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Policy ID
    pub id: String,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    #[command(flatten)]
    pub server: ServerArgs,
}

fn print_stats(stats: &AiStats) {
    println!("\n{}", "AI usage (this session)".cyan().bold());
    println!("  Explanations:   {}", stats.explanations);
    println!("  Tokens used:    {}", stats.tokens_used);
    println!("  Estimated cost: ${:.4}", stats.total_cost);
    println!("  Avg response:   {:.1}s", stats.avg_response_time);
}

/// Explain a policy in plain language through the backend's assistant
pub async fn explain(args: ExplainArgs) -> Result<()> {
    let session = Session::open(&args.server).await?;

    let policy = policies::get_policy(&session.client, &args.id).await?;
    let name = PolicyItem::new(args.id.clone(), policy)
        .display_name()
        .unwrap_or("Unnamed Policy")
        .to_string();

    let spinner = create_spinner(&format!("Getting AI explanation for {}...", name));
    let explanation = match ai::explain_policy(&session.client, &args.id).await {
        Ok(explanation) => {
            finish_success(&spinner, &format!("AI Explanation: {}", name));
            explanation
        }
        Err(e) => {
            finish_error(&spinner, "Failed to explain policy");
            return Err(e);
        }
    };

    if !explanation.ai_enabled {
        println!("\n{} {}", "ℹ".yellow(), "AI features are not enabled on the backend".yellow());
        println!("{}", explanation.explanation);
        return Ok(());
    }

    println!("\n{}", "Explanation".cyan().bold());
    println!("{}", explanation.explanation);

    if !explanation.impact.is_empty() {
        println!("\n{}", "User impact".yellow().bold());
        println!("{}", explanation.impact);
    }

    if !explanation.recommendations.is_empty() {
        println!("\n{}", "Recommendations".green().bold());
        for rec in &explanation.recommendations {
            println!("  • {}", rec);
        }
    }

    if let Some(stats) = &explanation.session_stats {
        print_stats(stats);
    }

    Ok(())
}

/// Show AI usage counters for the backend session
pub async fn stats(args: StatsArgs) -> Result<()> {
    let session = Session::open(&args.server).await?;
    let stats = ai::ai_stats(&session.client).await?;

    if !stats.ai_enabled {
        println!("{} AI features are not enabled on the backend", "ℹ".yellow());
        return Ok(());
    }

    print_stats(&stats);
    Ok(())
}
