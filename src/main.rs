use capm::config::ConfigManager;
use capm::{cmd, error};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "capm",
    about = "Manage Conditional Access policies from the terminal",
    version,
    long_about = "Conditional Access policy manager\n\n\
                  List, sort and bulk-delete policies, deploy templates, and turn\n\
                  security assessment reports into deployed policy recommendations."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check that the backend is reachable
    Health(cmd::connection::HealthArgs),

    /// Connect the backend to a tenant with app credentials
    Connect(cmd::connection::ConnectArgs),

    /// Drop the backend's Graph connection
    Disconnect(cmd::connection::DisconnectArgs),

    /// List, inspect and delete Conditional Access policies
    #[command(subcommand)]
    Policies(PolicyCommands),

    /// Browse named locations
    #[command(subcommand)]
    Locations(LocationCommands),

    /// Create the security groups the policy framework targets
    #[command(subcommand)]
    Groups(GroupCommands),

    /// AI policy explanations
    #[command(subcommand)]
    Ai(AiCommands),

    /// Browse and deploy policy templates
    #[command(subcommand)]
    Templates(TemplateCommands),

    /// Analyze assessment reports and deploy recommended policies
    #[command(subcommand)]
    Report(ReportCommands),

    /// Show or change configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum PolicyCommands {
    /// List policies as a sortable table
    List(cmd::policies::ListArgs),

    /// Print one policy as JSON
    Show(cmd::policies::ShowArgs),

    /// Delete selected policies
    Delete(cmd::policies::DeleteArgs),
}

#[derive(Subcommand, Debug)]
enum LocationCommands {
    /// List named locations
    List(cmd::locations::ListArgs),

    /// Show one named location
    Show(cmd::locations::ShowArgs),
}

#[derive(Subcommand, Debug)]
enum GroupCommands {
    /// Create persona and exclusion groups, skipping existing ones
    Create(cmd::groups::CreateArgs),
}

#[derive(Subcommand, Debug)]
enum AiCommands {
    /// Explain a policy in plain language
    Explain(cmd::ai::ExplainArgs),

    /// Show AI usage for the session
    Stats(cmd::ai::StatsArgs),
}

#[derive(Subcommand, Debug)]
enum TemplateCommands {
    /// List the template catalog
    List(cmd::templates::ListArgs),

    /// Deploy templates
    Deploy(cmd::templates::DeployArgs),
}

#[derive(Subcommand, Debug)]
enum ReportCommands {
    /// Upload a report and show its recommendations
    Analyze(cmd::report::AnalyzeArgs),

    /// Upload a report and deploy recommended policies
    Deploy(cmd::report::DeployArgs),

    /// Upload a report and save its findings as an Excel workbook
    Export(cmd::report::ExportArgs),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set(cmd::config::SetArgs),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("capm=debug")
    } else if let Ok(filter) = EnvFilter::try_from_default_env() {
        filter
    } else {
        let level = ConfigManager::new()
            .and_then(|m| m.load_config())
            .map(|c| c.log_level)
            .unwrap_or_default();
        let level = if level.is_empty() { "warn".to_string() } else { level };
        EnvFilter::try_new(format!("capm={}", level)).unwrap_or_else(|_| EnvFilter::new("capm=warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> error::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Health(args) => cmd::connection::health(args).await,
        Commands::Connect(args) => cmd::connection::connect(args).await,
        Commands::Disconnect(args) => cmd::connection::disconnect(args).await,
        Commands::Policies(command) => match command {
            PolicyCommands::List(args) => cmd::policies::list(args).await,
            PolicyCommands::Show(args) => cmd::policies::show(args).await,
            PolicyCommands::Delete(args) => cmd::policies::delete(args).await,
        },
        Commands::Locations(command) => match command {
            LocationCommands::List(args) => cmd::locations::list(args).await,
            LocationCommands::Show(args) => cmd::locations::show(args).await,
        },
        Commands::Groups(command) => match command {
            GroupCommands::Create(args) => cmd::groups::create(args).await,
        },
        Commands::Ai(command) => match command {
            AiCommands::Explain(args) => cmd::ai::explain(args).await,
            AiCommands::Stats(args) => cmd::ai::stats(args).await,
        },
        Commands::Templates(command) => match command {
            TemplateCommands::List(args) => cmd::templates::list(args).await,
            TemplateCommands::Deploy(args) => cmd::templates::deploy(args).await,
        },
        Commands::Report(command) => match command {
            ReportCommands::Analyze(args) => cmd::report::analyze(args).await,
            ReportCommands::Deploy(args) => cmd::report::deploy(args).await,
            ReportCommands::Export(args) => cmd::report::export(args).await,
        },
        Commands::Config(command) => match command {
            ConfigCommands::Show => cmd::config::show(),
            ConfigCommands::Set(args) => cmd::config::set(args),
        },
    }
}
