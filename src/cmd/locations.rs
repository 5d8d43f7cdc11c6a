use crate::api::locations::{self, NamedLocation};
use crate::cmd::{ServerArgs, Session};
use crate::error::Result;
use clap::Args;
use colored::Colorize;

#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Show IDs and ranges under each row
    #[arg(long)]
    pub details: bool,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Named location ID
    pub id: String,
}

fn trusted_badge(location: &NamedLocation) -> String {
    if location.is_trusted {
        "trusted".green().to_string()
    } else {
        "-".dimmed().to_string()
    }
}

fn print_ranges(location: &NamedLocation, indent: &str) {
    if !location.ip_ranges.is_empty() {
        println!("{}IP ranges: {}", indent, location.ip_ranges.join(", "));
    }
    if !location.countries_and_regions.is_empty() {
        println!(
            "{}Countries/regions: {}",
            indent,
            location.countries_and_regions.join(", ")
        );
    }
    if location.include_unknown_countries_and_regions {
        println!("{}Includes unknown countries/regions", indent);
    }
}

/// List Conditional Access named locations
pub async fn list(args: ListArgs) -> Result<()> {
    let session = Session::open(&args.server).await?;
    let locations = locations::list_named_locations(&session.client).await?;

    if locations.is_empty() {
        println!("{} No named locations found", "ℹ".yellow());
        return Ok(());
    }

    println!("\n{} {} named locations\n", "→".cyan(), locations.len());
    println!(
        "{:<45} {:<20} {}",
        "Name".bold(),
        "Type".bold(),
        "Trusted".bold()
    );
    println!("{}", "─".repeat(75));

    for location in &locations {
        println!(
            "{:<45} {:<20} {}",
            location.label(),
            location.location_type,
            trusted_badge(location)
        );
        if args.details {
            println!("   ID: {}", location.id.dimmed());
            print_ranges(location, "   ");
            println!();
        }
    }

    Ok(())
}

/// Show one named location
pub async fn show(args: ShowArgs) -> Result<()> {
    let session = Session::open(&args.server).await?;
    let location = locations::get_named_location(&session.client, &args.id).await?;

    println!("{}", location.label().cyan().bold());
    println!("  ID:      {}", location.id);
    println!("  Type:    {}", location.location_type);
    println!("  Trusted: {}", trusted_badge(&location));
    print_ranges(&location, "  ");
    Ok(())
}
