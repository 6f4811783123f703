use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chart_harvester::SourceKind;
use chart_harvester::application;
use chart_harvester::crawling::{CategoryEnd, HarvestReport};
use chart_harvester::infrastructure::{HarvestConfig, init_logging_with_config};

#[derive(Debug, Parser)]
#[command(
    name = "chart-harvester",
    version,
    about = "Harvest song and movie charts into SQLite, redb and a JSON backup"
)]
struct Cli {
    /// Config file (TOML, JSON or YAML); defaults to ./chart-harvester.toml when present
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Crawl every configured category and persist the records
    Harvest {
        #[arg(long, value_enum)]
        source: SourceKind,
    },
    /// Quality report and cleaned JSON/CSV export of stored records
    Report {
        #[arg(long, value_enum)]
        source: SourceKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = HarvestConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging_with_config(&config.logging)?;

    match cli.command {
        Command::Harvest { source } => {
            let report = application::harvest(&config, source).await?;
            print_summary(&report);
        }
        Command::Report { source } => {
            let outcome = application::report(&config, source).await?;
            println!("📊 {source} data quality");
            println!("{}", outcome.quality);
            println!(
                "🧹 cleaned: {} -> {} rows ({} duplicates, {} out of range)",
                outcome.cleaning.input,
                outcome.cleaning.output,
                outcome.cleaning.duplicates_removed,
                outcome.cleaning.out_of_range_removed
            );
            println!("✓ {}", outcome.files.json.display());
            println!("✓ {}", outcome.files.csv.display());
        }
    }

    Ok(())
}

fn print_summary(report: &HarvestReport) {
    println!("\n{}", "=".repeat(50));
    println!(
        "✅ harvest complete: {} {} accepted",
        report.total_accepted,
        report.source.item_noun()
    );
    for category in &report.categories {
        let note = match &category.end {
            CategoryEnd::FetchFailed(reason) => format!(" (fetch failed: {reason})"),
            CategoryEnd::Empty if category.accepted == 0 => " (no data)".to_string(),
            CategoryEnd::CategoryBudget => " (category budget reached)".to_string(),
            CategoryEnd::GlobalBudget => " (global budget reached)".to_string(),
            _ => String::new(),
        };
        println!("  - {}: {}{}", category.category.name, category.accepted, note);
    }
    if report.sink_failures.relational > 0 || report.sink_failures.document > 0 {
        println!(
            "⚠️  sink failures: relational {}, document {}",
            report.sink_failures.relational, report.sink_failures.document
        );
    }
    match &report.backup {
        Ok(count) => println!("💾 backup: {count} records"),
        Err(reason) => println!("❌ backup failed: {reason}"),
    }
    println!("{}", "=".repeat(50));
}
