use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use review_miner::config::Config;
use review_miner::constants;
use review_miner::dataset;
use review_miner::error::Result;
use review_miner::logging;
use review_miner::pipeline::Pipeline;
use review_miner::report::Analyzer;
use review_miner::sources::{AppStoreSource, GooglePlaySource};
use review_miner::types::{Review, ReviewSource, SourceQuery};

#[derive(Parser)]
#[command(name = "review_miner")]
#[command(about = "App-store review scraper and report generator")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape reviews and persist the flat dataset
    Collect {
        /// Specific sources to run (comma-separated). Available: google_play, app_store
        #[arg(long)]
        sources: Option<String>,
        /// Dataset file to write (overrides config.toml)
        #[arg(long)]
        output: Option<String>,
    },
    /// Run the fixed aggregation report over a persisted dataset
    Report {
        /// Dataset file to read (overrides config.toml)
        #[arg(long)]
        input: Option<String>,
    },
    /// Collect and report in one go
    Run {
        /// Specific sources to run (comma-separated)
        #[arg(long)]
        sources: Option<String>,
        /// Dataset file to write (overrides config.toml)
        #[arg(long)]
        output: Option<String>,
    },
}

fn create_source(source_name: &str, config: &Config) -> Option<(Box<dyn ReviewSource>, Result<SourceQuery>)> {
    match source_name {
        constants::GOOGLE_PLAY_SOURCE => Some((
            Box::new(GooglePlaySource::new()),
            config.google_play.to_query(),
        )),
        constants::APP_STORE_SOURCE => Some((
            Box::new(AppStoreSource::new()),
            config.app_store.to_query(),
        )),
        _ => None,
    }
}

fn parse_source_names(sources: Option<String>) -> Vec<String> {
    match sources {
        Some(source_list) => source_list
            .split(',')
            .map(|s| s.trim().to_string())
            .collect(),
        None => constants::supported_sources()
            .into_iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

async fn collect(source_names: &[String], config: &Config, output: &str) -> Result<()> {
    let mut all_reviews: Vec<Review> = Vec::new();

    for source_name in source_names {
        let span = tracing::info_span!("Running source", source = %source_name);
        let _enter = span.enter();

        let Some((source, query)) = create_source(source_name, config) else {
            warn!("Unknown source specified");
            println!("⚠️  Unknown source: {}", source_name);
            continue;
        };
        let query = query?;

        info!("Starting pipeline");
        let (reviews, result) = Pipeline::run_for_source(source, &query).await?;
        info!("Pipeline finished");

        println!("\n📊 Pipeline Results for {}:", source_name);
        println!("   Total reviews: {}", result.total_reviews);
        println!("   Collected: {}", result.collected_reviews);
        println!("   Skipped: {}", result.skipped_reviews);
        println!("   Errors: {}", result.errors.len());

        if !result.errors.is_empty() {
            warn!("{} errors encountered during pipeline run", result.errors.len());
            println!("\n⚠️  Errors encountered:");
            for error in &result.errors {
                println!("   - {}", error);
            }
        }

        all_reviews.extend(reviews);
    }

    dataset::write_dataset(output, &all_reviews)?;
    println!("\n💾 Saved {} reviews to {}", all_reviews.len(), output);
    Ok(())
}

fn report(input: &str) -> Result<()> {
    let analyzer = Analyzer::from_dataset(input)?;
    analyzer.print_report()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Collect { sources, output } => {
            println!("🔄 Running collector pipeline...");
            let source_names = parse_source_names(sources);
            let output = output.unwrap_or_else(|| config.output.dataset_path.clone());
            collect(&source_names, &config, &output).await?;
        }
        Commands::Report { input } => {
            println!("📈 Running report queries...");
            let input = input.unwrap_or_else(|| config.output.dataset_path.clone());
            if let Err(e) = report(&input) {
                error!("Report run failed: {}", e);
                println!("❌ Report run failed: {}", e);
                return Err(e);
            }
            println!("✅ Report run completed successfully");
        }
        Commands::Run { sources, output } => {
            println!("🚀 Running full pipeline (collect + report)...");
            let source_names = parse_source_names(sources);
            let output = output.unwrap_or_else(|| config.output.dataset_path.clone());

            println!("\n📥 Step 1: Collecting reviews...");
            collect(&source_names, &config, &output).await?;

            println!("\n📈 Step 2: Running report...");
            report(&output)?;
            println!("✅ Full pipeline completed successfully!");
        }
    }
    Ok(())
}
