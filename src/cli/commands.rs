//! CLI commands implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::models::{OfferStatus, RunOutcome, RunReport};
use crate::repository::{OfferFilter, OfferRepository, SearchRepository};
use crate::scrapers::FetchClient;
use crate::server;
use crate::services::{ScrapeLimits, ScrapeService};

#[derive(Parser)]
#[command(name = "jobhound")]
#[command(about = "Job listing acquisition and triage tracking")]
#[command(version)]
pub struct Cli {
    /// Data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory, config file and database
    Init,

    /// Manage saved searches
    Search {
        #[command(subcommand)]
        command: SearchCommands,
    },

    /// Run the scrape pipeline for a search (or all active searches)
    Scrape {
        /// Search ID to scrape
        search_id: Option<String>,
        /// Scrape every active search
        #[arg(short, long)]
        all: bool,
    },

    /// List discovered offers
    Offers {
        /// Owning user
        user_id: String,
        /// Filter by status (active, discarded, interested_david, interested_ivan)
        #[arg(short, long)]
        status: Option<String>,
        /// Filter by search ID
        #[arg(long)]
        search: Option<String>,
        /// Free-text filter against title/company/location
        #[arg(short, long)]
        query: Option<String>,
        #[arg(short, long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        per_page: u32,
    },

    /// Set the triage status of an offer
    Triage {
        offer_id: String,
        /// One of: active, discarded, interested_david, interested_ivan
        status: String,
    },

    /// Show aggregate stats for a user
    Stats { user_id: String },

    /// Show configuration and database status
    Status,

    /// Start the API server
    Serve {
        /// Host to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand)]
enum SearchCommands {
    /// Create a saved search
    Add { user_id: String, keywords: String },
    /// List a user's searches
    List { user_id: String },
    /// Flip a search's active flag
    Toggle { search_id: String },
    /// Delete a search and all its offers
    Rm { search_id: String },
}

/// Parse arguments and dispatch.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.data_dir)?;

    match cli.command {
        Commands::Init => {
            settings.init()?;
            // Opening the repositories creates the schema.
            let (_, _) = open_repos(&settings)?;
            println!(
                "Initialized {} (database: {})",
                settings.data_dir.display(),
                settings.database_path.display()
            );
            Ok(())
        }
        Commands::Search { command } => run_search_command(&settings, command),
        Commands::Scrape { search_id, all } => run_scrape(&settings, search_id, all).await,
        Commands::Offers {
            user_id,
            status,
            search,
            query,
            page,
            per_page,
        } => run_offers(&settings, user_id, status, search, query, page, per_page),
        Commands::Triage { offer_id, status } => run_triage(&settings, &offer_id, &status),
        Commands::Stats { user_id } => run_stats(&settings, &user_id),
        Commands::Status => run_status(&settings),
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| settings.server.host.clone());
            let port = port.unwrap_or(settings.server.port);
            server::serve(&settings, &host, port).await
        }
    }
}

fn open_repos(
    settings: &Settings,
) -> anyhow::Result<(Arc<SearchRepository>, Arc<OfferRepository>)> {
    let searches = Arc::new(SearchRepository::new(&settings.database_path)?);
    let offers = Arc::new(OfferRepository::new(&settings.database_path)?);
    Ok((searches, offers))
}

fn build_scraper(
    settings: &Settings,
    searches: Arc<SearchRepository>,
    offers: Arc<OfferRepository>,
) -> ScrapeService {
    let fetcher = Arc::new(FetchClient::new(
        Duration::from_secs(settings.scrape.timeout_secs),
        (settings.scrape.delay_ms_min, settings.scrape.delay_ms_max),
        settings.scrape.max_attempts,
        settings.scrape.expected_markers.clone(),
    ));
    ScrapeService::new(
        searches,
        offers,
        fetcher,
        settings.base_url.clone(),
        ScrapeLimits {
            max_pages: settings.scrape.max_pages,
            max_run_duration: Duration::from_secs(settings.scrape.max_run_secs),
            parse_retries: settings.scrape.parse_retries,
        },
        settings.scrape.max_concurrent_runs,
    )
}

fn run_search_command(settings: &Settings, command: SearchCommands) -> anyhow::Result<()> {
    let (searches, _) = open_repos(settings)?;
    match command {
        SearchCommands::Add { user_id, keywords } => {
            let search = searches.create(&user_id, &keywords)?;
            println!(
                "{} search {} ({})",
                style("Created").green(),
                search.id,
                search.keywords
            );
        }
        SearchCommands::List { user_id } => {
            let all = searches.get_for_user(&user_id)?;
            if all.is_empty() {
                println!("No searches for {}", user_id);
            }
            for search in all {
                let flag = if search.active {
                    style("active").green()
                } else {
                    style("paused").dim()
                };
                let last_run = search
                    .last_run_at
                    .map(|dt| dt.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}  [{}]  {:24}  last run: {}",
                    search.id, flag, search.keywords, last_run
                );
            }
        }
        SearchCommands::Toggle { search_id } => {
            let search = searches.toggle_active(&search_id)?;
            let state = if search.active { "active" } else { "paused" };
            println!("Search {} is now {}", search.id, state);
        }
        SearchCommands::Rm { search_id } => {
            if searches.delete(&search_id)? {
                println!("{} search {}", style("Deleted").red(), search_id);
            } else {
                println!("No search {}", search_id);
            }
        }
    }
    Ok(())
}

async fn run_scrape(
    settings: &Settings,
    search_id: Option<String>,
    all: bool,
) -> anyhow::Result<()> {
    let (searches, offers) = open_repos(settings)?;
    let scraper = build_scraper(settings, searches.clone(), offers);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("valid progress template"),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));

    if all {
        spinner.set_message("scraping all active searches…");
        let results = scraper.run_all_active().await?;
        spinner.finish_and_clear();
        if results.is_empty() {
            println!("No active searches.");
        }
        for (search, result) in results {
            match result {
                Ok(report) => print_report(&search.keywords, &report),
                Err(e) => println!(
                    "{} {} ({}): {}",
                    style("Failed").red(),
                    search.id,
                    search.keywords,
                    e
                ),
            }
        }
        return Ok(());
    }

    let Some(search_id) = search_id else {
        anyhow::bail!("pass a search ID or --all");
    };
    spinner.set_message(format!("scraping search {}…", search_id));
    let report = scraper.run_search(&search_id).await?;
    spinner.finish_and_clear();
    print_report(&search_id, &report);
    Ok(())
}

fn print_report(label: &str, report: &RunReport) {
    let outcome = match report.outcome {
        RunOutcome::Done => style("done").green(),
        RunOutcome::Failed => style("FAILED").red(),
    };
    println!(
        "{} [{}]: {} pages, {} seen, {} new",
        label, outcome, report.pages_fetched, report.total_processed, report.new_offers
    );
    for error in &report.errors {
        println!("  page {}: {}", error.page, error.message);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_offers(
    settings: &Settings,
    user_id: String,
    status: Option<String>,
    search: Option<String>,
    query: Option<String>,
    page: u32,
    per_page: u32,
) -> anyhow::Result<()> {
    let (_, offers) = open_repos(settings)?;
    let status = match status {
        Some(raw) => Some(
            OfferStatus::from_str(&raw)
                .ok_or_else(|| anyhow::anyhow!("unknown status: {}", raw))?,
        ),
        None => None,
    };
    let result = offers.list(
        &OfferFilter {
            user_id,
            status,
            job_search_id: search,
            text: query,
        },
        page,
        per_page,
    )?;

    for offer in &result.items {
        println!(
            "{}  [{:16}]  {} @ {} ({})",
            offer.id,
            offer.status.as_str(),
            offer.title,
            offer.company,
            offer.location
        );
    }
    println!(
        "page {}/{} — {} offers total",
        result.page,
        result.total_pages.max(1),
        result.total
    );
    Ok(())
}

fn run_triage(settings: &Settings, offer_id: &str, status: &str) -> anyhow::Result<()> {
    let (_, offers) = open_repos(settings)?;
    let status = OfferStatus::from_str(status)
        .ok_or_else(|| anyhow::anyhow!("unknown status: {}", status))?;
    let offer = offers.set_status(offer_id, status)?;
    println!(
        "{} {} -> {}",
        style("Triaged").green(),
        offer.title,
        offer.status.as_str()
    );
    Ok(())
}

fn run_stats(settings: &Settings, user_id: &str) -> anyhow::Result<()> {
    let (_, offers) = open_repos(settings)?;
    let stats = offers.stats(user_id)?;
    println!(
        "Searches: {} ({} active)",
        stats.total_searches, stats.active_searches
    );
    println!(
        "Offers:   {} ({} discovered today)",
        stats.total_offers, stats.today_offers
    );
    for status in OfferStatus::ALL {
        let count = stats
            .offers_by_status
            .get(status.as_str())
            .copied()
            .unwrap_or(0);
        println!("  {:16} {}", status.as_str(), count);
    }
    Ok(())
}

fn run_status(settings: &Settings) -> anyhow::Result<()> {
    println!("Data dir:  {}", settings.data_dir.display());
    println!("Database:  {}", settings.database_path.display());
    println!("Base URL:  {}", settings.base_url);
    let (searches, offers) = open_repos(settings)?;
    println!("Searches:  {}", searches.count()?);
    println!("Offers:    {}", offers.count()?);
    Ok(())
}
