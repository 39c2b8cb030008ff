// src/main.rs
// =============================================================================
// This is the entry point of our CLI application.
//
// What happens here:
// 1. Load .env, set up logging, parse command-line arguments
// 2. Open the link store and build the job controller
// 3. Dispatch to the subcommand handler (scrape / visit / run / clear / status)
// 4. Exit with a proper code (0 = ok, 1 = a job stopped on a storage fault,
//    2 = error)
//
// Long-running commands stop on Ctrl-C: the jobs are toggled off, any tick in
// flight finishes, and everything already recorded stays in the store file.
// =============================================================================

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use cli::{Cli, Commands, ListingArgs};
use link_harvester::config::HarvestConfig;
use link_harvester::jobs::{JobController, JobExit, JobKind, StartOutcome};
use link_harvester::page::{http_client, HttpPageLoader, ListingAdapter, PageAdapter};
use link_harvester::store::LinkStore;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    link_harvester::telemetry::init();

    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

// This is the main application logic
// Returns:
//   Ok(0) = every job ended cleanly (or there was nothing to do)
//   Ok(1) = a job stopped on a storage fault
//   Err = bad arguments, unreadable store, or HTTP client setup failed
async fn run() -> Result<i32> {
    // Parse command-line arguments into our Cli struct
    // This will automatically handle --help, --version, etc.
    let cli = Cli::parse();
    let config = cli.config();
    config.validate()?;

    let store = config
        .open_store()
        .await
        .with_context(|| format!("could not open store {}", config.store_path.display()))?;

    match cli.command {
        Commands::Scrape { listing } => handle_scrape(&config, store, &listing).await,
        Commands::Visit => handle_visit(&config, store).await,
        Commands::Run { listing } => handle_run(&config, store, &listing).await,
        Commands::Clear => handle_clear(store).await,
        Commands::Status { json } => handle_status(&store, json).await,
    }
}

// Builds the controller plus, when a listing was given, its page adapter
fn build_controller(
    config: &HarvestConfig,
    store: LinkStore,
    listing: Option<&ListingArgs>,
) -> Result<(JobController, Option<Arc<dyn PageAdapter>>)> {
    let client = http_client(config.request_timeout).context("could not build HTTP client")?;

    let adapter = match listing {
        Some(args) => {
            let adapter = ListingAdapter::new(
                client.clone(),
                &args.listing_url,
                &args.link_selector,
                &args.next_selector,
            )?;
            Some(Arc::new(adapter) as Arc<dyn PageAdapter>)
        }
        None => None,
    };

    let loader = Arc::new(HttpPageLoader::new(client));
    let controller = JobController::new(store, loader, config.job_settings());
    Ok((controller, adapter))
}

// Handles the 'scrape' subcommand
//
// Parameters:
//   config: timings and where the store lives
//   store: the opened link store
//   listing: URL of the first listing page plus the CSS selectors
//
// Returns: exit code (0 = finished or stopped, 1 = storage fault)
//
// Example:
//   link-harvester scrape "https://example.com/search?page=1"
async fn handle_scrape(config: &HarvestConfig, store: LinkStore, listing: &ListingArgs) -> Result<i32> {
    println!("🔍 Scraping listing: {}", listing.listing_url);

    let (mut controller, adapter) = build_controller(config, store, Some(listing))?;
    if let Some(adapter) = adapter {
        controller.start_scrape(adapter).await;
    }

    wait_for_jobs(&mut controller).await;
    finish(&mut controller, &[JobKind::Scrape]).await
}

// Handles the 'visit' subcommand
//
// The queue is regenerated up front; if nothing is due we exit right away
// instead of starting a job that would stop on its first tick.
async fn handle_visit(config: &HarvestConfig, store: LinkStore) -> Result<i32> {
    let (mut controller, _) = build_controller(config, store, None)?;

    match controller.start_visits().await? {
        StartOutcome::NothingToDo => {
            println!("✅ No links are due for a visit");
            return Ok(0);
        }
        StartOutcome::Started | StartOutcome::AlreadyRunning => {
            let queued = controller.store().visit_queue().snapshot().await?.links.len();
            println!("🌐 Visiting {} due link(s)...", queued);
        }
    }

    wait_for_jobs(&mut controller).await;
    finish(&mut controller, &[JobKind::Visit]).await
}

// Handles the 'run' subcommand: scrape and visit at the same time
//
// On a fresh store nothing is due until the first page has been scraped, so
// visits are retried while scraping goes on (see JobController::run_until_idle)
//
// Example:
//   link-harvester run "https://example.com/search?page=1"
async fn handle_run(config: &HarvestConfig, store: LinkStore, listing: &ListingArgs) -> Result<i32> {
    println!("🔍 Scraping listing: {}", listing.listing_url);

    let (mut controller, adapter) = build_controller(config, store, Some(listing))?;
    if let Some(adapter) = adapter {
        controller.start_scrape(adapter).await;
    }
    println!("🌐 Links will be visited as soon as they are due");

    let outcome = tokio::select! {
        result = controller.run_until_idle() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(result) => result?,
        None => {
            info!("interrupted, stopping jobs");
            controller.stop_all().await;
        }
    }

    finish(&mut controller, &[JobKind::Scrape, JobKind::Visit]).await
}

// Handles the 'clear' subcommand
// Wipes every discovered link and the visit queue; there is no undo
async fn handle_clear(store: LinkStore) -> Result<i32> {
    let before = store.count().await?;
    store.clear().await?;
    println!("🧹 Cleared {} link(s) and the visit queue", before);
    Ok(0)
}

// Waits until every running job stops on its own, or Ctrl-C toggles them off
async fn wait_for_jobs(controller: &mut JobController) {
    let interrupted = tokio::select! {
        _ = controller.wait_idle() => false,
        _ = tokio::signal::ctrl_c() => true,
    };

    if interrupted {
        info!("interrupted, stopping jobs");
        controller.stop_all().await;
    }
}

// Prints how each job ended and turns that into an exit code
async fn finish(controller: &mut JobController, kinds: &[JobKind]) -> Result<i32> {
    let mut failed = false;

    for kind in kinds {
        match controller.last_exit(*kind).await {
            Some(JobExit::Exhausted) => println!("✅ {} job finished: no more work", kind),
            Some(JobExit::Stopped) => println!("⏹️  {} job stopped", kind),
            Some(JobExit::Failed(reason)) => {
                println!("❌ {} job failed: {}", kind, reason);
                failed = true;
            }
            None => {}
        }
    }

    println!("📋 Links discovered: {}", controller.link_count().await?);
    Ok(if failed { 1 } else { 0 })
}

// One row of the status table / JSON output
#[derive(Debug, Serialize)]
struct LinkRow {
    url: String,
    last_timestamp: i64,
    due: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    link_count: usize,
    due_count: usize,
    queue_length: usize,
    queue_position: usize,
    queue_remaining: usize,
    links: Vec<LinkRow>,
}

// Handles the 'status' subcommand
//
// Parameters:
//   store: the opened link store
//   json: print JSON instead of a table
//
// Returns: always 0 once the store could be read
async fn handle_status(store: &LinkStore, json: bool) -> Result<i32> {
    let all = store.get_all().await?;
    let queue = store.visit_queue().snapshot().await?;

    let links: Vec<LinkRow> = all
        .into_iter()
        .map(|(url, last_timestamp)| LinkRow {
            due: store.is_eligible(last_timestamp),
            url,
            last_timestamp,
        })
        .collect();

    let report = StatusReport {
        link_count: links.len(),
        due_count: links.iter().filter(|l| l.due).count(),
        queue_length: queue.links.len(),
        queue_position: queue.current_index,
        queue_remaining: queue.remaining(),
        links,
    };

    print_report(&report, json)?;
    Ok(0)
}

// Prints the report either as a table or JSON
fn print_report(report: &StatusReport, json: bool) -> Result<()> {
    if json {
        let json_output = serde_json::to_string_pretty(report)?;
        println!("{}", json_output);
    } else {
        print_table(report);
    }
    Ok(())
}

fn print_table(report: &StatusReport) {
    println!("{:<70} {:<20} {:<5}", "URL", "LAST SEEN (UTC)", "DUE");
    println!("{}", "=".repeat(97));

    for row in &report.links {
        // Truncate URL if too long for display
        let url_display = if row.url.chars().count() > 67 {
            format!("{}...", row.url.chars().take(67).collect::<String>())
        } else {
            row.url.clone()
        };
        let due = if row.due { "yes" } else { "no" };

        println!("{:<70} {:<20} {:<5}", url_display, format_timestamp(row.last_timestamp), due);
    }

    println!();
    println!("📊 Summary:");
    println!("   🔗 Discovered: {}", report.link_count);
    println!("   ⏰ Due for a visit: {}", report.due_count);
    println!(
        "   📋 Visit queue: {}/{} done, {} left",
        report.queue_position, report.queue_length, report.queue_remaining
    );
}

fn format_timestamp(millis: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}
