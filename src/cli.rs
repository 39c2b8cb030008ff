// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// The CLI is the "control panel" for the two jobs:
// - scrape: walk a listing and collect links
// - visit: open links whose cooldown has expired
// - run: both at once
// - clear: forget everything
// - status: show the discovered-link counter and the visit queue
//
// Every tuning flag can also come from a LINK_HARVESTER_* environment
// variable (or a .env file next to where you run the tool).
//
// Rust concepts:
// - Derive macros: clap generates the parser from these structs
// - #[command(flatten)]: reuse one group of arguments in several subcommands
// =============================================================================

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use link_harvester::config::{HarvestConfig, DEFAULT_STORE_PATH};
use link_harvester::page::{DEFAULT_LINK_SELECTOR, DEFAULT_NEXT_SELECTOR};

#[derive(Parser, Debug)]
#[command(
    name = "link-harvester",
    version,
    about = "Harvest links from a paginated listing and revisit them on a cooldown",
    long_about = "link-harvester walks the pages of a result listing, remembers every link it finds, \
                  and then opens each of those links once per cooldown window (7 days by default). \
                  State lives in a small JSON file so runs can be stopped and resumed at any time."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON file that holds discovered links and the visit queue
    #[arg(long, global = true, env = "LINK_HARVESTER_STORE", default_value = DEFAULT_STORE_PATH)]
    pub store: PathBuf,

    /// Keep all state in memory for this run only
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(flatten)]
    pub timing: TimingArgs,
}

/// Scheduler timings. Defaults match the values the tool was tuned with.
#[derive(Args, Debug)]
pub struct TimingArgs {
    /// Milliseconds between scrape ticks (also the per-page settle wait)
    #[arg(long, global = true, env = "LINK_HARVESTER_SCRAPE_INTERVAL_MS", default_value_t = 2000)]
    pub scrape_interval_ms: u64,

    /// Milliseconds between visit ticks
    #[arg(long, global = true, env = "LINK_HARVESTER_VISIT_INTERVAL_MS", default_value_t = 4000)]
    pub visit_interval_ms: u64,

    /// Hours before a visited link is due again
    #[arg(long, global = true, env = "LINK_HARVESTER_COOLDOWN_HOURS", default_value_t = 168)]
    pub cooldown_hours: u64,

    /// Seconds to wait for a visited page to finish loading
    #[arg(long, global = true, env = "LINK_HARVESTER_LOAD_TIMEOUT_SECS", default_value_t = 30)]
    pub load_timeout_secs: u64,

    /// Seconds before any single HTTP request is abandoned
    #[arg(long, global = true, env = "LINK_HARVESTER_REQUEST_TIMEOUT_SECS", default_value_t = 10)]
    pub request_timeout_secs: u64,
}

/// Where the listing is and how to read it.
#[derive(Args, Debug)]
pub struct ListingArgs {
    /// URL of the first page of the listing
    pub listing_url: String,

    /// CSS selector matching the result links on a listing page
    #[arg(long, env = "LINK_HARVESTER_LINK_SELECTOR", default_value = DEFAULT_LINK_SELECTOR)]
    pub link_selector: String,

    /// CSS selector matching the "next page" control
    #[arg(long, env = "LINK_HARVESTER_NEXT_SELECTOR", default_value = DEFAULT_NEXT_SELECTOR)]
    pub next_selector: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Walk a listing page by page and record every link
    ///
    /// Example: link-harvester scrape "https://example.com/search?page=1"
    Scrape {
        #[command(flatten)]
        listing: ListingArgs,
    },

    /// Open every link whose cooldown has expired, one per tick
    Visit,

    /// Scrape and visit at the same time
    Run {
        #[command(flatten)]
        listing: ListingArgs,
    },

    /// Forget all discovered links and the visit queue
    Clear,

    /// Show how many links are known and what is due
    Status {
        /// Output as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    /// Collects the global flags into the library's config struct.
    pub fn config(&self) -> HarvestConfig {
        HarvestConfig {
            store_path: self.store.clone(),
            ephemeral: self.ephemeral,
            cooldown: Duration::from_secs(self.timing.cooldown_hours.saturating_mul(3600)),
            scrape_interval: Duration::from_millis(self.timing.scrape_interval_ms),
            visit_interval: Duration::from_millis(self.timing.visit_interval_ms),
            load_timeout: Duration::from_secs(self.timing.load_timeout_secs),
            request_timeout: Duration::from_secs(self.timing.request_timeout_secs),
        }
    }
}


// -----------------------------------------------------------------------------
// NOTES:
//
// 1. Why `global = true`?
//    - Global flags may appear before or after the subcommand:
//      `link-harvester --store a.json status` and
//      `link-harvester status --store a.json` both work
//
// 2. Why both `env` and `default_value`?
//    - clap checks the flag first, then the environment variable, then the
//      default, so a .env file can set up a long-running box once
// -----------------------------------------------------------------------------
