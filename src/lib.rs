// src/lib.rs
// =============================================================================
// link-harvester: collect links from a paginated listing, then revisit each
// one once per cooldown window.
//
// Modules:
// - store: persisted link map and visit queue (LinkStore, VisitQueue)
// - page: the page adapter and page loader capabilities, plus HTTP versions
// - jobs: the scrape and visit schedulers and the controller that toggles them
// - config: runtime settings and defaults
// - telemetry: tracing subscriber setup
//
// The binary in src/main.rs is a thin CLI over this library.
// =============================================================================

pub mod config;
pub mod jobs;
pub mod page;
pub mod store;
pub mod telemetry;
