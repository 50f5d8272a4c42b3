// Upstream ingest: stats API tables, scoreboards and boxscores, sportsbook
// props and the injury page, written into the courtcast store.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod injury_report;
pub mod props;
pub mod result_set;
pub mod runner;
pub mod scoreboard;

pub use client::{Feed, HttpFeed, Site};
pub use error::IngestError;
pub use runner::{rebuild_derived_injuries, scrape_all, ScrapeSummary};
