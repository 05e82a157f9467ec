//! Incremental post-history acquisition for one account.
//!
//! Small accounts are paged straight out of the timeline endpoint. Large ones
//! are crawled through rendered search one date window at a time, and the
//! identifiers found are enriched through the bulk lookup endpoint. Either
//! way, only posts not already in `<handle>.json` are fetched and added.

pub mod batch;
pub mod config;
pub mod dedup;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod parser;
pub mod store;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod traits;
pub mod types;

pub use config::{Config, ScrapeConfig};
pub use engine::{Clients, Engine, RunReport, Stage};
pub use error::{Result, ScrapeError};
pub use store::AccountStore;
pub use traits::{AccountApi, ChromeLauncher, RenderSurface, SessionLauncher, TimelineApi};
pub use types::{
    AccountProfile, DateRange, Discovery, DiscoveryWindow, IdentifierSet, PostId, PostRecord,
    PostRecords, Strategy,
};
