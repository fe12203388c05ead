pub mod adapters;
pub mod api_client;
pub mod config;
pub mod errors;
pub mod filter;
pub mod logger;
pub mod monitor;

pub use api_client::{AuctionApiClient, FetchOutcome, PageSource, Paginator};
pub use config::Config;
pub use errors::{ExportError, FetchError};
pub use filter::{FilterCriteria, FilterEngine, Item};
pub use logger::Logger;
pub use monitor::{AuctionMonitor, RunSummary};
