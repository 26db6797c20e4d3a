//! # Crawling
//!
//! Run-scoped shared state and the hierarchical scheduler. Nothing in here
//! is global: every run builds its own `HarvestContext`.

pub mod acquisition;
pub mod asset_cache;
pub mod ledger;
pub mod scheduler;
pub mod state;

pub use acquisition::{AcquireFailure, Acquired, AssetAcquirer};
pub use asset_cache::SharedAssetCache;
pub use ledger::{Ledger, LedgerState};
pub use scheduler::{CardOutcome, PlayerOutcome, Scheduler};
pub use state::{HarvestContext, RunStats, RunSummary};
