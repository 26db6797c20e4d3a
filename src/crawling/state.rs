//! # Run State
//!
//! Everything a harvest run shares between its workers: the adapters, the
//! ledger, the background cache and the statistics. One `HarvestContext`
//! lives for exactly one run and is handed to every task behind an `Arc`.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::acquisition::AssetAcquirer;
use super::ledger::Ledger;
use crate::infrastructure::config::HarvestConfig;
use crate::infrastructure::fetcher::Fetcher;
use crate::infrastructure::output_writer::OutputWriter;
use crate::infrastructure::parsing::PageParser;

pub struct HarvestContext {
    pub config: HarvestConfig,
    pub fetcher: Arc<Fetcher>,
    pub parser: Arc<dyn PageParser>,
    pub acquirer: AssetAcquirer,
    pub ledger: Ledger,
    pub writer: Arc<OutputWriter>,
    pub stats: RunStats,
}

/// Live counters, updated lock-free by every worker
#[derive(Debug)]
pub struct RunStats {
    started: Instant,
    pub leagues: AtomicU64,
    pub leagues_failed: AtomicU64,
    pub teams: AtomicU64,
    pub teams_failed: AtomicU64,
    pub players_seen: AtomicU64,
    pub players_done: AtomicU64,
    pub permanently_skipped: AtomicU64,
    pub skipped_known: AtomicU64,
    pub duplicates: AtomicU64,
    pub malformed: AtomicU64,
    pub failed: AtomicU64,
    pub textures_written: AtomicU64,
    pub textures_present: AtomicU64,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            started: Instant::now(),
            leagues: AtomicU64::new(0),
            leagues_failed: AtomicU64::new(0),
            teams: AtomicU64::new(0),
            teams_failed: AtomicU64::new(0),
            players_seen: AtomicU64::new(0),
            players_done: AtomicU64::new(0),
            permanently_skipped: AtomicU64::new(0),
            skipped_known: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            textures_written: AtomicU64::new(0),
            textures_present: AtomicU64::new(0),
        }
    }
}

impl RunStats {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        let get = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        RunSummary {
            leagues: get(&self.leagues),
            leagues_failed: get(&self.leagues_failed),
            teams: get(&self.teams),
            teams_failed: get(&self.teams_failed),
            players_seen: get(&self.players_seen),
            players_done: get(&self.players_done),
            permanently_skipped: get(&self.permanently_skipped),
            skipped_known: get(&self.skipped_known),
            duplicates: get(&self.duplicates),
            malformed: get(&self.malformed),
            failed: get(&self.failed),
            textures_written: get(&self.textures_written),
            textures_present: get(&self.textures_present),
            elapsed: self.started.elapsed(),
        }
    }
}

/// Aggregate result of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub leagues: u64,
    pub leagues_failed: u64,
    pub teams: u64,
    pub teams_failed: u64,
    pub players_seen: u64,
    pub players_done: u64,
    /// Newly marked permanently skipped in this run
    pub permanently_skipped: u64,
    /// Excluded up front by the loaded skip-list
    pub skipped_known: u64,
    /// Already claimed through another path in this run
    pub duplicates: u64,
    pub malformed: u64,
    /// Left unresolved; eligible for a later run
    pub failed: u64,
    pub textures_written: u64,
    pub textures_present: u64,
    #[serde(serialize_with = "serialize_secs", rename = "elapsed_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(elapsed: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(elapsed.as_secs_f64())
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Harvest finished in {:.1}s", self.elapsed.as_secs_f64())?;
        writeln!(
            f,
            "  leagues:  {} ({} failed)",
            self.leagues, self.leagues_failed
        )?;
        writeln!(f, "  teams:    {} ({} failed)", self.teams, self.teams_failed)?;
        writeln!(
            f,
            "  players:  {} seen, {} done, {} newly skipped, {} known skipped, {} duplicate, {} malformed, {} failed",
            self.players_seen,
            self.players_done,
            self.permanently_skipped,
            self.skipped_known,
            self.duplicates,
            self.malformed,
            self.failed
        )?;
        write!(
            f,
            "  textures: {} written, {} already present",
            self.textures_written, self.textures_present
        )
    }
}
