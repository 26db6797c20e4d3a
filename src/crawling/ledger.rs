//! Dedup and persistence ledger
//!
//! Tracks every entity seen during a run. `claim` is the single gate to
//! acquisition work: only the caller that moves an entity out of `Unseen`
//! gets `true`. Terminal states never regress. Permanent skips are appended
//! and synced to the skip-list file before the state changes. The append
//! holds only the file lock, so claims are never stalled behind an fsync.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

use crate::domain::{EntityKey, HarvestError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerState {
    Unseen,
    InFlight,
    Done,
    PermanentlySkipped,
}

impl LedgerState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::PermanentlySkipped)
    }
}

pub struct Ledger {
    entries: Mutex<HashMap<EntityKey, LedgerState>>,
    skip_list: Option<SkipList>,
}

/// Append handle on the skip-list file, opened once at load
struct SkipList {
    path: PathBuf,
    file: Mutex<File>,
}

impl Ledger {
    /// Ledger without durable storage
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            skip_list: None,
        }
    }

    /// Opens (creating if absent) the skip-list and loads every entry as
    /// `PermanentlySkipped`. Unparsable lines are logged and ignored.
    pub fn load(skip_list: &Path) -> Result<Self, HarvestError> {
        if let Some(dir) = skip_list.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .map_err(|e| HarvestError::io(format!("creating {}", dir.display()), e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(skip_list)
            .map_err(|e| HarvestError::io(format!("opening skip list {}", skip_list.display()), e))?;

        let mut entries = HashMap::new();
        for (line_no, line) in BufReader::new(&file).lines().enumerate() {
            let line = line.map_err(|e| {
                HarvestError::io(format!("reading skip list {}", skip_list.display()), e)
            })?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match EntityKey::canonicalize(line) {
                Ok(key) => {
                    entries.insert(key, LedgerState::PermanentlySkipped);
                }
                Err(e) => warn!("Ignoring skip list line {}: {}", line_no + 1, e),
            }
        }

        info!(
            "📄 Loaded {} skipped entities from {}",
            entries.len(),
            skip_list.display()
        );
        Ok(Self {
            entries: Mutex::new(entries),
            skip_list: Some(SkipList {
                path: skip_list.to_path_buf(),
                file: Mutex::new(file),
            }),
        })
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<EntityKey, LedgerState>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn state(&self, key: EntityKey) -> LedgerState {
        self.entries()
            .get(&key)
            .copied()
            .unwrap_or(LedgerState::Unseen)
    }

    /// Fast-path check consulted before claiming
    #[must_use]
    pub fn is_skipped(&self, key: EntityKey) -> bool {
        self.state(key) == LedgerState::PermanentlySkipped
    }

    /// Unseen → InFlight. Returns `true` only for the caller that won.
    pub fn claim(&self, key: EntityKey) -> bool {
        let mut entries = self.entries();
        match entries.get(&key) {
            None | Some(LedgerState::Unseen) => {
                entries.insert(key, LedgerState::InFlight);
                true
            }
            Some(_) => false,
        }
    }

    /// → Done, unless already terminal. Returns whether the state changed.
    pub fn mark_done(&self, key: EntityKey) -> bool {
        let mut entries = self.entries();
        let state = entries.entry(key).or_insert(LedgerState::Unseen);
        if state.is_terminal() {
            return false;
        }
        *state = LedgerState::Done;
        true
    }

    /// → PermanentlySkipped, unless already terminal. The key is appended to
    /// the skip-list before the state changes.
    ///
    /// Blocking: the append ends with an fsync.
    pub fn mark_skipped(&self, key: EntityKey) -> Result<bool, HarvestError> {
        let Some(skip_list) = &self.skip_list else {
            return Ok(self.transition_to_skipped(key));
        };

        // Serializes appenders; the map lock is only taken for the checks.
        let mut file = skip_list.file.lock().unwrap_or_else(PoisonError::into_inner);
        if self.state(key).is_terminal() {
            return Ok(false);
        }
        append_line(&mut file, &key.to_string()).map_err(|e| {
            HarvestError::io(
                format!("appending to skip list {}", skip_list.path.display()),
                e,
            )
        })?;
        Ok(self.transition_to_skipped(key))
    }

    fn transition_to_skipped(&self, key: EntityKey) -> bool {
        let mut entries = self.entries();
        let state = entries.entry(key).or_insert(LedgerState::Unseen);
        if state.is_terminal() {
            return false;
        }
        *state = LedgerState::PermanentlySkipped;
        debug!("Entity {} permanently skipped", key);
        true
    }

    #[must_use]
    pub fn count(&self, state: LedgerState) -> usize {
        self.entries().values().filter(|s| **s == state).count()
    }
}

fn append_line(file: &mut File, line: &str) -> io::Result<()> {
    writeln!(file, "{line}")?;
    file.sync_data()
}
