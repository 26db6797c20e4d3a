//! Output tree writer
//!
//! Layout under the output root:
//! - `<group>/<team>/<entity>.<ext>`: one texture per entity and team
//! - `<group>/map_teams.csv`: team ids seen in the group
//! - `<group>/<team>/map_ids.csv`: entity ids written for the team
//!
//! A texture is committed by persisting a temp file without clobbering, so
//! the first writer of a path wins and later writers observe `AlreadyExists`.
//! The filesystem is the source of truth for "already materialized".

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error};

use crate::domain::{EntityKey, HarvestError, TeamId};
use crate::infrastructure::codec::ImageCodec;

pub const TEAM_MANIFEST: &str = "map_teams.csv";
pub const ID_MANIFEST: &str = "map_ids.csv";
pub const SIDER_INI: &str = "sider.ini.txt";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputPath {
    pub group: String,
    pub team: TeamId,
    pub entity: EntityKey,
}

impl OutputPath {
    pub fn new(group: &str, team: TeamId, entity: EntityKey) -> Self {
        Self {
            group: sanitize_group(group),
            team,
            entity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Committed,
    AlreadyExists,
}

pub struct OutputWriter {
    root: PathBuf,
    extension: String,
    codec: Arc<dyn ImageCodec>,
    /// Known lines per manifest file, loaded from disk on first touch
    manifests: Mutex<HashMap<PathBuf, HashSet<String>>>,
}

impl OutputWriter {
    pub fn new(root: impl Into<PathBuf>, extension: &str, codec: Arc<dyn ImageCodec>) -> Self {
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
            codec,
            manifests: Mutex::new(HashMap::new()),
        }
    }

    pub fn ensure_root(&self) -> Result<(), HarvestError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            HarvestError::io(format!("creating output root {}", self.root.display()), e)
        })
    }

    #[must_use]
    pub fn texture_path(&self, path: &OutputPath) -> PathBuf {
        self.root
            .join(&path.group)
            .join(path.team.to_string())
            .join(format!("{}.{}", path.entity, self.extension))
    }

    /// Lock-free existence check consulted before any network work
    #[must_use]
    pub fn exists(&self, path: &OutputPath) -> bool {
        self.texture_path(path).exists()
    }

    /// Encodes and commits one texture, then records it in the manifests.
    ///
    /// Blocking: call from the blocking pool.
    pub fn materialize(
        &self,
        path: &OutputPath,
        foreground: &[u8],
        background: Option<&[u8]>,
    ) -> Result<MaterializeOutcome, HarvestError> {
        let destination = self.texture_path(path);
        if destination.exists() {
            self.record(path)?;
            return Ok(MaterializeOutcome::AlreadyExists);
        }

        let encoded = self.codec.render(foreground, background).map_err(|e| {
            error!("❌ Codec failure for {}: {}", destination.display(), e);
            HarvestError::CodecFailure {
                path: destination.display().to_string(),
                message: e.to_string(),
            }
        })?;

        let outcome = self.commit(&destination, &encoded)?;
        self.record(path)?;
        Ok(outcome)
    }

    fn commit(&self, destination: &Path, bytes: &[u8]) -> Result<MaterializeOutcome, HarvestError> {
        let leaf = destination.parent().unwrap_or(&self.root);
        fs::create_dir_all(leaf)
            .map_err(|e| HarvestError::io(format!("creating {}", leaf.display()), e))?;

        let mut staged = tempfile::Builder::new()
            .prefix(".staging-")
            .suffix(".part")
            .tempfile_in(leaf)
            .map_err(|e| HarvestError::io(format!("staging in {}", leaf.display()), e))?;
        staged
            .write_all(bytes)
            .and_then(|()| staged.as_file().sync_all())
            .map_err(|e| HarvestError::io(format!("writing {}", destination.display()), e))?;

        match staged.persist_noclobber(destination) {
            Ok(_) => {
                debug!("Committed {}", destination.display());
                Ok(MaterializeOutcome::Committed)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!("Lost commit race for {}", destination.display());
                Ok(MaterializeOutcome::AlreadyExists)
            }
            Err(e) => Err(HarvestError::io(
                format!("committing {}", destination.display()),
                e.error,
            )),
        }
    }

    /// Lists `path` in its group and team manifests if it is not listed yet.
    /// Also used for textures found on disk, which repairs manifests lost
    /// after a commit.
    ///
    /// Blocking: call from the blocking pool.
    pub fn record(&self, path: &OutputPath) -> Result<(), HarvestError> {
        let group_dir = self.root.join(&path.group);
        let team = path.team.to_string();
        self.append_unique(&group_dir.join(TEAM_MANIFEST), &team)?;
        self.append_unique(&group_dir.join(&team).join(ID_MANIFEST), &path.entity.to_string())?;
        Ok(())
    }

    /// Appends `value` to `manifest` unless it is already listed. Returns
    /// whether a line was written.
    fn append_unique(&self, manifest: &Path, value: &str) -> Result<bool, HarvestError> {
        let mut manifests = self
            .manifests
            .lock()
            .map_err(|_| HarvestError::io("locking manifests", io::Error::other("poisoned lock")))?;

        let known = match manifests.entry(manifest.to_path_buf()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(
                read_lines(manifest)
                    .map_err(|e| HarvestError::io(format!("reading {}", manifest.display()), e))?,
            ),
        };
        if known.contains(value) {
            return Ok(false);
        }

        if let Some(dir) = manifest.parent() {
            fs::create_dir_all(dir)
                .map_err(|e| HarvestError::io(format!("creating {}", dir.display()), e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(manifest)
            .map_err(|e| HarvestError::io(format!("opening {}", manifest.display()), e))?;
        writeln!(file, "{value}")
            .map_err(|e| HarvestError::io(format!("appending to {}", manifest.display()), e))?;

        known.insert(value.to_string());
        Ok(true)
    }

    /// Writes `sider.ini.txt` in the output root with one livecpk line per
    /// group directory. Returns the file path and the number of lines.
    pub fn write_sider_ini(&self) -> Result<(PathBuf, usize), HarvestError> {
        let mut groups: Vec<String> = fs::read_dir(&self.root)
            .map_err(|e| HarvestError::io(format!("listing {}", self.root.display()), e))?
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        groups.sort();

        let contents: String = groups
            .iter()
            .map(|group| format!("cpk.root = \".\\livecpk\\Minifaces\\{group}\"\n"))
            .collect();

        let target = self.root.join(SIDER_INI);
        fs::write(&target, contents)
            .map_err(|e| HarvestError::io(format!("writing {}", target.display()), e))?;
        Ok((target, groups.len()))
    }
}

fn read_lines(path: &Path) -> io::Result<HashSet<String>> {
    match fs::File::open(path) {
        Ok(file) => BufReader::new(file)
            .lines()
            .map(|line| line.map(|l| l.trim().to_string()))
            .filter(|line| line.as_ref().map_or(true, |l| !l.is_empty()))
            .collect(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(HashSet::new()),
        Err(e) => Err(e),
    }
}

/// Makes a group name safe to use as a single directory name
#[must_use]
pub fn sanitize_group(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_end_matches(['.', ' ']);
    if cleaned.is_empty() || cleaned == "." {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}
