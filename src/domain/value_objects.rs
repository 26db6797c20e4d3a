//! # Domain Value Objects
//!
//! Canonical identifiers for the entities found in the catalog.
//!
//! The catalog encodes many variant ids for one logical player (one per card
//! edition). The in-game id lives in the low 24 bits of every variant, so the
//! canonical key is the variant id masked to those bits. Any discovery path
//! (team roster, updates feed, card image name) therefore lands on one key.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use super::errors::HarvestError;

/// Number of low-order bits of a variant id that identify the player
pub const ENTITY_KEY_BITS: u32 = 24;
const ENTITY_KEY_MASK: u64 = (1 << ENTITY_KEY_BITS) - 1;

static PLAYER_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/player/([^/?#]+)").expect("static regex"));

static TEAM_LOGO_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:e_)?(\d+)(?:_w)?(?:\.png)?$").expect("static regex")
});

/// Canonical player key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey(u32);

impl EntityKey {
    /// Collapses a numeric variant id to its canonical key
    #[must_use]
    pub const fn from_variant_id(id: u64) -> Self {
        Self((id & ENTITY_KEY_MASK) as u32)
    }

    /// Canonicalizes a raw identifier.
    ///
    /// Accepts a bare decimal id, a player page URL (`.../player/<id>/`) or a
    /// card image name (`<id>_.png`).
    pub fn canonicalize(raw: &str) -> Result<Self, HarvestError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(HarvestError::malformed(raw, "empty identifier"));
        }

        let candidate = match PLAYER_PATH_RE.captures(trimmed) {
            Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
            None => trimmed,
        };
        let digits = strip_image_suffix(candidate);

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HarvestError::malformed(raw, "identifier is not a decimal id"));
        }

        let id: u64 = digits
            .parse()
            .map_err(|e| HarvestError::malformed(raw, format!("identifier out of range: {e}")))?;
        Ok(Self::from_variant_id(id))
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityKey {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::canonicalize(s)
    }
}

/// Team identifier as used for output directories and the team manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(u32);

impl TeamId {
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Derives the team id from a crest reference such as
    /// `/efootball-2022/graphics/teamlogos/e_000123_w.png`.
    pub fn from_crest(raw: &str) -> Result<Self, HarvestError> {
        let trimmed = raw.trim();
        let segment = match trimmed.split_once("/teamlogos/") {
            Some((_, rest)) => rest.split(['/', '?', '#']).next().unwrap_or(""),
            None => trimmed.rsplit('/').next().unwrap_or(""),
        };

        let caps = TEAM_LOGO_RE
            .captures(segment)
            .ok_or_else(|| HarvestError::malformed(raw, "crest name is not a team id"))?;
        let digits = caps.get(1).map_or("", |m| m.as_str());
        let id: u32 = digits
            .parse()
            .map_err(|e| HarvestError::malformed(raw, format!("team id out of range: {e}")))?;
        Ok(Self(id))
    }

    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn strip_image_suffix(name: &str) -> &str {
    let name = name.strip_suffix(".png").unwrap_or(name);
    name.trim_end_matches('_')
}
