//! Asset references discovered on catalog pages

use serde::{Deserialize, Serialize};

use super::errors::HarvestError;
use super::value_objects::{EntityKey, TeamId};

/// What an image reference on a card represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetKind {
    ForegroundPortrait,
    BackgroundEvent,
    TeamCrest,
}

/// One image reference found on a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetReference {
    pub kind: AssetKind,
    /// Canonical owner; only foregrounds carry one
    pub entity: Option<EntityKey>,
    /// Raw asset name as it appears in the source path (cache key for backgrounds)
    pub name: String,
    /// Absolute source URL
    pub url: String,
    /// Placeholder portrait, never acquired
    pub is_default_variant: bool,
}

impl AssetReference {
    #[must_use]
    pub fn is_acquirable(&self) -> bool {
        match self.kind {
            AssetKind::ForegroundPortrait => !self.is_default_variant && self.entity.is_some(),
            AssetKind::BackgroundEvent => true,
            AssetKind::TeamCrest => false,
        }
    }

    /// Team id encoded in a crest reference
    pub fn team_id(&self) -> Result<TeamId, HarvestError> {
        if self.kind != AssetKind::TeamCrest {
            return Err(HarvestError::malformed(&self.url, "not a team crest reference"));
        }
        TeamId::from_crest(&self.url)
    }
}

/// A card as extracted from a player page, before classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Card {
    /// Position of the card on the page
    pub index: usize,
    /// `data-src` values of every image in the card, in document order
    pub image_sources: Vec<String>,
}

/// League entry from the catalog root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeagueRef {
    pub key: String,
    pub name: String,
    pub url: String,
}

impl LeagueRef {
    #[must_use]
    pub fn is_national(&self) -> bool {
        self.name.contains("National")
    }

    /// Case-insensitive match on key or name
    #[must_use]
    pub fn matches(&self, filter: &str) -> bool {
        self.key.eq_ignore_ascii_case(filter) || self.name.eq_ignore_ascii_case(filter)
    }
}

/// Ordered mirror URLs for one asset, most preferred first
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CandidateSourceList(Vec<String>);

impl CandidateSourceList {
    /// Builds the list, dropping repeated URLs while keeping first occurrences
    #[must_use]
    pub fn new(urls: impl IntoIterator<Item = String>) -> Self {
        let mut out: Vec<String> = Vec::new();
        for url in urls {
            if !out.contains(&url) {
                out.push(url);
            }
        }
        Self(out)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn foreground(default: bool) -> AssetReference {
        AssetReference {
            kind: AssetKind::ForegroundPortrait,
            entity: Some(EntityKey::from_variant_id(77)),
            name: "77".into(),
            url: "https://example.test/77_.png".into(),
            is_default_variant: default,
        }
    }

    #[test]
    fn default_variant_is_not_acquirable() {
        assert!(foreground(false).is_acquirable());
        assert!(!foreground(true).is_acquirable());
    }

    #[test]
    fn candidate_list_keeps_first_occurrence_order() {
        let list = CandidateSourceList::new(["a", "b", "a", "c"].map(String::from));
        assert_eq!(list.as_slice(), ["a", "b", "c"]);
    }

    #[test]
    fn crest_reference_yields_team() {
        let crest = AssetReference {
            kind: AssetKind::TeamCrest,
            entity: None,
            name: "e_000045_w.png".into(),
            url: "https://www.pesmaster.com/efootball-2022/graphics/teamlogos/e_000045_w.png".into(),
            is_default_variant: false,
        };
        assert_eq!(crest.team_id().unwrap(), TeamId::new(45));
        assert!(foreground(false).team_id().is_err());
    }

    #[test]
    fn league_filter_and_national_flag() {
        let league = LeagueRef {
            key: "17".into(),
            name: "National Teams Europe".into(),
            url: "https://www.pesmaster.com/league/17/".into(),
        };
        assert!(league.is_national());
        assert!(league.matches("17"));
        assert!(league.matches("national teams europe"));
        assert!(!league.matches("premier"));
    }
}
