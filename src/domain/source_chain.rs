//! Mirror fallback order for card images
//!
//! The chain is computed up front as an explicit list. Callers walk it in
//! order and stop at the first candidate that yields content.

use super::asset::{AssetKind, AssetReference, CandidateSourceList};

pub const PESMASTER_VARIATION_PREFIX: &str =
    "https://www.pesmaster.com/efootball-2022/graphics/players/Variation2022/";
pub const HUB_2023_PREFIX: &str = "https://efootballhub.net/images/efootball23/players/";
pub const HUB_2023_ROOT: &str = "https://efootballhub.net/images/efootball23/";
pub const HUB_2024_ROOT: &str = "https://efootballhub.net/images/efootball24/";

/// Rewrites a URL that starts with `from` so it starts with `to` instead
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorRule {
    pub from: String,
    pub to: String,
}

impl MirrorRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    fn apply(&self, url: &str) -> Option<String> {
        url.strip_prefix(self.from.as_str())
            .map(|rest| format!("{}{rest}", self.to))
    }
}

#[derive(Debug, Clone)]
pub struct SourceChain {
    rules: Vec<MirrorRule>,
}

impl Default for SourceChain {
    fn default() -> Self {
        Self::new(vec![
            MirrorRule::new(PESMASTER_VARIATION_PREFIX, HUB_2023_PREFIX),
            MirrorRule::new(HUB_2023_ROOT, HUB_2024_ROOT),
        ])
    }
}

impl SourceChain {
    #[must_use]
    pub const fn new(rules: Vec<MirrorRule>) -> Self {
        Self { rules }
    }

    /// Candidate URLs for a reference, primary first.
    ///
    /// Each step rewrites the previous candidate with the first matching
    /// rule; a rule is used at most once so the list is always finite.
    #[must_use]
    pub fn resolve(&self, reference: &AssetReference) -> CandidateSourceList {
        if reference.kind == AssetKind::TeamCrest {
            return CandidateSourceList::new([reference.url.clone()]);
        }

        let mut urls = vec![reference.url.clone()];
        let mut used = vec![false; self.rules.len()];
        let mut current = reference.url.clone();

        loop {
            let next = self
                .rules
                .iter()
                .enumerate()
                .filter(|(idx, _)| !used[*idx])
                .find_map(|(idx, rule)| rule.apply(&current).map(|url| (idx, url)));

            match next {
                Some((idx, url)) => {
                    used[idx] = true;
                    urls.push(url.clone());
                    current = url;
                }
                None => break,
            }
        }

        CandidateSourceList::new(urls)
    }
}
