//! Asset acquisition: candidate list + fetch-with-retry + shared cache
//!
//! Candidates are walked strictly in order and the walk stops at the first
//! one that yields content. Absent candidates advance the walk; transient
//! ones are remembered so that an exhausted list can tell "gone" from
//! "could not reach".

use std::sync::Arc;
use tracing::debug;

use super::asset_cache::SharedAssetCache;
use crate::domain::{AssetKind, AssetReference, CandidateSourceList, HarvestError, SourceChain};
use crate::infrastructure::fetcher::{FetchOutcome, Fetcher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireFailure {
    /// Every candidate reported the content as absent
    NotFound,
    /// At least one candidate failed transiently and none had content
    Transient {
        url: String,
        attempts: u32,
        message: String,
    },
}

impl AcquireFailure {
    #[must_use]
    pub fn into_error(self, reference: &str) -> HarvestError {
        match self {
            Self::NotFound => HarvestError::NotFound {
                reference: reference.to_string(),
            },
            Self::Transient {
                url,
                attempts,
                message,
            } => HarvestError::TransientFailure {
                url,
                attempts,
                message,
            },
        }
    }
}

pub type Acquired = Result<Arc<Vec<u8>>, AcquireFailure>;

pub struct AssetAcquirer {
    fetcher: Arc<Fetcher>,
    chain: SourceChain,
    backgrounds: SharedAssetCache<Acquired>,
}

impl AssetAcquirer {
    pub fn new(fetcher: Arc<Fetcher>, chain: SourceChain) -> Self {
        Self {
            fetcher,
            chain,
            backgrounds: SharedAssetCache::new(),
        }
    }

    /// Acquires one reference. Backgrounds go through the shared cache,
    /// keyed by asset name.
    pub async fn acquire(&self, reference: &AssetReference) -> Acquired {
        let candidates = self.chain.resolve(reference);
        match reference.kind {
            AssetKind::BackgroundEvent => {
                self.backgrounds
                    .get_or_fetch(&reference.name, || self.acquire_from(&candidates))
                    .await
            }
            AssetKind::ForegroundPortrait | AssetKind::TeamCrest => {
                self.acquire_from(&candidates).await
            }
        }
    }

    pub async fn acquire_from(&self, candidates: &CandidateSourceList) -> Acquired {
        let mut transient: Option<AcquireFailure> = None;

        for url in candidates.iter() {
            match self.fetcher.fetch(url).await {
                FetchOutcome::Content(fetched) => {
                    debug!("Acquired {} ({} bytes)", url, fetched.bytes.len());
                    return Ok(Arc::new(fetched.bytes));
                }
                FetchOutcome::NotFound { reason } => {
                    debug!("Candidate {} absent: {}", url, reason);
                }
                FetchOutcome::TransientFailure {
                    attempts,
                    last_error,
                } => {
                    transient = Some(AcquireFailure::Transient {
                        url: url.to_string(),
                        attempts,
                        message: last_error,
                    });
                }
            }
        }

        Err(transient.unwrap_or(AcquireFailure::NotFound))
    }

    #[must_use]
    pub fn cached_backgrounds(&self) -> usize {
        self.backgrounds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{Reply, ScriptedTransport, fast_policy};

    fn acquirer(transport: Arc<ScriptedTransport>) -> AssetAcquirer {
        AssetAcquirer::new(
            Arc::new(Fetcher::new(transport, fast_policy())),
            SourceChain::default(),
        )
    }

    fn background(url: &str) -> AssetReference {
        AssetReference {
            kind: AssetKind::BackgroundEvent,
            entity: None,
            name: "event_b02.png".into(),
            url: url.into(),
            is_default_variant: false,
        }
    }

    #[tokio::test]
    async fn stops_at_first_candidate_with_content() {
        let transport = ScriptedTransport::new()
            .with("a", [Reply::status(404)])
            .with("b", [Reply::ok(b"<!DOCTYPE html> soft")])
            .with("c", [Reply::ok(b"third")])
            .with("d", [Reply::ok(b"fourth")]);
        let acquirer = acquirer(transport.clone());

        let list = CandidateSourceList::new(["a", "b", "c", "d"].map(String::from));
        let bytes = acquirer.acquire_from(&list).await.unwrap();

        assert_eq!(bytes.as_slice(), b"third");
        assert_eq!(transport.calls(), ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn all_absent_is_not_found() {
        let transport = ScriptedTransport::new();
        let acquirer = acquirer(transport);
        let list = CandidateSourceList::new(["x".to_string(), "y".to_string()]);
        assert_eq!(acquirer.acquire_from(&list).await, Err(AcquireFailure::NotFound));
    }

    #[tokio::test]
    async fn any_transient_candidate_makes_exhaustion_transient() {
        let transport = ScriptedTransport::new()
            .with("x", [Reply::connection_error()])
            .with("y", [Reply::status(404)]);
        let acquirer = acquirer(transport);
        let list = CandidateSourceList::new(["x".to_string(), "y".to_string()]);

        match acquirer.acquire_from(&list).await {
            Err(AcquireFailure::Transient { url, attempts, .. }) => {
                assert_eq!(url, "x");
                assert_eq!(attempts, fast_policy().max_retries);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn background_is_fetched_once_for_many_cards() {
        let url = "https://cdn.test/event_b02.png";
        let transport = ScriptedTransport::new().with(url, [Reply::ok(b"bg")]);
        let acquirer = Arc::new(acquirer(transport.clone()));

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let acquirer = Arc::clone(&acquirer);
                tokio::spawn(async move { acquirer.acquire(&background(url)).await })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            assert_eq!(result.unwrap().unwrap().as_slice(), b"bg");
        }

        assert_eq!(transport.calls_to(url), 1);
        assert_eq!(acquirer.cached_backgrounds(), 1);
    }

    #[test]
    fn failures_map_onto_the_taxonomy() {
        assert_eq!(AcquireFailure::NotFound.into_error("r").kind(), "not_found");
        let transient = AcquireFailure::Transient {
            url: "u".into(),
            attempts: 2,
            message: "timeout".into(),
        };
        assert_eq!(transient.into_error("r").kind(), "transient_failure");
    }
}
