//! Fetch-with-retry primitive
//!
//! One URL, bounded attempts. Every response is classified as content,
//! content-absent or transient. Only transient outcomes are retried, with
//! exponential backoff (`base * 2^attempt`). A fixed delay is slept before
//! every outbound request to bound load on the catalog host.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::domain::HarvestError;
use crate::infrastructure::config::NetworkConfig;
use crate::infrastructure::http_client::{HttpResponse, HttpTransport, TransportError};

#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Total attempts for transient failures (at least one attempt is made)
    pub max_retries: u32,
    pub base_delay: Duration,
    pub request_delay: Duration,
    pub timeout: Duration,
    pub soft_404_marker: String,
}

impl FetchPolicy {
    #[must_use]
    pub fn from_network(config: &NetworkConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_base_delay(),
            request_delay: config.request_delay(),
            timeout: config.request_timeout(),
            soft_404_marker: config.soft_404_marker.clone(),
        }
    }
}

/// Backoff slept after failed attempt `attempt` (0-based)
#[must_use]
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1_u32 << attempt.min(16))
}

#[derive(Debug, Clone)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    pub final_url: String,
    pub attempts: u32,
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Content(Fetched),
    /// Resource does not exist at this URL (404-ish or a soft-404 page)
    NotFound { reason: String },
    TransientFailure { attempts: u32, last_error: String },
}

#[derive(Debug)]
enum Classified {
    Content(HttpResponse),
    Absent(String),
    Transient(String),
}

/// Classifies a completed response. `soft_404_marker` is only checked for
/// binary assets; HTML documents legitimately start with it.
fn classify_response(response: HttpResponse, soft_404_marker: Option<&str>) -> Classified {
    let status = response.status;
    if (200..300).contains(&status) {
        if let Some(marker) = soft_404_marker {
            if is_soft_404(&response.body, marker) {
                return Classified::Absent(format!("soft 404 page at {}", response.final_url));
            }
        }
        return Classified::Content(response);
    }

    match status {
        408 | 429 | 500..=599 => Classified::Transient(format!("HTTP {status}")),
        _ => Classified::Absent(format!("HTTP {status}")),
    }
}

fn classify_transport_error(error: TransportError) -> Classified {
    match error {
        TransportError::Timeout | TransportError::Connection(_) => {
            Classified::Transient(error.to_string())
        }
        TransportError::InvalidRequest(_) => Classified::Absent(error.to_string()),
    }
}

fn is_soft_404(body: &[u8], marker: &str) -> bool {
    let start = body
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(body.len());
    let body = &body[start..];
    let marker = marker.as_bytes();
    !marker.is_empty() && body.len() >= marker.len() && body[..marker.len()].eq_ignore_ascii_case(marker)
}

pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    policy: FetchPolicy,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: FetchPolicy) -> Self {
        Self { transport, policy }
    }

    /// Fetches a binary asset with the configured timeout and retry budget
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        self.fetch_with(url, self.policy.timeout, self.policy.max_retries)
            .await
    }

    pub async fn fetch_with(&self, url: &str, timeout: Duration, max_retries: u32) -> FetchOutcome {
        let marker = self.policy.soft_404_marker.clone();
        self.run(url, timeout, max_retries, Some(&marker)).await
    }

    /// Fetches an HTML document (league, team, player or updates page)
    pub async fn fetch_document(&self, url: &str) -> Result<Fetched, HarvestError> {
        match self
            .run(url, self.policy.timeout, self.policy.max_retries, None)
            .await
        {
            FetchOutcome::Content(fetched) => Ok(fetched),
            FetchOutcome::NotFound { reason } => Err(HarvestError::NotFound {
                reference: format!("{url} ({reason})"),
            }),
            FetchOutcome::TransientFailure {
                attempts,
                last_error,
            } => Err(HarvestError::TransientFailure {
                url: url.to_string(),
                attempts,
                message: last_error,
            }),
        }
    }

    async fn run(
        &self,
        url: &str,
        request_timeout: Duration,
        max_retries: u32,
        soft_404_marker: Option<&str>,
    ) -> FetchOutcome {
        let max_attempts = max_retries.max(1);
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            if !self.policy.request_delay.is_zero() {
                sleep(self.policy.request_delay).await;
            }

            let classified = match timeout(request_timeout, self.transport.get(url, request_timeout)).await
            {
                Ok(Ok(response)) => classify_response(response, soft_404_marker),
                Ok(Err(error)) => classify_transport_error(error),
                Err(_) => Classified::Transient(TransportError::Timeout.to_string()),
            };

            match classified {
                Classified::Content(response) => {
                    if attempt > 0 {
                        debug!("Fetched {} on attempt {}", url, attempt + 1);
                    }
                    return FetchOutcome::Content(Fetched {
                        bytes: response.body,
                        final_url: response.final_url,
                        attempts: attempt + 1,
                    });
                }
                Classified::Absent(reason) => {
                    debug!("Content absent at {}: {}", url, reason);
                    return FetchOutcome::NotFound { reason };
                }
                Classified::Transient(reason) => {
                    last_error = reason;
                    if attempt + 1 < max_attempts {
                        let delay = backoff_delay(self.policy.base_delay, attempt);
                        debug!(
                            "🔄 Attempt {}/{} for {} failed ({}), retrying in {:?}",
                            attempt + 1,
                            max_attempts,
                            url,
                            last_error,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        warn!(
            "❌ Giving up on {} after {} attempt(s): {}",
            url, max_attempts, last_error
        );
        FetchOutcome::TransientFailure {
            attempts: max_attempts,
            last_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedTransport, Reply};

    fn policy(max_retries: u32, base_ms: u64) -> FetchPolicy {
        FetchPolicy {
            max_retries,
            base_delay: Duration::from_millis(base_ms),
            request_delay: Duration::ZERO,
            timeout: Duration::from_secs(5),
            soft_404_marker: "<!DOCTYPE html>".to_string(),
        }
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(800));
    }

    #[test]
    fn soft_404_detection_ignores_case_and_leading_whitespace() {
        assert!(is_soft_404(b"  \n<!doctype HTML><html>", "<!DOCTYPE html>"));
        assert!(!is_soft_404(b"\x89PNG\r\n", "<!DOCTYPE html>"));
        assert!(!is_soft_404(b"<!DOC", "<!DOCTYPE html>"));
    }

    #[tokio::test]
    async fn success_returns_bytes() {
        let transport = ScriptedTransport::new().with("u", [Reply::ok(b"PNGDATA")]);
        let fetcher = Fetcher::new(transport.clone(), policy(3, 10));
        match fetcher.fetch("u").await {
            FetchOutcome::Content(fetched) => {
                assert_eq!(fetched.bytes, b"PNGDATA");
                assert_eq!(fetched.attempts, 1);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(transport.calls_to("u"), 1);
    }

    #[tokio::test]
    async fn soft_404_is_absent_and_not_retried() {
        let transport = ScriptedTransport::new().with("u", [Reply::ok(b"<!DOCTYPE html><p>gone")]);
        let fetcher = Fetcher::new(transport.clone(), policy(3, 10));
        assert!(matches!(fetcher.fetch("u").await, FetchOutcome::NotFound { .. }));
        assert_eq!(transport.calls_to("u"), 1);
    }

    #[tokio::test]
    async fn documents_skip_the_soft_404_check() {
        let transport = ScriptedTransport::new().with("page", [Reply::ok(b"<!DOCTYPE html><html></html>")]);
        let fetcher = Fetcher::new(transport, policy(3, 10));
        assert!(fetcher.fetch_document("page").await.is_ok());
    }

    #[tokio::test]
    async fn http_404_is_absent() {
        let transport = ScriptedTransport::new().with("u", [Reply::status(404)]);
        let fetcher = Fetcher::new(transport.clone(), policy(3, 10));
        assert!(matches!(fetcher.fetch("u").await, FetchOutcome::NotFound { .. }));
        assert_eq!(transport.calls_to("u"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn always_timing_out_source_uses_exact_attempt_budget_and_backoff() {
        let transport = ScriptedTransport::new().with("slow", [Reply::timeout()]);
        let fetcher = Fetcher::new(transport.clone(), policy(3, 100));

        let started = tokio::time::Instant::now();
        let outcome = fetcher.fetch("slow").await;
        let elapsed = started.elapsed();

        assert!(matches!(outcome, FetchOutcome::TransientFailure { attempts: 3, .. }));
        assert_eq!(transport.calls_to("slow"), 3);
        // 100ms after the first failure, 200ms after the second, none after the last
        assert!(elapsed >= Duration::from_millis(300), "elapsed {elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn hung_transport_is_cut_off_by_timeout() {
        let transport = ScriptedTransport::new().with("hang", [Reply::hang()]);
        let fetcher = Fetcher::new(transport.clone(), policy(2, 10));
        let outcome = fetcher
            .fetch_with("hang", Duration::from_millis(50), 2)
            .await;
        assert!(matches!(outcome, FetchOutcome::TransientFailure { attempts: 2, .. }));
        assert_eq!(transport.calls_to("hang"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_then_success_recovers() {
        let transport = ScriptedTransport::new().with("u", [Reply::status(503), Reply::ok(b"ok")]);
        let fetcher = Fetcher::new(transport.clone(), policy(3, 10));
        match fetcher.fetch("u").await {
            FetchOutcome::Content(fetched) => assert_eq!(fetched.attempts, 2),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn request_delay_is_applied_before_every_attempt() {
        let transport = ScriptedTransport::new().with("u", [Reply::timeout()]);
        let mut p = policy(2, 0);
        p.request_delay = Duration::from_millis(500);
        let fetcher = Fetcher::new(transport, p);

        let started = tokio::time::Instant::now();
        let _ = fetcher.fetch("u").await;
        assert!(started.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn document_failures_map_to_taxonomy() {
        let transport = ScriptedTransport::new()
            .with("gone", [Reply::status(410)])
            .with("down", [Reply::connection_error()]);
        let fetcher = Fetcher::new(transport, policy(1, 0));

        assert!(matches!(
            fetcher.fetch_document("gone").await,
            Err(HarvestError::NotFound { .. })
        ));
        assert!(matches!(
            fetcher.fetch_document("down").await,
            Err(HarvestError::TransientFailure { attempts: 1, .. })
        ));
    }
}
