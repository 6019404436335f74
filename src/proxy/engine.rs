//! Validation engine for checking many proxies concurrently

use crate::error::{CheckError, EngineError};
use crate::proxy::connector::Connector;
use crate::proxy::fetcher::fetch_until;
use crate::proxy::models::ValidationResult;
use crate::proxy::resolver::SchemeResolver;
use crate::proxy::target::ValidationTarget;
use crossbeam_channel::Receiver;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default number of concurrent validations
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Configuration for the validation engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of concurrent workers
    pub concurrency: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

/// Runs one attempt per proxy against a shared target
#[derive(Debug, Clone)]
pub struct Validator {
    target: Arc<ValidationTarget>,
}

impl Validator {
    pub fn new(target: Arc<ValidationTarget>) -> Self {
        Self { target }
    }

    pub fn target(&self) -> &ValidationTarget {
        &self.target
    }

    /// Check a single proxy, returning the elapsed time on success
    ///
    /// The whole attempt shares one deadline, taken before the address is
    /// even resolved.
    pub async fn check(&self, address: &str) -> Result<Duration, CheckError> {
        let start = Instant::now();
        let deadline = start + self.target.timeout();

        let endpoint = SchemeResolver::resolve(address)?;
        let connector = Connector::build(&endpoint, &self.target)?;
        let captured = fetch_until(&connector, self.target.url(), deadline).await?;
        drop(connector);

        if self.target.matcher().matches(&captured) {
            Ok(start.elapsed())
        } else {
            Err(CheckError::NoMatch)
        }
    }

    /// Check a single proxy and fold the outcome into a result
    pub async fn validate(&self, address: String) -> ValidationResult {
        match self.check(&address).await {
            Ok(elapsed) => {
                let elapsed_ms = elapsed.as_millis() as u64;
                debug!(proxy = %address, elapsed_ms, "proxy passed");
                ValidationResult::passed(address, elapsed_ms)
            }
            Err(err) => {
                debug!(proxy = %address, error = %err, "proxy failed");
                ValidationResult::failed(address)
            }
        }
    }
}

/// Counts reported once a run has finished
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub workers: usize,
}

impl RunSummary {
    fn absorb(&mut self, tally: Tally) {
        self.passed += tally.passed;
        self.failed += tally.failed;
    }

    /// Proxies that reached a terminal state
    pub fn checked(&self) -> usize {
        self.passed + self.failed
    }
}

/// Per-worker counts, returned when the worker exits
#[derive(Debug, Default)]
struct Tally {
    passed: usize,
    failed: usize,
}

/// Worker pool that validates a proxy list
pub struct ValidationEngine {
    validator: Validator,
    config: EngineConfig,
}

impl ValidationEngine {
    /// Create an engine with default configuration
    pub fn new(target: ValidationTarget) -> Self {
        Self {
            validator: Validator::new(Arc::new(target)),
            config: EngineConfig::default(),
        }
    }

    /// Create an engine with custom configuration
    pub fn with_config(
        target: ValidationTarget,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        if config.concurrency == 0 {
            return Err(EngineError::ZeroConcurrency);
        }
        Ok(Self {
            validator: Validator::new(Arc::new(target)),
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Workers spawned for a list of `proxies` entries
    pub fn worker_count(&self, proxies: usize) -> usize {
        self.config.concurrency.min(proxies)
    }

    /// Start validating `proxies`
    ///
    /// Results arrive on the returned [`Validation`] in completion order.
    pub fn spawn(&self, proxies: Vec<String>) -> Result<Validation, EngineError> {
        if self.config.concurrency == 0 {
            return Err(EngineError::ZeroConcurrency);
        }
        if proxies.is_empty() {
            return Err(EngineError::NoProxies);
        }

        let total = proxies.len();
        let workers = self.worker_count(total);

        // pre-filled and closed: workers stop once it is drained
        let (queue_tx, queue_rx) = crossbeam_channel::bounded(total);
        for proxy in proxies {
            queue_tx.send(proxy).map_err(|_| EngineError::QueueClosed)?;
        }
        drop(queue_tx);

        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let mut pool = JoinSet::new();
        for id in 0..workers {
            pool.spawn(worker(
                id,
                self.validator.clone(),
                queue_rx.clone(),
                results_tx.clone(),
            ));
        }
        drop(results_tx);

        info!(total, workers, target = %self.validator.target().url(), "validation started");

        let supervisor = tokio::spawn(async move {
            let mut summary = RunSummary {
                total,
                workers,
                ..RunSummary::default()
            };
            while let Some(joined) = pool.join_next().await {
                match joined {
                    Ok(tally) => summary.absorb(tally),
                    Err(err) => warn!("validation worker exited abnormally: {}", err),
                }
            }
            summary
        });

        Ok(Validation {
            results: results_rx,
            supervisor,
            total,
            workers,
        })
    }

    /// Validate `proxies` and wait for the whole run
    pub async fn run(
        &self,
        proxies: Vec<String>,
    ) -> Result<(Vec<String>, RunSummary), EngineError> {
        Ok(self.spawn(proxies)?.collect_passed().await)
    }
}

async fn worker(
    id: usize,
    validator: Validator,
    queue: Receiver<String>,
    results: mpsc::UnboundedSender<ValidationResult>,
) -> Tally {
    let mut tally = Tally::default();
    while let Ok(address) = queue.try_recv() {
        let result = validator.validate(address).await;
        if result.is_passed() {
            tally.passed += 1;
        } else {
            tally.failed += 1;
        }
        if results.send(result).is_err() {
            debug!(worker = id, "result receiver dropped, stopping");
            break;
        }
    }
    tally
}

/// A running validation
///
/// Yields every [`ValidationResult`] as its attempt finishes. The stream ends
/// once all workers have exited.
pub struct Validation {
    results: mpsc::UnboundedReceiver<ValidationResult>,
    supervisor: JoinHandle<RunSummary>,
    total: usize,
    workers: usize,
}

impl Validation {
    /// Number of workers spawned for this run
    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Next finished attempt, passed or failed
    pub async fn next_result(&mut self) -> Option<ValidationResult> {
        self.results.recv().await
    }

    /// Next proxy that passed
    pub async fn next_passed(&mut self) -> Option<String> {
        while let Some(result) = self.next_result().await {
            if result.is_passed() {
                return Some(result.proxy);
            }
        }
        None
    }

    /// Wait for every worker to exit, discarding unread results
    pub async fn finish(mut self) -> RunSummary {
        while self.results.recv().await.is_some() {}
        let fallback = RunSummary {
            total: self.total,
            workers: self.workers,
            ..RunSummary::default()
        };
        self.supervisor.await.unwrap_or_else(|err| {
            warn!("validation supervisor failed: {}", err);
            fallback
        })
    }

    /// Collect every passing proxy, then wait for completion
    pub async fn collect_passed(mut self) -> (Vec<String>, RunSummary) {
        let mut passed = Vec::new();
        while let Some(proxy) = self.next_passed().await {
            passed.push(proxy);
        }
        (passed, self.finish().await)
    }
}

impl Stream for Validation {
    type Item = ValidationResult;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().results.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn target() -> ValidationTarget {
        ValidationTarget::builder("http://example.com")
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap()
    }

    fn engine_with(concurrency: usize) -> ValidationEngine {
        let config = EngineConfig::new().with_concurrency(concurrency);
        ValidationEngine::with_config(target(), config).unwrap()
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::new().with_concurrency(20);
        assert_eq!(config.concurrency, 20);
    }

    #[test]
    fn test_engine_rejects_zero_concurrency() {
        assert!(matches!(
            ValidationEngine::with_config(target(), EngineConfig::new().with_concurrency(0)),
            Err(EngineError::ZeroConcurrency)
        ));
    }

    #[test]
    fn test_worker_count_is_clamped() {
        let engine = engine_with(4);
        assert_eq!(engine.worker_count(2), 2);
        assert_eq!(engine.worker_count(4), 4);
        assert_eq!(engine.worker_count(100), 4);
    }

    #[tokio::test]
    async fn test_spawn_rejects_empty_list() {
        let engine = ValidationEngine::new(target());
        assert!(matches!(engine.spawn(Vec::new()), Err(EngineError::NoProxies)));
    }

    #[tokio::test]
    async fn test_unusable_addresses_all_fail() {
        let engine = engine_with(8);
        let proxies = vec![
            "ftp://x:1".to_string(),
            "1.2.3.4:abc".to_string(),
            "socks5://1.2.3.4".to_string(),
        ];

        let validation = engine.spawn(proxies).unwrap();
        assert_eq!(validation.workers(), 3);
        assert_eq!(validation.total(), 3);

        let (passed, summary) = validation.collect_passed().await;
        assert!(passed.is_empty());
        assert_eq!(
            summary,
            RunSummary {
                total: 3,
                passed: 0,
                failed: 3,
                workers: 3,
            }
        );
        assert_eq!(summary.checked(), 3);
    }

    #[tokio::test]
    async fn test_stream_yields_every_result_once() {
        let engine = engine_with(2);
        let proxies: Vec<String> = (0..5).map(|i| format!("gopher://host{}:70", i)).collect();

        let validation = engine.spawn(proxies.clone()).unwrap();
        assert_eq!(validation.workers(), 2);

        let mut seen: Vec<String> = validation.map(|result| result.proxy).collect().await;
        seen.sort();
        assert_eq!(seen, proxies);
    }

    #[tokio::test]
    async fn test_validator_reports_resolution_errors() {
        let validator = Validator::new(Arc::new(target()));
        assert!(matches!(
            validator.check("ftp://x:1").await,
            Err(CheckError::UnsupportedScheme(_))
        ));
        assert!(!validator.validate("ftp://x:1".to_string()).await.is_passed());
    }
}
