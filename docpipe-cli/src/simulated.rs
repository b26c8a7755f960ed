//! Simulated backends for the demo command.
//!
//! Both backends sleep for a random time and count how often they were
//! entered while a previous call was still running. The pipeline promises
//! that count stays at zero.

use docpipe::pipeline::{FetchError, Fetcher, TransformError, Transformer};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// Detects overlapping calls into one backend.
#[derive(Debug, Default)]
pub struct OverlapDetector {
    in_flight: AtomicUsize,
    violations: AtomicUsize,
    calls: AtomicUsize,
}

impl OverlapDetector {
    /// Marks a call as started; returns false if another call was running.
    pub fn enter(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
            self.violations.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    /// Marks a call as finished; returns false if another call was running.
    pub fn exit(&self) -> bool {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) != 1 {
            self.violations.fetch_add(1, Ordering::SeqCst);
            return false;
        }
        true
    }

    pub fn violations(&self) -> usize {
        self.violations.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn random_delay(max_delay_ms: u64) -> Duration {
    if max_delay_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::rng().random_range(0..=max_delay_ms))
}

/// Web client stand-in: returns the key itself as the page body.
pub struct SimulatedWebClient {
    detector: Arc<OverlapDetector>,
    max_delay_ms: u64,
    fail_every: u64,
}

impl SimulatedWebClient {
    /// # Arguments
    ///
    /// * `fail_every` - Numeric keys divisible by this fail; 0 disables
    pub fn new(detector: Arc<OverlapDetector>, max_delay_ms: u64, fail_every: u64) -> Self {
        Self {
            detector,
            max_delay_ms,
            fail_every,
        }
    }

    fn should_fail(&self, key: &str) -> bool {
        self.fail_every != 0
            && key
                .parse::<u64>()
                .is_ok_and(|n| n % self.fail_every == self.fail_every - 1)
    }
}

impl Fetcher for SimulatedWebClient {
    type Content = String;

    async fn fetch(&self, key: &str) -> Result<String, FetchError> {
        if !self.detector.enter() {
            error!(key = key, "Parallel fetch detected");
        }
        tokio::time::sleep(random_delay(self.max_delay_ms)).await;
        if !self.detector.exit() {
            error!(key = key, "Parallel fetch detected");
        }

        if self.should_fail(key) {
            return Err(FetchError::new("simulated network failure"));
        }
        Ok(key.to_string())
    }
}

/// HTML parser stand-in: uppercases the page body.
pub struct SimulatedParser {
    detector: Arc<OverlapDetector>,
    max_delay_ms: u64,
}

impl SimulatedParser {
    pub fn new(detector: Arc<OverlapDetector>, max_delay_ms: u64) -> Self {
        Self {
            detector,
            max_delay_ms,
        }
    }
}

impl Transformer for SimulatedParser {
    type Content = String;
    type Output = String;

    fn transform(&self, content: String) -> Result<String, TransformError> {
        if !self.detector.enter() {
            error!(content = %content, "Parallel parse detected");
        }
        std::thread::sleep(random_delay(self.max_delay_ms));
        if !self.detector.exit() {
            error!(content = %content, "Parallel parse detected");
        }

        Ok(content.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_counts_overlap() {
        let detector = OverlapDetector::default();

        assert!(detector.enter());
        assert!(!detector.enter());
        assert!(!detector.exit());
        assert!(detector.exit());

        assert_eq!(detector.calls(), 2);
        assert_eq!(detector.violations(), 2);
    }

    #[test]
    fn test_detector_serial_calls_are_clean() {
        let detector = OverlapDetector::default();
        for _ in 0..3 {
            assert!(detector.enter());
            assert!(detector.exit());
        }
        assert_eq!(detector.violations(), 0);
    }

    #[test]
    fn test_fail_every() {
        let client = SimulatedWebClient::new(Arc::default(), 0, 3);

        assert!(!client.should_fail("0"));
        assert!(!client.should_fail("1"));
        assert!(client.should_fail("2"));
        assert!(client.should_fail("5"));
        assert!(!client.should_fail("not-a-number"));

        let never = SimulatedWebClient::new(Arc::default(), 0, 0);
        assert!(!never.should_fail("2"));
    }

    #[tokio::test]
    async fn test_simulated_backends() {
        let detector = Arc::new(OverlapDetector::default());
        let client = SimulatedWebClient::new(Arc::clone(&detector), 1, 0);
        let parser = SimulatedParser::new(Arc::clone(&detector), 1);

        let body = client.fetch("abc").await.unwrap();
        assert_eq!(parser.transform(body).unwrap(), "ABC");
        assert_eq!(detector.calls(), 2);
        assert_eq!(detector.violations(), 0);
    }
}
