use async_trait::async_trait;

use crate::{
    general::telemetry::{NodeMetrics, TelemetrySample, TelemetrySource},
    result::CCResult,
};

const PEER_CEILING: u64 = 40;
const PEER_RESET: u64 = 10;
const BYTES_STEP: u64 = 100;
const LATEST_HEIGHT_STEP: u64 = 36;
const EARLIEST_HEIGHT_STEP: u64 = 3;

/// Deterministic counter-based feed for demos and offline operation.
/// Performs no I/O and never fails.
///
/// Once the peer counter passes [`PEER_CEILING`] the tick yields a single
/// fabricated error sample and the counter drops back to [`PEER_RESET`];
/// byte and height counters keep rising. The reference client ui depends
/// on this oscillation to exercise its error path, so it is kept.
pub struct SyntheticSource {
    active_peers: u64,
    sent_bytes: u64,
    received_bytes: u64,
    latest_height: u64,
    earliest_height: u64,
}

impl SyntheticSource {
    pub fn new() -> Self {
        Self {
            active_peers: 0,
            sent_bytes: 0,
            received_bytes: 0,
            latest_height: 0,
            earliest_height: 0,
        }
    }
}

#[async_trait]
impl TelemetrySource for SyntheticSource {
    async fn sample(&mut self) -> CCResult<TelemetrySample> {
        self.active_peers += 1;
        self.sent_bytes += BYTES_STEP;
        self.received_bytes += BYTES_STEP;
        self.latest_height += LATEST_HEIGHT_STEP;
        self.earliest_height += EARLIEST_HEIGHT_STEP;

        if self.active_peers > PEER_CEILING {
            self.active_peers = PEER_RESET;
            return Ok(TelemetrySample::error("rpc is not enabled"));
        }

        Ok(TelemetrySample::Metrics(NodeMetrics {
            active_peers_count: Some(self.active_peers),
            max_peers_count: Some(PEER_CEILING),
            sent_bytes_per_second: Some(self.sent_bytes),
            received_bytes_per_second: Some(self.received_bytes),
            latest_block_height: Some(self.latest_height),
            earliest_block_height: Some(self.earliest_height),
            syncing: Some(true),
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::general::telemetry::TelemetrySample;

    fn metrics(sample: TelemetrySample) -> NodeMetrics {
        match sample {
            TelemetrySample::Metrics(m) => m,
            TelemetrySample::Error { error } => panic!("unexpected error sample: {}", error),
        }
    }

    #[tokio::test]
    async fn test_first_ticks_are_deterministic() {
        let mut src = SyntheticSource::new();

        let m = metrics(src.sample().await.unwrap());
        assert_eq!(m.active_peers_count, Some(1));
        assert_eq!(m.sent_bytes_per_second, Some(100));
        assert_eq!(m.received_bytes_per_second, Some(100));
        assert_eq!(m.latest_block_height, Some(36));
        assert_eq!(m.earliest_block_height, Some(3));
        assert_eq!(m.max_peers_count, Some(40));
        assert_eq!(m.syncing, Some(true));

        let m = metrics(src.sample().await.unwrap());
        assert_eq!(m.active_peers_count, Some(2));
        assert_eq!(m.sent_bytes_per_second, Some(200));
        assert_eq!(m.latest_block_height, Some(72));
    }

    #[tokio::test]
    async fn test_counters_monotonic_until_ceiling() {
        let mut src = SyntheticSource::new();
        let mut last = metrics(src.sample().await.unwrap());
        for _ in 0..39 {
            let cur = metrics(src.sample().await.unwrap());
            assert!(cur.active_peers_count > last.active_peers_count);
            assert!(cur.sent_bytes_per_second > last.sent_bytes_per_second);
            assert!(cur.latest_block_height > last.latest_block_height);
            assert!(cur.earliest_block_height > last.earliest_block_height);
            last = cur;
        }
        assert_eq!(last.active_peers_count, Some(40));
    }

    #[tokio::test]
    async fn test_oscillation_resets_and_recovers() {
        let mut src = SyntheticSource::new();
        for _ in 0..40 {
            assert!(matches!(
                src.sample().await.unwrap(),
                TelemetrySample::Metrics(_)
            ));
        }
        // tick 41 crosses the ceiling
        let sample = src.sample().await.unwrap();
        assert_eq!(sample, TelemetrySample::error("rpc is not enabled"));
        // tick 42 resumes from the reset value; bytes kept rising through the error tick
        let m = metrics(src.sample().await.unwrap());
        assert_eq!(m.active_peers_count, Some(11));
        assert_eq!(m.sent_bytes_per_second, Some(4200));
        assert_eq!(m.latest_block_height, Some(42 * 36));
    }
}
