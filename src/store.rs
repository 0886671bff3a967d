use std::collections::VecDeque;

use crate::ping::{AdvancedStatistics, BasicStatistics, ExportRows, Sample};
use crate::quality::Quality;

pub const MAX_PING_HISTORY: usize = 1000;
pub const MAX_RECENT_PINGS: usize = 100;

/// Rolling ping history plus the running aggregates derived from it.
///
/// Aggregates are updated incrementally on every record and are never
/// recomputed from the history, so they keep counting after old samples
/// have been evicted.
#[derive(Debug, Clone)]
pub struct SampleStore {
    history: VecDeque<Sample>,
    recent: VecDeque<f64>,
    sample_count: u64,
    failure_count: u64,
    latency_sum: f64,
    min_latency: Option<f64>,
    max_latency: f64,
}

impl Default for SampleStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleStore {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(MAX_PING_HISTORY),
            recent: VecDeque::with_capacity(MAX_RECENT_PINGS),
            sample_count: 0,
            failure_count: 0,
            latency_sum: 0.0,
            min_latency: None,
            max_latency: 0.0,
        }
    }

    pub fn record_success(&mut self, latency_ms: f64, elapsed_s: f64) {
        if self.history.len() == MAX_PING_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(Sample::new(elapsed_s, latency_ms));

        if self.recent.len() == MAX_RECENT_PINGS {
            self.recent.pop_front();
        }
        self.recent.push_back(latency_ms);

        self.sample_count += 1;
        self.latency_sum += latency_ms;
        self.min_latency = Some(match self.min_latency {
            Some(min) if min <= latency_ms => min,
            _ => latency_ms,
        });
        if latency_ms > self.max_latency {
            self.max_latency = latency_ms;
        }
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }

    pub fn basic_statistics(&self) -> BasicStatistics {
        let attempts = self.sample_count + self.failure_count;

        BasicStatistics {
            current_latency: self.history.back().map_or(0.0, |s| s.latency_ms),
            average_latency: if self.sample_count > 0 {
                self.latency_sum / self.sample_count as f64
            } else {
                0.0
            },
            packet_loss_percent: if attempts > 0 {
                self.failure_count as f64 / attempts as f64 * 100.0
            } else {
                0.0
            },
            sample_count: self.sample_count,
        }
    }

    pub fn advanced_statistics(&self) -> AdvancedStatistics {
        AdvancedStatistics {
            min_latency: self.min_latency.unwrap_or(0.0),
            max_latency: self.max_latency,
            jitter: self.jitter(),
        }
    }

    /// Population standard deviation of the recent-latency buffer.
    fn jitter(&self) -> f64 {
        let n = self.recent.len();
        if n < 2 {
            return 0.0;
        }

        let mean = self.recent.iter().sum::<f64>() / n as f64;
        let variance = self
            .recent
            .iter()
            .map(|latency| (latency - mean).powi(2))
            .sum::<f64>()
            / n as f64;
        variance.sqrt()
    }

    pub fn quality_label(latency_ms: f64) -> Quality {
        Quality::from_latency(latency_ms)
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn has_data(&self) -> bool {
        self.sample_count > 0
    }

    pub fn samples(&self) -> impl DoubleEndedIterator<Item = &Sample> + ExactSizeIterator + Clone {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn failure_count(&self) -> u64 {
        self.failure_count
    }

    pub fn duration_secs(&self) -> f64 {
        self.history
            .iter()
            .map(|s| s.elapsed_s)
            .fold(0.0, f64::max)
    }

    pub fn export_rows(&self) -> ExportRows {
        ExportRows {
            samples: self.history.iter().copied().collect(),
            basic: self.basic_statistics(),
            advanced: self.advanced_statistics(),
            failure_count: self.failure_count,
            duration_secs: self.duration_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn empty_store_reports_zeroes() {
        let store = SampleStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.basic_statistics(), BasicStatistics::default());
        assert_eq!(store.advanced_statistics(), AdvancedStatistics::default());
        assert!(!store.has_data());
    }

    #[test]
    fn five_successes_average_min_max() {
        let mut store = SampleStore::new();
        for (i, latency) in [10.0, 20.0, 30.0, 40.0, 50.0].into_iter().enumerate() {
            store.record_success(latency, i as f64);
        }

        let basic = store.basic_statistics();
        assert!(close(basic.average_latency, 30.0));
        assert!(close(basic.current_latency, 50.0));
        assert_eq!(basic.packet_loss_percent, 0.0);
        assert_eq!(basic.sample_count, 5);

        let advanced = store.advanced_statistics();
        assert_eq!(advanced.min_latency, 10.0);
        assert_eq!(advanced.max_latency, 50.0);
    }

    #[test]
    fn packet_loss_counts_failures_against_all_attempts() {
        let mut store = SampleStore::new();
        for i in 0..3 {
            store.record_success(20.0, i as f64);
        }
        store.record_failure();
        store.record_failure();

        assert!(close(store.basic_statistics().packet_loss_percent, 40.0));
        assert_eq!(store.failure_count(), 2);
    }

    #[test]
    fn only_failures_is_full_loss_without_data() {
        let mut store = SampleStore::new();
        store.record_failure();
        assert!(store.is_empty());
        let basic = store.basic_statistics();
        assert_eq!(basic.packet_loss_percent, 100.0);
        assert_eq!(basic.average_latency, 0.0);
        assert!(!store.has_data());
    }

    #[test]
    fn history_evicts_oldest_beyond_capacity() {
        let mut store = SampleStore::new();
        for i in 0..=MAX_PING_HISTORY {
            store.record_success(1.0 + i as f64, i as f64);
        }

        assert_eq!(store.len(), MAX_PING_HISTORY);
        let elapsed: Vec<f64> = store.samples().map(|s| s.elapsed_s).collect();
        assert_eq!(elapsed.first().copied(), Some(1.0));
        assert_eq!(elapsed.last().copied(), Some(MAX_PING_HISTORY as f64));
        assert!(elapsed.windows(2).all(|w| w[0] < w[1]));

        // aggregates still cover the evicted sample
        assert_eq!(store.basic_statistics().sample_count, MAX_PING_HISTORY as u64 + 1);
        assert_eq!(store.advanced_statistics().min_latency, 1.0);
    }

    #[test]
    fn jitter_is_population_std_dev() {
        let mut store = SampleStore::new();
        store.record_success(10.0, 0.0);
        assert_eq!(store.advanced_statistics().jitter, 0.0);

        store.record_success(20.0, 1.0);
        assert!(close(store.advanced_statistics().jitter, 5.0));

        store.clear();
        for (i, latency) in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter().enumerate() {
            store.record_success(latency, i as f64);
        }
        assert!(close(store.advanced_statistics().jitter, 2.0));
    }

    #[test]
    fn jitter_only_sees_the_recent_window() {
        let mut store = SampleStore::new();
        store.record_success(1000.0, 0.0);
        for i in 1..=MAX_RECENT_PINGS {
            store.record_success(25.0, i as f64);
        }
        assert_eq!(store.advanced_statistics().jitter, 0.0);
        assert_eq!(store.advanced_statistics().max_latency, 1000.0);
    }

    #[test]
    fn clear_then_single_sample_sets_min_and_max() {
        let mut store = SampleStore::new();
        store.record_success(5.0, 0.0);
        store.record_success(500.0, 1.0);
        store.record_failure();

        store.clear();
        store.clear();
        assert_eq!(store.basic_statistics(), BasicStatistics::default());

        store.record_success(42.0, 0.5);
        let advanced = store.advanced_statistics();
        assert_eq!(advanced.min_latency, 42.0);
        assert_eq!(advanced.max_latency, 42.0);
    }

    #[test]
    fn export_rows_carry_history_and_duration() {
        let mut store = SampleStore::new();
        store.record_success(12.0, 0.25);
        store.record_failure();
        store.record_success(18.0, 1.75);

        let rows = store.export_rows();
        assert_eq!(rows.samples, vec![Sample::new(0.25, 12.0), Sample::new(1.75, 18.0)]);
        assert_eq!(rows.failure_count, 1);
        assert_eq!(rows.duration_secs, 1.75);
        assert_eq!(rows.basic.sample_count, 2);
    }
}
