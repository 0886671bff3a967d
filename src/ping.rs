/// A successful probe: seconds since the session started and the round-trip time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub elapsed_s: f64,
    pub latency_ms: f64,
}

impl Sample {
    pub fn new(elapsed_s: f64, latency_ms: f64) -> Self {
        Self { elapsed_s, latency_ms }
    }
}

/// Notifications sent from a sampling loop thread back to the UI thread.
///
/// Every event carries the id of the session that produced it, so events
/// still in the channel after a restart can be told apart from fresh ones.
#[derive(Debug, Clone, PartialEq)]
pub enum SamplerEvent {
    Sample { session: u64, sample: Sample },
    Failure { session: u64 },
    Stopped { session: u64 },
}

impl SamplerEvent {
    pub fn session(&self) -> u64 {
        match self {
            SamplerEvent::Sample { session, .. }
            | SamplerEvent::Failure { session }
            | SamplerEvent::Stopped { session } => *session,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BasicStatistics {
    pub current_latency: f64,
    pub average_latency: f64,
    pub packet_loss_percent: f64,
    pub sample_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AdvancedStatistics {
    pub min_latency: f64,
    pub max_latency: f64,
    pub jitter: f64,
}

/// Everything the CSV writer needs, copied out of the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportRows {
    pub samples: Vec<Sample>,
    pub basic: BasicStatistics,
    pub advanced: AdvancedStatistics,
    pub failure_count: u64,
    pub duration_secs: f64,
}
