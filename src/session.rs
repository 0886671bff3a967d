use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Local, TimeDelta};

use crate::connectivity::{self, ConnectivityReport};
use crate::error::{ExportError, SessionError};
use crate::export;
use crate::ping::{AdvancedStatistics, BasicStatistics, ExportRows, Sample, SamplerEvent};
use crate::ping_executor::{PING_TIMEOUT, Probe};
use crate::quality::Quality;
use crate::sampler::{LoopConfig, LoopState, SamplingLoop};
use crate::store::SampleStore;
use crate::view::{ViewDecision, ViewState};

/// Notifications handed to the presentation layer by [`PingSession::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Sample(Sample),
    Failure,
    /// The configured test duration ran out.
    AutoStopped,
    /// The sampling loop ended on its own.
    Stopped,
    Connectivity(ConnectivityReport),
}

/// One target, one sampling loop, one set of statistics.
///
/// All methods are meant to be called from the UI thread. Background work
/// reports over channels that are drained by [`PingSession::poll`], so the
/// store is only ever touched from here.
pub struct PingSession<P: Probe> {
    prober: Arc<P>,
    store: SampleStore,
    view: ViewState,
    sampler: SamplingLoop,
    events_tx: Sender<SamplerEvent>,
    events_rx: Receiver<SamplerEvent>,
    last_session: u64,
    active_session: Option<u64>,
    running: bool,
    connection_issue: bool,
    target: String,
    started_at: Option<DateTime<Local>>,
    duration: Option<Duration>,
    deadline: Option<Instant>,
    probe_timeout: Duration,
    connectivity_hosts: Vec<String>,
    connectivity: Option<Receiver<ConnectivityReport>>,
}

impl<P: Probe> PingSession<P> {
    pub fn new(prober: P, follow_window_secs: u32) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            prober: Arc::new(prober),
            store: SampleStore::new(),
            view: ViewState::new(follow_window_secs),
            sampler: SamplingLoop::new(),
            events_tx,
            events_rx,
            last_session: 0,
            active_session: None,
            running: false,
            connection_issue: false,
            target: String::new(),
            started_at: None,
            duration: None,
            deadline: None,
            probe_timeout: PING_TIMEOUT,
            connectivity_hosts: connectivity::default_hosts(),
            connectivity: None,
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn with_connectivity_hosts(mut self, hosts: Vec<String>) -> Self {
        self.connectivity_hosts = hosts;
        self
    }

    /// Clears previous data and starts probing `target` every `interval_secs`.
    /// With a `duration`, the session stops itself once it has elapsed.
    pub fn start(&mut self, target: &str, interval_secs: f64, duration: Option<Duration>) -> Result<(), SessionError> {
        let target = target.trim();
        if target.is_empty() {
            return Err(SessionError::EmptyTarget);
        }
        let interval = Duration::try_from_secs_f64(interval_secs)
            .ok()
            .filter(|interval| !interval.is_zero())
            .ok_or(SessionError::InvalidInterval(interval_secs))?;

        self.running = false;
        self.clear();
        self.view.on_session_start();

        self.last_session += 1;
        let session = self.last_session;
        let started = Instant::now();

        self.target = target.to_string();
        self.started_at = Some(Local::now());
        self.active_session = Some(session);
        self.running = true;
        self.duration = duration;
        self.deadline = duration.map(|duration| started + duration);

        log::info!("Starting ping test against {target}");
        self.sampler.start(
            Arc::clone(&self.prober),
            LoopConfig {
                target: self.target.clone(),
                interval,
                probe_timeout: self.probe_timeout,
                session,
                started_at: started,
                duration,
            },
            self.events_tx.clone(),
        );
        Ok(())
    }

    /// Asks the loop to stop. Results still in flight are discarded.
    pub fn stop(&mut self) {
        if self.running {
            log::info!("Stopping ping test against {}", self.target);
        }
        self.running = false;
        self.active_session = None;
        self.deadline = None;
        self.sampler.stop();
    }

    pub fn clear(&mut self) {
        self.store.clear();
        self.connection_issue = false;
        if !self.running {
            self.active_session = None;
            self.started_at = None;
        }
    }

    /// Drains background notifications into the store and returns them in
    /// arrival order. Also enforces the auto-stop deadline; samples taken
    /// after it are dropped.
    pub fn poll(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        let limit_secs = self.duration.map(|duration| duration.as_secs_f64());

        while let Ok(event) = self.events_rx.try_recv() {
            if self.active_session != Some(event.session()) {
                continue;
            }
            match event {
                SamplerEvent::Sample { sample, .. } => {
                    if limit_secs.is_some_and(|limit| sample.elapsed_s > limit) {
                        log::debug!("Dropping sample at {:.3}s, past the test duration", sample.elapsed_s);
                        continue;
                    }
                    self.store.record_success(sample.latency_ms, sample.elapsed_s);
                    self.connection_issue = false;
                    events.push(SessionEvent::Sample(sample));
                }
                SamplerEvent::Failure { .. } => {
                    self.store.record_failure();
                    self.connection_issue = true;
                    events.push(SessionEvent::Failure);
                }
                SamplerEvent::Stopped { .. } => {
                    let finished = self.deadline_passed();
                    self.running = false;
                    self.active_session = None;
                    self.deadline = None;
                    if finished {
                        log::info!("Test duration elapsed");
                        events.push(SessionEvent::AutoStopped);
                    } else {
                        events.push(SessionEvent::Stopped);
                    }
                }
            }
        }

        if self.running && self.deadline_passed() {
            log::info!("Test duration elapsed");
            self.stop();
            events.push(SessionEvent::AutoStopped);
        }

        if let Some(rx) = &self.connectivity {
            match rx.try_recv() {
                Ok(report) => {
                    events.push(SessionEvent::Connectivity(report));
                    self.connectivity = None;
                }
                Err(TryRecvError::Disconnected) => self.connectivity = None,
                Err(TryRecvError::Empty) => {}
            }
        }

        events
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Starts a background connectivity check unless one is already running.
    pub fn test_connectivity(&mut self) -> bool {
        if self.connectivity.is_some() {
            return false;
        }
        self.connectivity = Some(connectivity::spawn_connectivity_test(
            Arc::clone(&self.prober),
            self.connectivity_hosts.clone(),
        ));
        true
    }

    pub fn connectivity_in_progress(&self) -> bool {
        self.connectivity.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True from a failed probe until the next successful one.
    pub fn connection_issue(&self) -> bool {
        self.connection_issue
    }

    pub fn loop_state(&self) -> LoopState {
        self.sampler.state()
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    /// Wall-clock time of a point on the elapsed-time axis.
    pub fn wall_clock_at(&self, elapsed_s: f64) -> Option<DateTime<Local>> {
        let offset = TimeDelta::milliseconds((elapsed_s * 1000.0).round() as i64);
        self.started_at?.checked_add_signed(offset)
    }

    /// Time left before auto-stop.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .filter(|_| self.running)
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn basic_statistics(&self) -> BasicStatistics {
        self.store.basic_statistics()
    }

    pub fn advanced_statistics(&self) -> AdvancedStatistics {
        self.store.advanced_statistics()
    }

    pub fn quality_label(&self, latency_ms: f64) -> Quality {
        SampleStore::quality_label(latency_ms)
    }

    pub fn has_data(&self) -> bool {
        self.store.has_data()
    }

    pub fn samples(&self) -> impl DoubleEndedIterator<Item = &Sample> + ExactSizeIterator + Clone {
        self.store.samples()
    }

    pub fn failure_count(&self) -> u64 {
        self.store.failure_count()
    }

    pub fn export_rows(&self) -> ExportRows {
        self.store.export_rows()
    }

    pub fn export_csv(&self, path: &Path) -> Result<(), ExportError> {
        export::export_to_file(path, &self.export_rows(), &self.target, self.started_at)
            .inspect_err(|e| log::error!("CSV export to {} failed: {e}", path.display()))
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_decision(&self) -> ViewDecision {
        self.view.decide(self.store.samples())
    }

    pub fn set_follow_mode(&mut self, enabled: bool) {
        self.view.set_follow_mode(enabled);
    }

    pub fn set_follow_window(&mut self, secs: u32) {
        self.view.set_follow_window(secs);
    }

    pub fn reset_view(&mut self) {
        self.view.reset();
    }

    /// Feeds a chart-reported zoom or pan into the view policy. Only
    /// meaningful while a test is producing data.
    pub fn on_manual_view_change(&mut self, current_x_max: f64) -> bool {
        if self.running && self.store.has_data() {
            self.view.on_manual_view_change(self.store.samples(), current_x_max)
        } else {
            self.view.auto_range()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Silent;

    impl Probe for Silent {
        async fn probe(&self, _target: &str, _timeout: Duration) -> Option<f64> {
            None
        }
    }

    struct RecordsTimeout(Arc<std::sync::Mutex<Vec<Duration>>>);

    impl Probe for RecordsTimeout {
        async fn probe(&self, _target: &str, timeout: Duration) -> Option<f64> {
            self.0.lock().unwrap().push(timeout);
            Some(1.0)
        }
    }

    #[test]
    fn sampling_uses_the_configured_timeout() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut session =
            PingSession::new(RecordsTimeout(Arc::clone(&seen)), 10).with_probe_timeout(Duration::from_millis(750));
        session.start("example.com", 0.01, None).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !session.has_data() {
            assert!(Instant::now() < deadline, "no sample arrived");
            session.poll();
            std::thread::sleep(Duration::from_millis(2));
        }
        session.stop();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|&timeout| timeout == Duration::from_millis(750)));
    }

    #[test]
    fn blank_target_is_rejected() {
        let mut session = PingSession::new(Silent, 10);
        assert_eq!(session.start("   ", 1.0, None), Err(SessionError::EmptyTarget));
        assert!(!session.is_running());
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        let mut session = PingSession::new(Silent, 10);
        assert_eq!(session.start("example.com", 0.0, None), Err(SessionError::InvalidInterval(0.0)));
        assert!(matches!(
            session.start("example.com", f64::NAN, None),
            Err(SessionError::InvalidInterval(_))
        ));
        assert!(!session.is_running());
    }

    #[test]
    fn wall_clock_needs_a_start() {
        let mut session = PingSession::new(Silent, 10);
        assert_eq!(session.wall_clock_at(1.0), None);

        session.start("example.com", 1.0, None).unwrap();
        let start = session.started_at().unwrap();
        assert_eq!(session.wall_clock_at(1.5), Some(start + TimeDelta::milliseconds(1500)));
        session.stop();
    }

    #[test]
    fn remaining_only_while_running() {
        let mut session = PingSession::new(Silent, 10);
        session.start("example.com", 1.0, Some(Duration::from_secs(60))).unwrap();
        assert!(session.remaining().is_some_and(|left| left <= Duration::from_secs(60)));

        session.stop();
        assert_eq!(session.remaining(), None);
    }
}
