use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::ping::{Sample, SamplerEvent};
use crate::ping_executor::Probe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub target: String,
    pub interval: Duration,
    pub probe_timeout: Duration,
    pub session: u64,
    /// Elapsed times of emitted samples are measured from this instant.
    pub started_at: Instant,
    /// The loop ends on its own once this much time has passed since
    /// `started_at`. Outcomes completing later are not emitted.
    pub duration: Option<Duration>,
}

impl LoopConfig {
    fn expired(&self) -> bool {
        self.duration.is_some_and(|duration| self.started_at.elapsed() >= duration)
    }

    /// Next wait between probes, cut to whatever is left of the duration.
    fn next_wait(&self) -> Duration {
        match self.duration {
            Some(duration) => self.interval.min(duration.saturating_sub(self.started_at.elapsed())),
            None => self.interval,
        }
    }
}

#[derive(Debug, Default)]
struct StopSignal {
    stopped: AtomicBool,
    wake: Notify,
}

impl StopSignal {
    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Periodic prober for one target.
///
/// Each started loop runs on its own thread with a current-thread tokio
/// runtime. Stopping is cooperative: the flag is checked between probes and
/// cuts the interval wait short, but a probe already in flight always runs to
/// completion. A stopped loop therefore exits within one probe timeout.
#[derive(Debug, Default)]
pub struct SamplingLoop {
    signal: Option<Arc<StopSignal>>,
    handle: Option<JoinHandle<()>>,
}

impl SamplingLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoopState {
        match &self.handle {
            Some(handle) if !handle.is_finished() => LoopState::Running,
            _ => LoopState::Stopped,
        }
    }

    /// Starts probing. A loop that is still running is stopped first, and the
    /// new thread joins it before its first probe so two loops never probe at
    /// the same time. The caller is never blocked.
    pub fn start<P: Probe>(&mut self, prober: Arc<P>, config: LoopConfig, events: Sender<SamplerEvent>) {
        self.stop();
        let previous = self.handle.take();

        let signal = Arc::new(StopSignal::default());
        self.signal = Some(Arc::clone(&signal));

        log::info!(
            "Sampling {} every {:?} (session {})",
            config.target,
            config.interval,
            config.session
        );

        self.handle = Some(thread::spawn(move || {
            if let Some(previous) = previous {
                let _ = previous.join();
            }
            run_loop(prober.as_ref(), &config, &signal, &events);
            log::info!("Sampling loop for session {} stopped", config.session);
            let _ = events.send(SamplerEvent::Stopped {
                session: config.session,
            });
        }));
    }

    pub fn stop(&mut self) {
        if let Some(signal) = &self.signal {
            signal.stop();
        }
    }

    /// Stops the loop and blocks until its thread has exited.
    pub fn wait(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SamplingLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<P: Probe>(prober: &P, config: &LoopConfig, signal: &StopSignal, events: &Sender<SamplerEvent>) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start sampling runtime: {e}");
            return;
        }
    };

    runtime.block_on(async {
        while !signal.is_stopped() && !config.expired() {
            let event = match prober.probe(&config.target, config.probe_timeout).await {
                Some(latency_ms) => SamplerEvent::Sample {
                    session: config.session,
                    sample: Sample::new(config.started_at.elapsed().as_secs_f64(), latency_ms),
                },
                None => {
                    log::debug!("No reply from {}", config.target);
                    SamplerEvent::Failure {
                        session: config.session,
                    }
                }
            };

            if config.expired() {
                log::debug!("Discarding probe that finished after the test duration");
                break;
            }
            if events.send(event).is_err() || signal.is_stopped() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(config.next_wait()) => {}
                _ = signal.wake.notified() => {}
            }
        }
    });
}
