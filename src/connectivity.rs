use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::ping_executor::Probe;

pub const NETWORK_TEST_HOSTS: [&str; 3] = ["8.8.8.8", "1.1.1.1", "google.com"];
pub const NETWORK_TEST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityReport {
    pub success: bool,
    pub message: String,
}

impl ConnectivityReport {
    fn reachable(host: &str) -> Self {
        Self {
            success: true,
            message: format!("Network connection is active (tested with {host})"),
        }
    }

    fn unreachable() -> Self {
        Self {
            success: false,
            message: "No network connection detected".to_string(),
        }
    }
}

/// Probes `hosts` in order and stops at the first one that answers.
pub async fn check_connectivity<P: Probe>(prober: &P, hosts: &[String], timeout: Duration) -> ConnectivityReport {
    for host in hosts {
        if prober.probe(host, timeout).await.is_some() {
            return ConnectivityReport::reachable(host);
        }
        log::debug!("Connectivity probe to {host} failed");
    }
    ConnectivityReport::unreachable()
}

/// Runs [`check_connectivity`] on a background thread. The returned receiver
/// yields exactly one report.
pub fn spawn_connectivity_test<P: Probe>(prober: Arc<P>, hosts: Vec<String>) -> Receiver<ConnectivityReport> {
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let report = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime.block_on(check_connectivity(prober.as_ref(), &hosts, NETWORK_TEST_TIMEOUT)),
            Err(e) => {
                log::error!("Failed to start connectivity runtime: {e}");
                ConnectivityReport::unreachable()
            }
        };
        log::info!("Connectivity test: {}", report.message);
        let _ = tx.send(report);
    });

    rx
}

pub fn default_hosts() -> Vec<String> {
    NETWORK_TEST_HOSTS.iter().map(|h| h.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Answers only for the listed hosts and remembers every host it was asked about.
    struct HostTable {
        answering: Vec<&'static str>,
        asked: Mutex<Vec<String>>,
    }

    impl HostTable {
        fn new(answering: &[&'static str]) -> Self {
            Self {
                answering: answering.to_vec(),
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    impl Probe for HostTable {
        async fn probe(&self, target: &str, _timeout: Duration) -> Option<f64> {
            self.asked.lock().unwrap().push(target.to_string());
            self.answering.iter().any(|host| *host == target).then_some(12.0)
        }
    }

    #[tokio::test]
    async fn first_answering_host_wins() {
        let prober = HostTable::new(&["1.1.1.1", "google.com"]);
        let report = check_connectivity(&prober, &default_hosts(), NETWORK_TEST_TIMEOUT).await;

        assert!(report.success);
        assert_eq!(report.message, "Network connection is active (tested with 1.1.1.1)");
        assert_eq!(*prober.asked.lock().unwrap(), vec!["8.8.8.8", "1.1.1.1"]);
    }

    #[tokio::test]
    async fn all_hosts_failing_is_reported_once() {
        let prober = HostTable::new(&[]);
        let report = check_connectivity(&prober, &default_hosts(), NETWORK_TEST_TIMEOUT).await;

        assert!(!report.success);
        assert_eq!(report.message, "No network connection detected");
        assert_eq!(prober.asked.lock().unwrap().len(), NETWORK_TEST_HOSTS.len());
    }

    #[test]
    fn background_test_delivers_single_report() {
        let rx = spawn_connectivity_test(Arc::new(HostTable::new(&["google.com"])), default_hosts());

        let report = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(report.success);
        assert!(report.message.ends_with("(tested with google.com)"));
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }
}
