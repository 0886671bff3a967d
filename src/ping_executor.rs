use std::future::Future;
use std::net::IpAddr;
use std::process::Stdio;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::process::Command;

use crate::config::ProbeBackend;
use crate::dns_cache::DnsCache;

pub const PING_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// One reachability check against one host.
///
/// Implementations never fail towards the caller: timeouts, unreachable
/// hosts, resolution errors and unparsable output all come back as `None`.
/// The returned future must complete within `timeout`.
pub trait Probe: Send + Sync + 'static {
    fn probe(&self, target: &str, timeout: Duration) -> impl Future<Output = Option<f64>>;
}

/// Keep only characters valid in a host name (alphanumeric, dots, hyphens).
/// IP literals pass through untouched. Returns None if nothing usable is left
/// or if the result could be mistaken for a command line flag.
pub fn sanitize_target(target: &str) -> Option<String> {
    let target = target.trim();
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Some(ip.to_string());
    }

    // Also handle case where user included port like "example.com:8080"
    let hostname = target.split(':').next().unwrap_or(target);

    let sanitized: String = hostname
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '.' || *c == '-')
        .collect();

    if sanitized.is_empty() || sanitized.starts_with('-') {
        None
    } else {
        Some(sanitized)
    }
}

/// Extracts the round-trip time in milliseconds from `ping` output.
///
/// Understands `time=14 ms`, `time=0.045 ms` (Linux, macOS) and `time=14ms`,
/// `time<1ms` (Windows).
pub fn parse_ping_time(output: &str) -> Option<f64> {
    output.lines().find_map(parse_time_token)
}

fn parse_time_token(line: &str) -> Option<f64> {
    let start = line.find("time=").or_else(|| line.find("time<"))?;
    let rest = &line[start + "time=".len()..];

    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    let (number, unit) = rest.split_at(end);
    if !unit.trim_start().starts_with("ms") {
        return None;
    }

    number.parse::<f64>().ok()
}

pub fn ping_args(host: &str, timeout: Duration) -> Vec<String> {
    let millis = timeout.as_millis().max(1).to_string();

    let mut args: Vec<String> = if cfg!(target_os = "windows") {
        vec!["-n".into(), "1".into(), "-w".into(), millis]
    } else if cfg!(target_os = "macos") {
        vec!["-c".into(), "1".into(), "-W".into(), millis]
    } else {
        let secs = timeout.as_secs().max(1).to_string();
        vec!["-c".into(), "1".into(), "-W".into(), secs]
    };
    args.push(host.to_string());
    args
}

/// Runs the platform `ping` binary once per probe.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPing;

impl Probe for SystemPing {
    async fn probe(&self, target: &str, timeout: Duration) -> Option<f64> {
        let Some(host) = sanitize_target(target) else {
            log::debug!("rejected ping target {target:?}");
            return None;
        };

        let mut command = Command::new("ping");
        command
            .args(ping_args(&host, timeout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(windows)]
        command.creation_flags(CREATE_NO_WINDOW);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                log::debug!("failed to run ping for {host}: {e}");
                return None;
            }
            Err(_) => {
                log::debug!("ping to {host} timed out after {timeout:?}");
                return None;
            }
        };

        if !output.status.success() {
            log::debug!("ping to {host} exited with {}", output.status);
            return None;
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let latency = parse_ping_time(&stdout);
        if latency.is_none() {
            log::debug!("ping to {host} succeeded but reported no time");
        }
        latency
    }
}

/// Sends ICMP echo requests directly instead of spawning `ping`.
///
/// Needs either raw socket privileges or unprivileged ICMP sockets enabled
/// on the host.
#[derive(Debug)]
pub struct IcmpPing {
    dns_cache: Mutex<DnsCache>,
    sequence: AtomicU16,
}

impl Default for IcmpPing {
    fn default() -> Self {
        Self::new()
    }
}

impl IcmpPing {
    pub fn new() -> Self {
        Self {
            dns_cache: Mutex::new(DnsCache::default()),
            sequence: AtomicU16::new(0),
        }
    }

    async fn resolve_target(&self, target: &str) -> Option<IpAddr> {
        if let Ok(ip) = target.trim().parse::<IpAddr>() {
            return Some(ip);
        }

        let hostname = sanitize_target(target)?;
        let cached = self
            .dns_cache
            .lock()
            .ok()
            .and_then(|mut cache| cache.lookup(&hostname, Instant::now()));
        if cached.is_some() {
            return cached;
        }

        let ip = match tokio::net::lookup_host(format!("{hostname}:0")).await {
            Ok(mut addrs) => addrs.next().map(|addr| addr.ip())?,
            Err(e) => {
                log::debug!("failed to resolve {hostname}: {e}");
                return None;
            }
        };

        if let Ok(mut cache) = self.dns_cache.lock() {
            cache.insert(&hostname, ip, Instant::now());
        }
        Some(ip)
    }

    async fn echo(&self, ip: IpAddr, timeout: Duration) -> Option<f64> {
        let config = match ip {
            IpAddr::V4(_) => Config::default(),
            IpAddr::V6(_) => Config::builder().kind(ICMP::V6).build(),
        };
        let client = match Client::new(&config) {
            Ok(client) => client,
            Err(e) => {
                log::debug!("failed to open ICMP socket: {e}");
                return None;
            }
        };

        let mut pinger = client.pinger(ip, PingIdentifier(std::process::id() as u16)).await;
        pinger.timeout(timeout);

        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        match pinger.ping(PingSequence(sequence), &[0; 8]).await {
            Ok((_packet, rtt)) => Some(rtt.as_secs_f64() * 1000.0),
            Err(e) => {
                log::debug!("ICMP echo to {ip} failed: {e}");
                None
            }
        }
    }
}

impl Probe for IcmpPing {
    async fn probe(&self, target: &str, timeout: Duration) -> Option<f64> {
        let started = Instant::now();
        let ip = tokio::time::timeout(timeout, self.resolve_target(target))
            .await
            .ok()
            .flatten()?;

        let remaining = timeout.saturating_sub(started.elapsed());
        if remaining.is_zero() {
            return None;
        }

        let latency = self.echo(ip, remaining).await;
        if latency.is_none() {
            // the host may have moved; resolve again next time
            if let (Some(hostname), Ok(mut cache)) = (sanitize_target(target), self.dns_cache.lock()) {
                cache.invalidate(&hostname);
            }
        }
        latency
    }
}

/// Runtime choice between the probe backends.
#[derive(Debug)]
pub enum Prober {
    System(SystemPing),
    Icmp(IcmpPing),
}

impl Prober {
    pub fn from_backend(backend: ProbeBackend) -> Self {
        match backend {
            ProbeBackend::System => Prober::System(SystemPing),
            ProbeBackend::Icmp => Prober::Icmp(IcmpPing::new()),
        }
    }
}

impl Probe for Prober {
    async fn probe(&self, target: &str, timeout: Duration) -> Option<f64> {
        match self {
            Prober::System(ping) => ping.probe(target, timeout).await,
            Prober::Icmp(ping) => ping.probe(target, timeout).await,
        }
    }
}
