use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

pub const DNS_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct CachedAddress {
    ip_address: IpAddr,
    resolved_at: Instant,
}

/// Host name resolutions for the ICMP backend, so a probe every second does
/// not turn into a DNS query every second.
#[derive(Debug)]
pub struct DnsCache {
    entries: HashMap<String, CachedAddress>,
    ttl: Duration,
}

impl Default for DnsCache {
    fn default() -> Self {
        Self::new(DNS_CACHE_TTL)
    }
}

impl DnsCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Returns the cached address if it is still fresh at `now`; stale
    /// entries are dropped.
    pub fn lookup(&mut self, hostname: &str, now: Instant) -> Option<IpAddr> {
        let entry = *self.entries.get(hostname)?;
        if now.saturating_duration_since(entry.resolved_at) > self.ttl {
            self.entries.remove(hostname);
            return None;
        }
        Some(entry.ip_address)
    }

    pub fn insert(&mut self, hostname: &str, ip_address: IpAddr, now: Instant) {
        self.entries.insert(
            hostname.to_string(),
            CachedAddress {
                ip_address,
                resolved_at: now,
            },
        );
    }

    pub fn invalidate(&mut self, hostname: &str) {
        self.entries.remove(hostname);
    }
}
