//! Round-trip latency measurements for the connection status line

use rand::Rng;
use shared::{get_timestamp, ProbePacket};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// One completed round trip
#[derive(Debug, Clone)]
pub struct LatencySample {
    pub rtt_ms: f64,
    pub timestamp: Instant,
}

/// Tracks outstanding pings and recent round-trip times
///
/// Replies are matched by nonce; anything unmatched or late is counted as
/// lost and never affects the game state.
pub struct LatencyProbe {
    pending: HashMap<u64, Instant>,
    history: VecDeque<LatencySample>,
    max_samples: usize,
    timeout: Duration,

    sent: u64,
    lost: u64,
}

impl LatencyProbe {
    pub fn new(max_samples: usize, timeout: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            history: VecDeque::new(),
            max_samples: max_samples.max(1),
            timeout,
            sent: 0,
            lost: 0,
        }
    }

    /// Starts a round trip and returns the datagram to send
    pub fn ping(&mut self) -> ProbePacket {
        self.ping_at(Instant::now())
    }

    pub fn ping_at(&mut self, now: Instant) -> ProbePacket {
        let mut rng = rand::thread_rng();
        let mut nonce: u64 = rng.gen();
        while self.pending.contains_key(&nonce) {
            nonce = rng.gen();
        }

        self.pending.insert(nonce, now);
        self.sent += 1;

        ProbePacket::Ping {
            nonce,
            sent_at: get_timestamp(),
        }
    }

    /// Records a reply, returning the measured round trip in milliseconds
    pub fn record(&mut self, packet: &ProbePacket) -> Option<f64> {
        self.record_at(packet, Instant::now())
    }

    pub fn record_at(&mut self, packet: &ProbePacket, now: Instant) -> Option<f64> {
        let ProbePacket::Pong { nonce, .. } = packet else {
            return None;
        };
        let sent = self.pending.remove(nonce)?;
        let rtt_ms = now.saturating_duration_since(sent).as_secs_f64() * 1000.0;

        self.history.push_back(LatencySample {
            rtt_ms,
            timestamp: now,
        });
        while self.history.len() > self.max_samples {
            self.history.pop_front();
        }

        Some(rtt_ms)
    }

    /// Gives up on pings older than the timeout
    pub fn expire(&mut self, now: Instant) -> usize {
        let timeout = self.timeout;
        let before = self.pending.len();
        self.pending
            .retain(|_, sent| now.saturating_duration_since(*sent) < timeout);
        let expired = before - self.pending.len();
        self.lost += expired as u64;
        expired
    }

    pub fn last_ms(&self) -> Option<f64> {
        self.history.back().map(|sample| sample.rtt_ms)
    }

    pub fn average_ms(&self) -> Option<f64> {
        if self.history.is_empty() {
            return None;
        }
        let total: f64 = self.history.iter().map(|sample| sample.rtt_ms).sum();
        Some(total / self.history.len() as f64)
    }

    pub fn max_ms(&self) -> Option<f64> {
        self.history
            .iter()
            .map(|sample| sample.rtt_ms)
            .fold(None, |max, rtt| Some(max.map_or(rtt, |m: f64| m.max(rtt))))
    }

    /// Fraction of completed-or-expired pings that never came back
    pub fn loss_ratio(&self) -> f64 {
        let settled = self.sent - self.pending.len() as u64;
        if settled == 0 {
            return 0.0;
        }
        self.lost as f64 / settled as f64
    }

    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Short status text, e.g. `ping 12.0 ms (avg 14.2 ms, 0% loss)`
    pub fn describe(&self) -> String {
        match (self.last_ms(), self.average_ms()) {
            (Some(last), Some(avg)) => format!(
                "ping {:.1} ms (avg {:.1} ms, {:.0}% loss)",
                last,
                avg,
                self.loss_ratio() * 100.0
            ),
            _ => "ping n/a".to_string(),
        }
    }
}

impl Default for LatencyProbe {
    fn default() -> Self {
        Self::new(100, Duration::from_secs(5))
    }
}
