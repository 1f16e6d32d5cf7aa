//! Best-effort latency probe datagrams
//!
//! Probes travel over UDP next to the WebSocket listener so a slow or lost
//! probe never queues behind state traffic.

use bincode::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Largest probe datagram either side will read
pub const PROBE_BUFFER_SIZE: usize = 64;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum ProbePacket {
    Ping { nonce: u64, sent_at: u64 },
    Pong { nonce: u64, sent_at: u64 },
}

impl ProbePacket {
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        serialize(self)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        deserialize(data)
    }

    /// The reply to a ping echoes its fields untouched
    pub fn reply(&self) -> Option<ProbePacket> {
        match *self {
            ProbePacket::Ping { nonce, sent_at } => Some(ProbePacket::Pong { nonce, sent_at }),
            ProbePacket::Pong { .. } => None,
        }
    }
}

/// Current wall-clock time in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_reply_echoes_fields() {
        let ping = ProbePacket::Ping {
            nonce: 42,
            sent_at: 123456,
        };
        assert_eq!(
            ping.reply(),
            Some(ProbePacket::Pong {
                nonce: 42,
                sent_at: 123456
            })
        );
        assert_eq!(ping.reply().and_then(|pong| pong.reply()), None);
    }

    #[test]
    fn test_probe_fits_buffer() {
        let ping = ProbePacket::Ping {
            nonce: u64::MAX,
            sent_at: u64::MAX,
        };
        let data = ping.to_bytes().unwrap();
        assert!(data.len() <= PROBE_BUFFER_SIZE);
        assert_eq!(ProbePacket::from_bytes(&data).unwrap(), ping);
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(ProbePacket::from_bytes(&[0xff, 0xff, 0xff, 0xff, 0x01]).is_err());
    }

    #[test]
    fn test_timestamp_advances() {
        let first = get_timestamp();
        std::thread::sleep(Duration::from_millis(2));
        assert!(get_timestamp() > first);
    }
}
