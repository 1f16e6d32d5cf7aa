//! Types and algorithms shared by the scoreboard server and its clients
//!
//! Both sides run the same [`merge`] so that a client applying a broadcast
//! patch ends up with exactly the document the server stored.

pub mod clock;
pub mod error;
pub mod merge;
pub mod probe;
pub mod protocol;
pub mod state;

pub use clock::{parse_time_string, time_to_string};
pub use error::{SyncError, Who};
pub use merge::{merge, merge_value};
pub use probe::{get_timestamp, ProbePacket, PROBE_BUFFER_SIZE};
pub use protocol::{ClientEvent, ServerEvent};
pub use state::{
    Clock, ClockMode, GameState, PartialState, Penalty, PenaltyPlayer, Period, Team, TimeValue,
    Timer,
};

/// Game identifier used when a client does not pick one
pub const DEFAULT_GID: &str = "default";
/// Host the server binds to and clients dial when none is given
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Port shared by WebSocket sessions and UDP latency probes
pub const DEFAULT_PORT: u16 = 3000;

/// `DEFAULT_HOST:DEFAULT_PORT`
pub fn default_addr() -> String {
    format!("{}:{}", DEFAULT_HOST, DEFAULT_PORT)
}
