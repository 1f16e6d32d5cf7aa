use crate::reconciler::SyncStatus;
use shared::{GameState, Penalty, Team};
use std::io::{self, Stdout, Write};

/// Settings for the status line under the scoreboard
#[derive(Debug, Clone, Default)]
pub struct RenderConfig {
    pub gid: String,
    pub revision: u64,
    pub pending_edits: usize,
    pub latency: Option<String>,
    pub fake_ping_ms: u64,
}

/// Text scoreboard written to a terminal (or any writer)
///
/// Redraws are skipped when the output would be identical to the last one,
/// so calling [`Renderer::render`] on every event is cheap.
pub struct Renderer<W: Write = Stdout> {
    out: W,
    last_frame: Option<String>,
    last_status: Option<SyncStatus>,
}

impl Renderer<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_frame: None,
            last_status: None,
        }
    }

    /// Draws the scoreboard if anything visible changed
    pub fn render(&mut self, state: &GameState, config: &RenderConfig) -> io::Result<bool> {
        let frame = format_frame(state, config);
        if self.last_frame.as_deref() == Some(frame.as_str()) {
            return Ok(false);
        }

        writeln!(self.out, "{}", frame)?;
        self.out.flush()?;
        self.last_frame = Some(frame);
        Ok(true)
    }

    /// Reports a sync status transition; repeated statuses are not printed
    pub fn status(&mut self, status: SyncStatus) -> io::Result<()> {
        if self.last_status == Some(status) {
            return Ok(());
        }
        self.last_status = Some(status);
        if status != SyncStatus::Synced {
            // The next frame must be redrawn even if unchanged
            self.last_frame = None;
        }

        writeln!(self.out, "-- {} --", status)?;
        self.out.flush()
    }

    pub fn notice(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.out, "* {}", message)?;
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

fn format_frame(state: &GameState, config: &RenderConfig) -> String {
    let mut lines = vec![state.summary()];
    lines.extend(team_penalties(&state.away));
    lines.extend(team_penalties(&state.home));

    let mut status = format!("[{} @ r{}", config.gid, config.revision);
    if config.pending_edits > 0 {
        status.push_str(&format!(", {} unconfirmed", config.pending_edits));
    }
    if let Some(latency) = &config.latency {
        status.push_str(&format!(", {}", latency));
    }
    if config.fake_ping_ms > 0 {
        status.push_str(&format!(", +{} ms simulated", config.fake_ping_ms));
    }
    status.push(']');
    lines.push(status);

    lines.join("\n")
}

fn team_penalties(team: &Team) -> Vec<String> {
    team.penalties
        .iter()
        .map(|penalty| format!("  {} {}", team.name, describe_penalty(penalty)))
        .collect()
}

fn describe_penalty(penalty: &Penalty) -> String {
    let mut text = String::from("penalty");
    if let Some(player) = &penalty.player {
        match (&player.number, &player.name) {
            (Some(number), Some(name)) => text.push_str(&format!(" #{} {}", number, name)),
            (Some(number), None) => text.push_str(&format!(" #{}", number)),
            (None, Some(name)) => text.push_str(&format!(" {}", name)),
            (None, None) => {}
        }
    }
    if let Some(offense) = &penalty.offense {
        text.push_str(&format!(" ({})", offense));
    }
    if let Some(time) = &penalty.time.time {
        text.push_str(&format!(" {}", time.display()));
    }
    text
}
