use crate::input::{parse_command, Command, HELP};
use crate::probe::LatencyProbe;
use crate::reconciler::Reconciler;
use crate::rendering::{RenderConfig, Renderer};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientEvent, ProbePacket, ServerEvent, PROBE_BUFFER_SIZE};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

const RECONNECT_BACKOFF_BASE: Duration = Duration::from_millis(500);
const RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(10);

/// What the client is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ClientMode {
    /// Show the scoreboard and follow every change
    Display,
    /// Also read edit commands from stdin
    Controller,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server `host:port`; the probe uses the same port over UDP
    pub server: String,
    pub gid: String,
    pub mode: ClientMode,
    pub probe_interval: Duration,
    /// Artificial delay added to each direction, in milliseconds
    pub fake_ping_ms: u64,
}

enum SessionEnd {
    Quit,
    Closed,
}

pub struct Client {
    config: ClientConfig,
    probe_socket: UdpSocket,
    probe_addr: Option<SocketAddr>,

    reconciler: Reconciler,
    probe: LatencyProbe,
    renderer: Renderer,

    commands: Option<mpsc::UnboundedReceiver<String>>,
}

impl Client {
    pub async fn new(config: ClientConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let probe_socket = UdpSocket::bind("0.0.0.0:0").await?;
        let probe_addr = lookup_host(config.server.as_str()).await?.next();
        if probe_addr.is_none() {
            warn!("Could not resolve {}; latency probe disabled", config.server);
        }

        Ok(Client {
            reconciler: Reconciler::new(config.gid.clone()),
            probe: LatencyProbe::default(),
            renderer: Renderer::stdout(),
            commands: None,
            probe_socket,
            probe_addr,
            config,
        })
    }

    /// Feeds controller commands from `commands` instead of stdin
    pub fn with_commands(mut self, commands: mpsc::UnboundedReceiver<String>) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Connects and keeps reconnecting until the user quits
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if self.config.mode == ClientMode::Controller && self.commands.is_none() {
            self.commands = Some(spawn_stdin_reader());
            self.notice(HELP);
        }

        let url = format!("ws://{}", self.config.server);
        let mut failures: u32 = 0;

        loop {
            self.reconciler.on_connecting();
            self.show_status();

            match connect_async(url.as_str()).await {
                Ok((ws, _)) => {
                    info!("Connected to {}", url);
                    failures = 0;
                    match self.session(ws).await {
                        Ok(SessionEnd::Quit) => {
                            self.reconciler.on_disconnected();
                            return Ok(());
                        }
                        Ok(SessionEnd::Closed) => info!("Server closed the connection"),
                        Err(e) => warn!("Connection lost: {}", e),
                    }
                }
                Err(e) => warn!("Failed to connect to {}: {}", url, e),
            }

            self.reconciler.on_disconnected();
            self.show_status();

            failures = failures.saturating_add(1);
            let delay = backoff_delay(failures);
            info!("Reconnecting in {:?} (attempt {})", delay, failures);
            sleep(delay).await;
        }
    }

    async fn session(&mut self, ws: WsStream) -> Result<SessionEnd, Box<dyn std::error::Error>> {
        let (mut sink, mut source) = ws.split();

        let hello = self.reconciler.on_connected();
        self.send(&mut sink, &hello).await?;
        self.show_status();

        let mut probe_timer = interval(self.config.probe_interval);
        probe_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut buffer = [0u8; PROBE_BUFFER_SIZE];

        loop {
            tokio::select! {
                message = source.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            if self.config.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.config.fake_ping_ms / 2)).await;
                            }
                            match ServerEvent::decode(&text) {
                                Ok(event) => self.handle_event(event, &mut sink).await?,
                                Err(e) => warn!("Ignoring malformed server message: {}", e),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => return Ok(SessionEnd::Closed),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                    }
                },

                line = next_line(&mut self.commands) => {
                    let Some(line) = line else {
                        info!("Command input closed");
                        return Ok(SessionEnd::Quit);
                    };
                    if self.handle_line(&line, &mut sink).await? {
                        let _ = sink.close().await;
                        return Ok(SessionEnd::Quit);
                    }
                },

                _ = probe_timer.tick() => {
                    self.send_probe().await;
                },

                result = self.probe_socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => match ProbePacket::from_bytes(&buffer[0..len]) {
                            Ok(packet) => {
                                if let Some(rtt) = self.probe.record(&packet) {
                                    debug!("Probe round trip {:.1} ms", rtt);
                                }
                            }
                            Err(e) => debug!("Ignoring malformed probe reply: {}", e),
                        },
                        Err(e) => error!("Error receiving probe: {}", e),
                    }
                },
            }
        }
    }

    async fn send(
        &self,
        sink: &mut WsSink,
        event: &ClientEvent,
    ) -> Result<(), Box<dyn std::error::Error>> {
        if self.config.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.config.fake_ping_ms / 2)).await;
        }

        debug!("Sending {}", event.name());
        sink.send(Message::Text(event.encode()?)).await?;
        Ok(())
    }

    async fn handle_event(
        &mut self,
        event: ServerEvent,
        sink: &mut WsSink,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &event {
            ServerEvent::Sports { sports } => {
                self.notice(&format!("sports: {}", sports.join(", ")));
            }
            ServerEvent::Error { who, details } => {
                self.notice(&format!("error ({}): {}", who, details));
            }
            ServerEvent::Custom { gid, name, data } if gid == self.reconciler.gid() => {
                self.notice(&format!("{}: {}", name, data));
            }
            ServerEvent::NewGid { gid } if gid == self.reconciler.gid() => {
                self.notice(&format!("game {} was reset", gid));
            }
            _ => {}
        }

        let reaction = self.reconciler.handle(event);
        for event in &reaction.send {
            self.send(sink, event).await?;
        }

        self.show_status();
        if reaction.changed {
            self.redraw();
        }
        Ok(())
    }

    /// Returns true when the user asked to quit
    async fn handle_line(
        &mut self,
        line: &str,
        sink: &mut WsSink,
    ) -> Result<bool, Box<dyn std::error::Error>> {
        let command = match parse_command(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Ok(false),
            Err(e) => {
                self.notice(&e.to_string());
                return Ok(false);
            }
        };

        let event = match command {
            Command::Edit(patch) => match self.reconciler.edit(patch) {
                Ok(event) => {
                    self.redraw();
                    event
                }
                Err(e) => {
                    self.notice(&e.to_string());
                    return Ok(false);
                }
            },
            Command::Push => match self.reconciler.push() {
                Ok(event) => event,
                Err(e) => {
                    self.notice(&e.to_string());
                    return Ok(false);
                }
            },
            Command::Pull => {
                let event = self.reconciler.request_full_state();
                self.show_status();
                event
            }
            Command::Reset => ClientEvent::New {
                gid: self.reconciler.gid().to_string(),
            },
            Command::Sports => ClientEvent::ListSports,
            Command::Help => {
                self.notice(HELP);
                return Ok(false);
            }
            Command::Quit => return Ok(true),
        };

        self.send(sink, &event).await?;
        Ok(false)
    }

    async fn send_probe(&mut self) {
        self.probe.expire(Instant::now());

        let Some(addr) = self.probe_addr else {
            return;
        };
        let packet = self.probe.ping();
        match packet.to_bytes() {
            Ok(data) => {
                if let Err(e) = self.probe_socket.send_to(&data, addr).await {
                    debug!("Failed to send probe: {}", e);
                }
            }
            Err(e) => error!("Failed to serialize probe: {}", e),
        }
    }

    fn redraw(&mut self) {
        let Some(view) = self.reconciler.view() else {
            return;
        };
        let config = RenderConfig {
            gid: self.reconciler.gid().to_string(),
            revision: self.reconciler.revision(),
            pending_edits: self.reconciler.pending_len(),
            latency: Some(self.probe.describe()),
            fake_ping_ms: self.config.fake_ping_ms,
        };
        if let Err(e) = self.renderer.render(view, &config) {
            error!("Failed to draw scoreboard: {}", e);
        }
    }

    fn show_status(&mut self) {
        if let Err(e) = self.renderer.status(self.reconciler.status()) {
            error!("Failed to draw status: {}", e);
        }
    }

    fn notice(&mut self, message: &str) {
        if let Err(e) = self.renderer.notice(message) {
            error!("Failed to draw notice: {}", e);
        }
    }
}

/// Delay before reconnect attempt `failures`: 0.5s, 1s, 2s, ... capped
pub fn backoff_delay(failures: u32) -> Duration {
    let pow = failures.saturating_sub(1).min(16);
    let mult: u32 = 1u32.checked_shl(pow).unwrap_or(u32::MAX);
    RECONNECT_BACKOFF_BASE
        .checked_mul(mult)
        .unwrap_or(RECONNECT_BACKOFF_MAX)
        .min(RECONNECT_BACKOFF_MAX)
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

/// Next controller line; never resolves for display-only clients
async fn next_line(commands: &mut Option<mpsc::UnboundedReceiver<String>>) -> Option<String> {
    match commands {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
