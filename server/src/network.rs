//! Server network layer: WebSocket sessions, latency probes and the dispatch loop

use crate::client_manager::ClientManager;
use crate::gateway::SessionGateway;
use crate::repository::StateRepository;
use crate::sports::SportRegistry;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{default_addr, ClientEvent, ProbePacket, ServerEvent, SyncError, PROBE_BUFFER_SIZE};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;

pub type ServerResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Startup settings for [`Server`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// WebSocket listen address; the UDP probe binds the same port
    pub addr: String,
    /// How often every channel is told its game's current revision
    pub heartbeat_interval: Duration,
    pub max_clients: usize,
    /// Sport used for games referenced before anyone created them
    pub default_sport: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            heartbeat_interval: Duration::from_secs(5),
            max_clients: 64,
            default_sport: "hockey".to_string(),
        }
    }
}

/// Messages sent from network tasks to the dispatch loop
#[derive(Debug)]
pub enum ServerMessage {
    EventReceived { client_id: u32, event: ClientEvent },
    ClientDisconnected { client_id: u32 },
    Heartbeat,
    Shutdown,
}

/// Authoritative scoreboard server
///
/// Network tasks only parse and forward; every state change happens on the
/// loop in [`Server::run`], one event at a time.
pub struct Server {
    listener: Option<TcpListener>,
    probe_socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    clients: Arc<RwLock<ClientManager>>,
    gateway: SessionGateway,
    heartbeat_interval: Duration,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> ServerResult<Self> {
        let listener = TcpListener::bind(&config.addr).await?;
        let local_addr = listener.local_addr()?;
        let probe_socket = Arc::new(UdpSocket::bind(local_addr).await?);
        info!("Server listening on {} (WebSocket and UDP probe)", local_addr);

        let mut sports = SportRegistry::with_builtin();
        sports.set_default_sport(&config.default_sport)?;

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            probe_socket,
            local_addr,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            gateway: SessionGateway::new(StateRepository::in_memory(sports)),
            heartbeat_interval: config.heartbeat_interval,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Sender that can stop the server from another task
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns the task accepting WebSocket connections
    fn spawn_connection_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            return;
        };
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        let clients = Arc::clone(&clients);
                        let server_tx = server_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, clients, server_tx).await
                            {
                                warn!("Connection from {} ended with error: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task answering UDP latency probes
    ///
    /// Probes never touch game state, so they are answered here rather than
    /// on the dispatch loop.
    fn spawn_probe_responder(&self) {
        let socket = Arc::clone(&self.probe_socket);

        tokio::spawn(async move {
            let mut buffer = [0u8; PROBE_BUFFER_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        let Ok(packet) = ProbePacket::from_bytes(&buffer[0..len]) else {
                            warn!("Failed to deserialize probe from {}", addr);
                            continue;
                        };
                        let Some(reply) = packet.reply() else {
                            continue;
                        };
                        match reply.to_bytes() {
                            Ok(data) => {
                                if let Err(e) = socket.send_to(&data, addr).await {
                                    debug!("Failed to answer probe from {}: {}", addr, e);
                                }
                            }
                            Err(e) => error!("Failed to serialize probe reply: {}", e),
                        }
                    }
                    Err(e) => {
                        error!("Error receiving probe: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns the task that periodically asks the loop for a heartbeat
    fn spawn_heartbeat(&self) {
        let server_tx = self.server_tx.clone();
        let period = self.heartbeat_interval;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick fires immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if server_tx.send(ServerMessage::Heartbeat).is_err() {
                    break;
                }
            }
        });
    }

    /// Main server loop
    pub async fn run(&mut self) -> ServerResult<()> {
        self.spawn_connection_acceptor();
        self.spawn_probe_responder();
        self.spawn_heartbeat();

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::EventReceived { client_id, event } => {
                    let clients = self.clients.read().await;
                    self.gateway.handle(client_id, event, &*clients);
                }
                ServerMessage::ClientDisconnected { client_id } => {
                    self.gateway.disconnect(client_id);
                }
                ServerMessage::Heartbeat => {
                    let clients = self.clients.read().await;
                    let sent = self.gateway.heartbeat(&*clients);
                    if sent > 0 {
                        debug!(
                            "Heartbeat sent to {} connections across {} games",
                            sent,
                            self.gateway.router().channels().len()
                        );
                    }
                }
                ServerMessage::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Runs one WebSocket session until the peer goes away
///
/// Inbound frames are decoded here and forwarded to the dispatch loop;
/// outbound events are drained by a dedicated writer task, which keeps
/// delivery to this connection in order.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    clients: Arc<RwLock<ClientManager>>,
    server_tx: mpsc::UnboundedSender<ServerMessage>,
) -> ServerResult<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut source) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    let client_id = {
        let mut clients = clients.write().await;
        clients.add_client(addr, tx.clone())
    };
    let Some(client_id) = client_id else {
        let event = ServerEvent::Error {
            who: shared::Who::Server,
            details: "Server full".to_string(),
        };
        sink.send(Message::Text(event.encode()?)).await?;
        sink.close().await?;
        return Ok(());
    };

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match event.encode() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode event for client {}: {}", client_id, e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = source.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!("Client {} read error: {}", client_id, e);
                break;
            }
        };

        match message {
            Message::Text(text) => match ClientEvent::decode(&text) {
                Ok(ClientEvent::Ping { nonce }) => {
                    let _ = tx.send(ServerEvent::Pong { nonce });
                }
                Ok(event) => {
                    clients.write().await.touch(client_id);
                    if server_tx
                        .send(ServerMessage::EventReceived { client_id, event })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(err) => {
                    warn!("Client {} sent a malformed message: {}", client_id, err);
                    let _ = tx.send(ServerEvent::error(&err));
                }
            },
            Message::Binary(_) => {
                let err = SyncError::invalid_request("binary frames are not supported");
                let _ = tx.send(ServerEvent::error(&err));
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    clients.write().await.remove_client(&client_id);
    let _ = server_tx.send(ServerMessage::ClientDisconnected { client_id });
    drop(tx);
    let _ = writer.await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn test_config() -> ServerConfig {
        ServerConfig {
            addr: "127.0.0.1:0".to_string(),
            heartbeat_interval: Duration::from_millis(50),
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.addr, "127.0.0.1:3000");
        assert_eq!(config.addr, format!("{}:{}", shared::DEFAULT_HOST, shared::DEFAULT_PORT));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.default_sport, "hockey");
    }

    #[test]
    fn test_server_message_creation() {
        let msg = ServerMessage::EventReceived {
            client_id: 7,
            event: ClientEvent::ListSports,
        };

        match msg {
            ServerMessage::EventReceived { client_id, event } => {
                assert_eq!(client_id, 7);
                assert_eq!(event, ClientEvent::ListSports);
            }
            _ => panic!("Unexpected message type"),
        }
    }

    #[test]
    fn test_channel_communication() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

        assert!(tx.send(ServerMessage::ClientDisconnected { client_id: 3 }).is_ok());

        match rx.try_recv() {
            Ok(ServerMessage::ClientDisconnected { client_id }) => assert_eq!(client_id, 3),
            other => panic!("Unexpected message {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_default_sport_rejected() {
        let config = ServerConfig {
            default_sport: "curling".to_string(),
            ..test_config()
        };
        assert!(Server::new(config).await.is_err());
    }

    #[tokio::test]
    async fn test_probe_responder_echoes_ping() {
        let mut server = Server::new(test_config()).await.unwrap();
        let addr = server.local_addr();
        let control = server.control();
        let handle = tokio::spawn(async move {
            let _ = server.run().await;
        });

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let ping = ProbePacket::Ping {
            nonce: 77,
            sent_at: 1234,
        };
        socket.send_to(&ping.to_bytes().unwrap(), addr).await.unwrap();

        let mut buffer = [0u8; PROBE_BUFFER_SIZE];
        let (len, _) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .expect("probe reply timed out")
            .unwrap();
        assert_eq!(
            ProbePacket::from_bytes(&buffer[..len]).unwrap(),
            ProbePacket::Pong {
                nonce: 77,
                sent_at: 1234
            }
        );

        control.send(ServerMessage::Shutdown).unwrap();
        timeout(Duration::from_secs(2), handle)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}
