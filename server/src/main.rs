use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerConfig};
use shared::{DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,
    /// Port for WebSocket sessions and UDP latency probes
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Seconds between revision heartbeats
    #[clap(long, default_value = "5")]
    heartbeat_secs: u64,
    /// Maximum number of concurrent connections
    #[clap(short, long, default_value = "64")]
    max_clients: usize,
    /// Sport used when a client asks for a game nobody created
    #[clap(short, long, default_value = "hockey")]
    default_sport: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let args = Args::parse();

    let config = ServerConfig {
        addr: format!("{}:{}", args.host, args.port),
        heartbeat_interval: Duration::from_secs(args.heartbeat_secs.max(1)),
        max_clients: args.max_clients,
        default_sport: args.default_sport,
    };

    info!("Starting scoreboard server on {}", config.addr);
    let mut server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
