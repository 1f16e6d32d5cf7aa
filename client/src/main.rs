use clap::Parser;
use client::network::{Client, ClientConfig, ClientMode};
use log::info;
use shared::{default_addr, DEFAULT_GID};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = default_addr())]
    server: String,

    /// Game to follow
    #[arg(short = 'g', long, default_value = DEFAULT_GID)]
    gid: String,

    /// Display only, or display plus stdin edit commands
    #[arg(short = 'm', long, value_enum, default_value = "display")]
    mode: ClientMode,

    /// Seconds between latency probes
    #[arg(long, default_value = "2")]
    probe_secs: u64,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {} (game {})", args.server, args.gid);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let mut client = Client::new(ClientConfig {
        server: args.server,
        gid: args.gid,
        mode: args.mode,
        probe_interval: Duration::from_secs(args.probe_secs.max(1)),
        fake_ping_ms: args.fake_ping,
    })
    .await?;

    tokio::select! {
        result = client.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    Ok(())
}
