//! Command-line latency check against a running scoreboard server

use clap::Parser;
use shared::{default_addr, get_timestamp, ProbePacket, PROBE_BUFFER_SIZE};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address (WebSocket port; probes use the same port over UDP)
    #[clap(short, long, default_value_t = default_addr())]
    server: String,
    /// Number of probes to send
    #[clap(short, long, default_value = "10")]
    count: u64,
    /// Milliseconds to wait for each reply
    #[clap(short, long, default_value = "1000")]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let server: SocketAddr = args.server.parse()?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Probing {} from {}", server, socket.local_addr()?);

    let mut buf = [0u8; PROBE_BUFFER_SIZE];
    let mut samples = Vec::new();

    for nonce in 1..=args.count {
        let ping = ProbePacket::Ping {
            nonce,
            sent_at: get_timestamp(),
        };
        socket.send_to(&ping.to_bytes()?, server).await?;

        match timeout(
            Duration::from_millis(args.timeout_ms),
            socket.recv_from(&mut buf),
        )
        .await
        {
            Ok(Ok((len, _))) => match ProbePacket::from_bytes(&buf[0..len]) {
                Ok(ProbePacket::Pong { nonce: echoed, sent_at }) if echoed == nonce => {
                    let rtt = get_timestamp().saturating_sub(sent_at);
                    println!("probe {}: {} ms", nonce, rtt);
                    samples.push(rtt);
                }
                Ok(other) => println!("probe {}: unexpected reply {:?}", nonce, other),
                Err(e) => println!("probe {}: failed to deserialize reply: {}", nonce, e),
            },
            Ok(Err(e)) => println!("probe {}: receive error: {}", nonce, e),
            Err(_) => println!("probe {}: timed out", nonce),
        }

        sleep(Duration::from_millis(200)).await;
    }

    let lost = args.count - samples.len() as u64;
    if samples.is_empty() {
        println!("No replies ({} lost)", lost);
    } else {
        let min = samples.iter().min().copied().unwrap_or_default();
        let max = samples.iter().max().copied().unwrap_or_default();
        let avg = samples.iter().sum::<u64>() as f64 / samples.len() as f64;
        println!(
            "{} replies, {} lost, min {} ms, avg {:.1} ms, max {} ms",
            samples.len(),
            lost,
            min,
            avg,
            max
        );
    }

    Ok(())
}
