//! Single simulated node behind a traffic server
//!
//! Run with: cargo run --example single_node [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example single_node                    # binds to 0.0.0.0:4000
//!   cargo run --example single_node localhost          # binds to 127.0.0.1:4000
//!   cargo run --example single_node 127.0.0.1:4100     # binds to 127.0.0.1:4100
//!
//! The node starts stopped. Then:
//!
//!   curl -N http://localhost:4000/sent     # watch outbound packets
//!   curl -X POST http://localhost:4000/start
//!   curl -X POST http://localhost:4000/stop
//!   curl http://localhost:4000/stats
//!
//! The node talks to an address nobody listens on, so only `/sent` carries
//! traffic. Run `traffic_cluster` to see both directions.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use traffic_hub::source::{SimulatedLauncher, SimulationConfig};
use traffic_hub::{NodeSession, ServerConfig, TrafficHub, TrafficServer};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:4000
/// - "127.0.0.1" -> 127.0.0.1:4000
/// - "127.0.0.1:4100" -> 127.0.0.1:4100
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 4000;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: single_node [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:4000)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], 4000)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("traffic_hub=debug".parse()?)
                .add_directive("single_node=debug".parse()?),
        )
        .init();

    let simulation = SimulationConfig::new("127.0.0.1:5000")
        .peers(["127.0.0.1:5001"])
        .interval(Duration::from_secs(1));
    let session = Arc::new(NodeSession::new(
        SimulatedLauncher::new(simulation),
        TrafficHub::new(),
    ));
    let server = TrafficServer::new(ServerConfig::with_addr(bind_addr), Arc::clone(&session));

    println!("Traffic server on http://{}", bind_addr);
    println!("  GET  /sent /recv   event streams");
    println!("  POST /start /stop  node control");
    println!();

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    session.stop().await?;
    Ok(())
}
