//! Local cluster of simulated nodes
//!
//! Run with: cargo run --example traffic_cluster [NODES] [PROXY_PORT_START]
//!
//! Examples:
//!   cargo run --example traffic_cluster            # 3 nodes, servers on 4000..4002
//!   cargo run --example traffic_cluster 5 4100     # 5 nodes, servers on 4100..4104
//!
//! Prints the manifest a dashboard loads, starts every node and serves until
//! Ctrl+C. Each node sends a packet to the next peer every half second, so
//! `/sent` on one node and `/recv` on its peer show the same packet ids.

use traffic_hub::{Cluster, ClusterConfig};

fn print_usage() {
    eprintln!("Usage: traffic_cluster [NODES] [PROXY_PORT_START]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  NODES               Number of nodes (default: 3)");
    eprintln!("  PROXY_PORT_START    Port of the first traffic server (default: 4000)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let mut config = ClusterConfig::default();
    if let Some(nodes) = args.get(1) {
        config = config.nodes(nodes.parse()?);
    }
    if let Some(port) = args.get(2) {
        config = config.proxy_port_start(port.parse()?);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("traffic_hub=info".parse()?)
                .add_directive("traffic_cluster=debug".parse()?),
        )
        .init();

    let cluster = Cluster::new(config)?;
    println!("{}", cluster.manifest().to_json()?);

    cluster.start_all().await?;
    cluster
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
