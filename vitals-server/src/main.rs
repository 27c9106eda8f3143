use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};
use vitals_common::STORE_CAPACITY;
use vitals_server::config::DEFAULT_ADDRESS;
use vitals_server::{Server, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "vitals-server", about = "Web Vitals telemetry collector")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "VITALS_ADDRESS", default_value = DEFAULT_ADDRESS)]
    address: SocketAddr,

    /// Number of most recent reports kept in memory.
    #[arg(
        long,
        env = "VITALS_CAPACITY",
        default_value_t = STORE_CAPACITY,
        value_parser = parse_capacity
    )]
    capacity: usize,
}

fn parse_capacity(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("capacity must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let config = ServerConfig { address: args.address, capacity: args.capacity };

    let (ready_tx, ready_rx) = tokio::sync::oneshot::channel();

    // Print "Listening on <addr>" once the server signals it is bound.
    tokio::spawn(async move {
        if let Ok(addr) = ready_rx.await {
            println!("Listening on {}", addr);
        }
    });

    Server::new(config).run(ready_tx).await?;
    Ok(())
}
