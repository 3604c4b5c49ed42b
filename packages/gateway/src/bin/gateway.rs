//! Realtime channel gateway.
//!
//! Relays chat events between sessions registered under user ids.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin carelink-gateway
//! cargo run --bin carelink-gateway -- --host 0.0.0.0 --port 3000
//! ```

use carelink_gateway::{config::GatewayConfig, ui::Server};
use carelink_shared::logger::setup_logger;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "carelink-gateway")]
#[command(about = "Realtime channel gateway relaying chat events between registered sessions", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Number of relayed message ids remembered for delete authorization
    #[arg(long, default_value = "10000")]
    ledger_capacity: usize,
}

impl From<Args> for GatewayConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            ledger_capacity: args.ledger_capacity,
        }
    }
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let config = GatewayConfig::from(Args::parse());

    let server = Server::from_config(&config);
    if let Err(e) = server.run(&config).await {
        tracing::error!("Gateway error: {}", e);
        std::process::exit(1);
    }
}
