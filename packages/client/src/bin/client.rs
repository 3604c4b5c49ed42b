//! Carelink messaging client.
//!
//! Connects to the realtime gateway as one user and chats from the terminal.
//! Reconnects with exponential backoff when the connection drops.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin carelink-client -- --user-id alice
//! cargo run --bin carelink-client -- -u bob --url ws://127.0.0.1:8080/ws
//! ```

use std::path::PathBuf;
use std::time::Duration;

use carelink_client::config::ClientConfig;
use carelink_client::connection::ReconnectPolicy;
use carelink_client::session::run_session;
use carelink_shared::logger::setup_logger;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "carelink-client")]
#[command(about = "Terminal chat client for the Carelink realtime gateway", long_about = None)]
struct Args {
    /// User id to register as
    #[arg(short = 'u', long)]
    user_id: String,

    /// Gateway WebSocket URL
    #[arg(long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Portal REST API base URL
    #[arg(long, default_value = "http://127.0.0.1:5000/api")]
    api_url: String,

    /// File holding read watermarks
    #[arg(long, default_value = "carelink-watermarks.json")]
    watermarks: PathBuf,

    /// Reconnect attempts per outage
    #[arg(long, default_value = "5")]
    max_attempts: u32,

    /// First reconnect delay in milliseconds (doubles per attempt)
    #[arg(long, default_value = "500")]
    initial_delay_ms: u64,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        Self {
            user_id: args.user_id,
            gateway_url: args.url,
            api_base_url: args.api_url,
            watermark_path: args.watermarks,
            reconnect: ReconnectPolicy {
                initial_delay: Duration::from_millis(args.initial_delay_ms),
                max_attempts: args.max_attempts,
                ..ReconnectPolicy::default()
            },
        }
    }
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let config = ClientConfig::from(Args::parse());

    if let Err(e) = run_session(config).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
