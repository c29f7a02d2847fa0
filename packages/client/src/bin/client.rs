//! Console client for the estate realtime core.
//!
//! Keeps one WebSocket connection to the realtime server and lets you chat,
//! watch presence and manage notifications from the terminal.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin estate-client -- --user-id alice --token <jwt>
//! cargo run --bin estate-client -- -i bob -r seller -u ws://127.0.0.1:8080/ws
//! ```

use clap::Parser;

use estate_realtime::{
    config::{DEFAULT_API_BASE_URL, DEFAULT_SERVER_URL, SyncConfig},
    ui::{ClientOptions, run_client},
};
use estate_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "estate-client")]
#[command(about = "Realtime console client for the estate portal", long_about = None)]
struct Args {
    /// Identity to connect as
    #[arg(short = 'i', long)]
    user_id: String,

    /// Role used to filter announcements
    #[arg(short = 'r', long, default_value = "buyer")]
    role: String,

    /// Bearer token; without it the connection is anonymous
    #[arg(short = 't', long)]
    token: Option<String>,

    /// WebSocket server URL
    #[arg(short = 'u', long, default_value = DEFAULT_SERVER_URL)]
    url: String,

    /// Notification REST API base URL
    #[arg(long, default_value = DEFAULT_API_BASE_URL)]
    api_url: String,

    /// Heartbeat interval in seconds
    #[arg(long, default_value_t = 30)]
    heartbeat_secs: u64,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let config = SyncConfig {
        server_url: args.url,
        api_base_url: args.api_url,
        ..SyncConfig::default()
    }
    .with_heartbeat_secs(args.heartbeat_secs);

    let options = ClientOptions {
        user_id: args.user_id,
        role: args.role,
        token: args.token,
        config,
    };

    if let Err(e) = run_client(options).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
