//! Line-oriented chat client for the Linecast relay.
//!
//! Connects to the relay, prefixes every typed line with the display name and
//! prints every line relayed from other clients. The server does not echo a
//! line back, so sent messages are rendered locally.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin linecast-client -- --name Alice
//! cargo run --bin linecast-client -- -H 192.168.0.10 -p 1234
//! ```

use clap::Parser;

use linecast_client::{prompt_display_name, run_client_session};
use linecast_shared::{
    logger::setup_logger,
    protocol::{DEFAULT_HOST, DEFAULT_PORT},
};

#[derive(Parser, Debug)]
#[command(name = "linecast-client")]
#[command(about = "Terminal chat client for the Linecast line relay", long_about = None)]
struct Args {
    /// Server host to connect to
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port to connect to
    #[arg(short = 'p', long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Display name prefixed to every message (prompted for when omitted)
    #[arg(short = 'n', long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "warn");

    let args = Args::parse();

    let display_name = match args.name {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => match prompt_display_name() {
            Ok(name) => name,
            Err(e) => {
                tracing::error!("Client error: {}", e);
                std::process::exit(1);
            }
        },
    };

    let addr = format!("{}:{}", args.host, args.port);
    if let Err(e) = run_client_session(&addr, &display_name).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
