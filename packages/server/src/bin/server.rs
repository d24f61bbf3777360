//! Collaborative text room relay server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin syncroom-server -- --port 3000
//! ```

use clap::Parser;
use syncroom_server::ServerArgs;
use syncroom_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    let args = ServerArgs::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    // Run the server
    if let Err(e) = syncroom_server::run_server(args).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
