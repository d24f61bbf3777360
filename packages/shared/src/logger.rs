//! Logger setup shared by every SyncRoom binary.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence. Otherwise `default_level` applies to the
/// calling binary and the SyncRoom crates, while everything else stays at `warn`.
pub fn setup_logger(bin_name: &str, default_level: &str) {
    let crate_name = bin_name.replace('-', "_");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,{crate_name}={default_level},syncroom_server={default_level},syncroom_client={default_level},tower_http={default_level}"
        ))
    });

    // try_init so that tests and repeated calls don't panic
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}
