//! Command line / environment configuration.

use clap::Parser;

/// Server options
#[derive(Debug, Clone, Parser)]
#[command(name = "syncroom-server")]
#[command(version)]
#[command(about = "Password-gated collaborative text room relay", long_about = None)]
pub struct ServerArgs {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Default log level when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerArgs {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
