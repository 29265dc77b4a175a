use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Switchyard translation gateway
#[derive(Debug, Parser)]
#[command(name = "switchyard", about = "Anthropic Messages gateway for OpenAI, Gemini and Vertex providers")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "switchyard.toml", env = "SWITCHYARD_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "SWITCHYARD_LISTEN")]
    pub listen: Option<SocketAddr>,

    /// Override the log filter (e.g. `switchyard_llm=debug`)
    #[arg(long, env = "SWITCHYARD_LOG")]
    pub log: Option<String>,
}
