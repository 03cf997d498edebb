use clap::{Parser, Subcommand};

mod commands;

pub use commands::run;

#[derive(Parser)]
#[command(
    name = "opamp-dashboard",
    version,
    about = "Web dashboard for OpAMP-managed agents"
)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the dashboard web server
    Serve(ServeOpts),
    /// List agents known to the backend
    Agents(ListOpts),
    /// Show one agent
    Agent(ShowOpts),
    /// Replace an agent's configuration with the contents of a file
    PushConfig(PushOpts),
    /// Ask the backend to rotate an agent's client certificate
    RotateCert(RotateOpts),
    /// Canonicalise a YAML file locally
    Format(FormatOpts),
    Config(ConfigOpts),
    /// Check the backend health endpoint
    Doctor(BackendOpts),
    Version,
}

#[derive(clap::Args)]
pub struct ServeOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[arg(short, long)]
    pub port: Option<u16>,
    #[arg(short, long)]
    pub bind: Option<String>,
    #[arg(long, env = "OPAMP_API_URL")]
    pub backend_url: Option<String>,
}

/// Options shared by every command that talks to the backend.
#[derive(clap::Args)]
pub struct BackendOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[arg(long, env = "OPAMP_API_URL")]
    pub backend_url: Option<String>,
}

#[derive(clap::Args)]
pub struct ListOpts {
    #[command(flatten)]
    pub backend: BackendOpts,
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args)]
pub struct ShowOpts {
    #[command(flatten)]
    pub backend: BackendOpts,
    pub id: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args)]
pub struct PushOpts {
    #[command(flatten)]
    pub backend: BackendOpts,
    pub id: String,
    pub file: String,
    /// Canonicalise the YAML before sending it
    #[arg(long)]
    pub format: bool,
}

#[derive(clap::Args)]
pub struct RotateOpts {
    #[command(flatten)]
    pub backend: BackendOpts,
    pub id: String,
}

#[derive(clap::Args)]
pub struct FormatOpts {
    pub file: String,
    /// Rewrite the file instead of printing the result
    #[arg(short, long)]
    pub write: bool,
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    Init,
}
