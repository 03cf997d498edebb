use super::*;
use crate::agents::{Agent, AgentGateway, AgentSummary, HttpAgentGateway};
use crate::config::{read_bounded, validate_config_object, Config};
use crate::dashboard::DashboardServer;
use crate::document;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{error, info};

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(opts) => {
            info!("Starting OpAMP dashboard");
            let config = Config::load(opts.config.as_deref())?;
            let server = DashboardServer::new(config, &opts)?;
            server.run_until_shutdown().await?;
        }
        Commands::Agents(opts) => {
            let gateway = connect(&opts.backend)?;
            let agents = gateway.list_agents().await?;
            if opts.json {
                println!("{}", serde_json::to_string_pretty(&agents)?);
            } else {
                print_agent_table(&agents);
            }
        }
        Commands::Agent(opts) => {
            let gateway = connect(&opts.backend)?;
            let agent = gateway.get_agent(&opts.id).await?;
            if opts.json {
                println!("{}", serde_json::to_string_pretty(&agent)?);
            } else {
                print_agent(&agent);
            }
        }
        Commands::PushConfig(opts) => {
            let text = read_bounded(Path::new(&opts.file))?;
            let text = prepare_config(&text, opts.format)
                .with_context(|| format!("{} is not valid YAML", opts.file))?;
            let gateway = connect(&opts.backend)?;
            let ack = gateway.save_config(&opts.id, &text).await?;
            info!(
                "Configuration for agent {} accepted (status {})",
                opts.id, ack.status
            );
        }
        Commands::RotateCert(opts) => {
            let gateway = connect(&opts.backend)?;
            gateway.rotate_client_cert(&opts.id).await?;
            info!("Client certificate rotation requested for agent {}", opts.id);
        }
        Commands::Format(opts) => {
            let text = read_bounded(Path::new(&opts.file))?;
            let formatted = document::format(&text)
                .with_context(|| format!("{} is not valid YAML", opts.file))?;
            if opts.write {
                if formatted != text {
                    std::fs::write(&opts.file, &formatted)
                        .with_context(|| format!("Cannot write {}", opts.file))?;
                    info!("Formatted {}", opts.file);
                }
            } else {
                print!("{formatted}");
            }
        }
        Commands::Config(opts) => match opts.action {
            ConfigAction::Show => {
                let config = Config::load(opts.config.as_deref())?;
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            ConfigAction::Validate => {
                Config::load(opts.config.as_deref())?;
                info!("Configuration is valid");
            }
            ConfigAction::Init => {
                let path = opts.config.as_deref().unwrap_or("opamp-dashboard.yaml");
                if Path::new(path).exists() {
                    anyhow::bail!("{} already exists", path);
                }
                Config::write_default(path)?;
                info!("Configuration file created at {}", path);
            }
        },
        Commands::Doctor(opts) => doctor(&opts).await?,
        Commands::Version => {
            println!("opamp-dashboard {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Build a gateway from the config file with the command-line backend URL on top.
fn connect(opts: &BackendOpts) -> Result<HttpAgentGateway> {
    let mut config = Config::load(opts.config.as_deref())?;
    if let Some(url) = &opts.backend_url {
        config.backend.base_url = url.clone();
        validate_config_object(&config)?;
    }
    HttpAgentGateway::from_config(&config.backend).context("Cannot create backend client")
}

/// Parse (and optionally canonicalise) configuration text before it is sent.
fn prepare_config(text: &str, format: bool) -> Result<String, document::DocumentError> {
    if format {
        document::format(text)
    } else {
        document::parse(text).map(|_| text.to_string())
    }
}

async fn doctor(opts: &BackendOpts) -> Result<()> {
    info!("Running diagnostics...");
    let gateway = connect(opts)?;
    info!("Backend: {}", gateway.base_url());

    if let Err(e) = gateway.ping().await {
        error!("Backend health check failed: {}", e);
        anyhow::bail!("backend at {} is not healthy", gateway.base_url());
    }
    info!("Backend health check passed");

    let agents = gateway.list_agents().await?;
    let up = agents.iter().filter(|a| a.is_up()).count();
    info!("{} agents registered, {} up", agents.len(), up);
    info!("Diagnostics complete");
    Ok(())
}

fn print_agent_table(agents: &[AgentSummary]) {
    if agents.is_empty() {
        println!("No agents registered");
        return;
    }
    let width = agents
        .iter()
        .map(|a| a.instance_id.len())
        .max()
        .unwrap_or(0)
        .max("INSTANCE ID".len());
    println!("{:<width$}  STATUS", "INSTANCE ID");
    for agent in agents {
        let status = if agent.is_up() { "Up" } else { "Down" };
        println!("{:<width$}  {}", agent.instance_id, status);
    }
}

fn print_agent(agent: &Agent) {
    println!("Instance ID: {}", agent.instance_id);
    println!("Status:      {}", if agent.is_up() { "Up" } else { "Down" });
    if let Some(seq) = agent.sequence_num() {
        println!("Sequence:    {}", seq);
    }
    if let Some(started) = agent.started_at() {
        println!("Started:     {}", started.to_rfc3339());
    }
    if let Some(fp) = agent.client_cert() {
        println!("Client cert: {}", fp);
    }
    for (title, attrs) in [
        ("Identifying attributes", agent.identifying_attributes()),
        ("Non-identifying attributes", agent.non_identifying_attributes()),
    ] {
        if attrs.is_empty() {
            continue;
        }
        println!("{}:", title);
        for attr in attrs {
            println!("  {} = {}", attr.key, attr.value_str());
        }
    }
    println!("Effective config:");
    print!("{}", agent.effective_config);
    if !agent.effective_config.ends_with('\n') {
        println!();
    }
}
