use clap::Parser;
use opamp_dashboard::cli::{self, Cli};
use opamp_dashboard::logging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.log_json);

    cli::run(cli).await
}
