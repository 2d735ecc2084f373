use anyhow::Result;
use chitter_common::observability::{init_logging, LogConfig};
use chitter_config::{ChitterConfig, ChitterConfigLoader};
use clap::Parser;

mod runner;

#[derive(Parser, Debug)]
#[command(name = "chitter", about = "Polls tracked accounts and publishes the most-shared links as RSS")]
struct Cli {
    /// Path to the YAML config file.
    #[arg(long, default_value = "chitter.yaml")]
    config: String,

    /// Run a single cycle and exit instead of scheduling.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg: ChitterConfig = ChitterConfigLoader::new().with_file(&cli.config).load()?;

    let log_path = init_logging(LogConfig::default())?;
    tracing::info!(config = %cli.config, log = %log_path.display(), "chitter.start");

    let runner = runner::Runner::from_config(cfg).await?;
    if cli.once {
        runner.run_once().await
    } else {
        runner.run_scheduled().await
    }
}
