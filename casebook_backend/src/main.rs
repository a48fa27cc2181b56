use anyhow::{Context, Result};
use casebook_backend::config::CasebookConfig;
use casebook_backend::node::CasebookNode;
use casebook_backend::stats::StatsService;
use casebook_backend::telemetry;
use casebook_backend::utils;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about = "Casebook backend: clinical case sharing API")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
    /// Create the data directories and apply database migrations, then exit
    Migrate,
    /// Print dashboard statistics as JSON
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();

    let config = CasebookConfig::from_env()?;
    let node = CasebookNode::start(config)?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => node.run_http_server().await,
        Command::Migrate => {
            tracing::info!(db_path = %node.config().paths.db_path.display(), "migrations applied");
            Ok(())
        }
        Command::Stats => {
            let overview = StatsService::new(node.database())
                .overview()
                .context("failed to compute statistics")?;
            println!("{}", serde_json::to_string_pretty(&overview)?);
            Ok(())
        }
    }
}
