//! BALLOTBOX Node Binary

use anyhow::Context;
use ballotbox_core::{NodeConfig, Role};
use ballotbox_node::{issue_token, NodeBuilder};
use ballotbox_voting::SeedConfig;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ballotbox-node")]
#[command(about = "BALLOTBOX Node - single-vote ballots with live tallies")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed file path
        #[arg(short, long)]
        seed: Option<PathBuf>,

        /// API listen address
        #[arg(long)]
        api_addr: Option<String>,

        /// Data directory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Keep the ballot in memory only
        #[arg(long)]
        memory: bool,
    },

    /// Write a seed file template
    Seed {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Sign a bearer token with the node's secret, for local testing
    Token {
        /// Voter id
        #[arg(long)]
        sub: String,

        /// Role: voter or admin
        #[arg(long, default_value = "voter")]
        role: Role,

        /// Lifetime in hours
        #[arg(long, default_value = "24")]
        hours: i64,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<NodeConfig> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            NodeConfig::from_json(&content)?
        }
        None => NodeConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            seed,
            api_addr,
            data_dir,
            memory,
        } => {
            let config = load_config(config.as_deref())?;
            init_logging(&config.log_level);

            info!("🗳️ Starting BALLOTBOX Node...");

            let mut builder = NodeBuilder::new().config(config);

            if let Some(addr) = api_addr {
                builder = builder.api_addr(&addr);
            }
            if let Some(dir) = data_dir {
                builder = builder.data_dir(dir);
            }
            if memory {
                builder = builder.in_memory();
            }
            if let Some(path) = seed {
                builder = builder.seed(SeedConfig::load(&path)?);
            }

            let node = builder.build()?;
            node.start().await?;
        }

        Commands::Seed { output } => {
            let json = SeedConfig::template().to_json()?;
            std::fs::write(&output, &json)?;

            println!("Seed template saved to: {}", output.display());
        }

        Commands::Token {
            sub,
            role,
            hours,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let token = issue_token(
                &config.auth.jwt_secret,
                &sub,
                role,
                chrono::Duration::hours(hours),
            )?;

            println!("{}", token);
        }
    }

    Ok(())
}
