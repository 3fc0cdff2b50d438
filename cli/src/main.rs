//! BALLOTBOX CLI - Command Line Interface

use ballotbox_cli::{render_table, truncate, ApiClient};
use clap::{Parser, Subcommand};
use colored::Colorize;

#[derive(Parser)]
#[command(name = "ballot")]
#[command(about = "BALLOTBOX - vote from the terminal")]
#[command(version)]
struct Cli {
    /// Node URL
    #[arg(short, long, default_value = "http://127.0.0.1:3001")]
    node: String,

    /// Bearer token from the identity provider
    #[arg(short, long, env = "BALLOT_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List options and tallies
    List,

    /// Add an option (admin)
    Add {
        /// Option label
        label: String,
    },

    /// Remove an option (admin)
    Remove {
        /// Option ID
        id: String,
    },

    /// Cast your vote
    Vote {
        /// Option ID
        id: String,
    },

    /// Show your voter record
    Me,

    /// Compare tallies with committed votes (admin)
    Audit,

    /// Node status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api_client = ApiClient::new(&cli.node, cli.token)?;

    if let Err(e) = run(cli.command, &api_client).await {
        eprintln!("{} {}", "❌ Error:".red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}

async fn run(command: Commands, api_client: &ApiClient) -> anyhow::Result<()> {
    match command {
        Commands::List => {
            let options = api_client.list_options().await?;
            if options.is_empty() {
                println!("No options yet.");
            } else {
                println!("{}", render_table(&options));
            }
        }

        Commands::Add { label } => {
            let option = api_client.add_option(&label).await?;
            println!("{} Option '{}' added", "✅".green(), option.label);
            println!("ID: {}", option.id);
        }

        Commands::Remove { id } => {
            let response = api_client.remove_option(&id).await?;
            println!("{} {} ({})", "✅".green(), response.message, response.id);
        }

        Commands::Vote { id } => {
            let receipt = api_client.vote(&id).await?;
            println!(
                "{} Voted for '{}', tally now {}",
                "✅".green(),
                receipt.vote.label.bold(),
                receipt.vote.tally
            );
        }

        Commands::Me => {
            let voter = api_client.me().await?;
            println!("Voter:     {}", voter.id);
            println!("Role:      {}", voter.role);
            match voter.voted_for {
                Some(option) => println!("Voted for: {}", option),
                None => println!("Voted for: {}", "not yet".yellow()),
            }
        }

        Commands::Audit => {
            let report = api_client.audit().await?;
            println!("{:<14} {:<24} {:>6} {:>9} {:>6}", "Option", "Label", "Tally", "Committed", "Drift");
            println!("{:-<14} {:-<24} {:-<6} {:-<9} {:-<6}", "", "", "", "", "");
            for entry in &report.entries {
                let drift = if entry.drift == 0 {
                    entry.drift.to_string().normal()
                } else {
                    entry.drift.to_string().red().bold()
                };
                println!(
                    "{:<14} {:<24} {:>6} {:>9} {:>6}",
                    truncate(&entry.option_id, 11),
                    truncate(&entry.label, 21),
                    entry.tally,
                    entry.committed_votes,
                    drift
                );
            }
            for vote in &report.dangling {
                println!(
                    "{} voter {} points at removed option {}",
                    "!".yellow(),
                    vote.voter,
                    vote.voted_for
                );
            }
            println!("Total committed votes: {}", report.total_votes);
            if report.consistent {
                println!("{}", "Tallies consistent".green());
            } else {
                println!("{}", "Tally drift detected, reconciliation required".red().bold());
            }
        }

        Commands::Status => {
            let status = api_client.status().await?;
            println!("🗳️ BALLOTBOX Node Status");
            println!("========================");
            println!("Name:          {}", status.name);
            println!("Version:       {}", status.version);
            println!("Uptime:        {}s", status.uptime_secs);
            println!("Options:       {}", status.options);
            println!("Voters:        {}", status.voters);
            println!("Observers:     {}", status.observers);
            println!("Last Event:    #{}", status.last_sequence);
        }
    }

    Ok(())
}
