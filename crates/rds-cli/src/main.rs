mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rds_core::DatasiteConfig;

/// Remote data-science job control plane.
#[derive(Parser, Debug)]
#[command(name = "rds", version)]
struct Cli {
    /// Path to the datasite config file (JSON with email + data_dir).
    #[arg(long, env = "RDS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Datasite email; overrides the config file.
    #[arg(long, env = "RDS_EMAIL", global = true)]
    email: Option<String>,

    /// Workspace root; overrides the config file.
    #[arg(long, env = "RDS_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Host datasite to talk to (defaults to our own email).
    #[arg(long, env = "RDS_HOST", global = true)]
    host: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the DO-side server against the mailbox.
    Serve,
    /// Check the host server's health endpoint.
    Health,
    /// Submit user code against a dataset.
    Submit(commands::SubmitArgs),
    /// Manage jobs.
    Jobs {
        #[command(subcommand)]
        command: commands::JobsCommand,
    },
    /// Manage datasets.
    Datasets {
        #[command(subcommand)]
        command: commands::DatasetsCommand,
    },
    /// Manage runtimes.
    Runtimes {
        #[command(subcommand)]
        command: commands::RuntimesCommand,
    },
}

impl Cli {
    fn datasite_config(&self) -> anyhow::Result<DatasiteConfig> {
        let mut config = match &self.config {
            Some(path) => DatasiteConfig::load(path)?,
            None => {
                let (Some(email), Some(data_dir)) = (&self.email, &self.data_dir) else {
                    anyhow::bail!(
                        "pass --config, or both --email and --data-dir (RDS_EMAIL / RDS_DATA_DIR)"
                    );
                };
                DatasiteConfig::new(email.clone(), data_dir.clone())
            }
        };
        if let Some(email) = &self.email {
            config.email = email.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = data_dir.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.datasite_config()?;
    let host = cli.host.clone().unwrap_or_else(|| config.email.clone());

    match cli.command {
        Command::Serve => {
            rds_server::serve(config).await?;
            Ok(())
        }
        Command::Health => {
            let client = rds_client::init_session(&host, config);
            let health = client.health().await?;
            println!("{} {}", health.app_name, health.version);
            Ok(())
        }
        Command::Submit(args) => commands::submit(&host, config, args).await,
        Command::Jobs { command } => commands::jobs(&host, config, command).await,
        Command::Datasets { command } => commands::datasets(&host, config, command).await,
        Command::Runtimes { command } => commands::runtimes(&host, config, command).await,
    }
}
