use std::path::PathBuf;

use clap::{Args, Subcommand};
use uuid::Uuid;

use rds_client::{init_session, DatasetCreateParams, RunOptions, SubmitParams};
use rds_core::models::{RuntimeConfig, RuntimeCreate, RuntimeKind};
use rds_core::DatasiteConfig;

#[derive(Args, Debug)]
pub struct SubmitArgs {
    /// File or folder with the code to run.
    pub code_path: PathBuf,
    /// Dataset to run against.
    #[arg(long)]
    pub dataset: String,
    /// Entrypoint inside the folder (required for folders).
    #[arg(long)]
    pub entrypoint: Option<String>,
    /// Runtime name registered on the host.
    #[arg(long)]
    pub runtime: Option<String>,
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum JobsCommand {
    /// List jobs visible to this identity.
    List,
    Get {
        uid: Uuid,
    },
    Approve {
        uid: Uuid,
    },
    Reject {
        uid: Uuid,
    },
    /// Execute an approved job against the private data.
    Run {
        uid: Uuid,
        /// Return immediately instead of waiting for completion.
        #[arg(long)]
        no_block: bool,
        /// Permit running straight from pending_code_review.
        #[arg(long)]
        force: bool,
    },
    /// Share a finished job's artifacts back to its submitter.
    Share {
        uid: Uuid,
    },
    Delete {
        uid: Uuid,
        /// Also remove the user code when no other job references it.
        #[arg(long)]
        delete_orphaned_usercode: bool,
    },
    /// Print the captured stdout/stderr streams.
    Logs {
        uid: Uuid,
    },
}

#[derive(Subcommand, Debug)]
pub enum DatasetsCommand {
    List,
    /// Publish a dataset from a private and a mock tree.
    Create {
        name: String,
        #[arg(long)]
        private: PathBuf,
        #[arg(long)]
        mock: PathBuf,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        readme: Option<PathBuf>,
    },
    Get {
        name: String,
    },
    Delete {
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum RuntimesCommand {
    List,
    Create {
        name: String,
        #[arg(long, default_value = "python")]
        kind: String,
        /// Docker image to run in (docker runtimes only).
        #[arg(long)]
        image: Option<String>,
    },
}

pub async fn submit(host: &str, config: DatasiteConfig, args: SubmitArgs) -> anyhow::Result<()> {
    let client = init_session(host, config);
    let mut params = SubmitParams::new(args.code_path, args.dataset);
    params.entrypoint = args.entrypoint;
    params.runtime_name = args.runtime;
    params.name = args.name;
    let job = client.job().submit(params).await?;
    println!("{} {}", job.uid, job.status.as_str());
    Ok(())
}

pub async fn jobs(host: &str, config: DatasiteConfig, command: JobsCommand) -> anyhow::Result<()> {
    let client = init_session(host, config);
    let jobs = client.job();
    match command {
        JobsCommand::List => {
            for job in jobs.get_all().await? {
                println!(
                    "{}  {:<20}  {}  {}",
                    job.uid,
                    job.status.as_str(),
                    job.dataset_name,
                    job.name.unwrap_or_default()
                );
            }
        }
        JobsCommand::Get { uid } => {
            let job = jobs.get(uid).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        JobsCommand::Approve { uid } => {
            let job = jobs.get(uid).await?;
            let job = jobs.approve(&job).await?;
            println!("{} {}", job.uid, job.status.as_str());
        }
        JobsCommand::Reject { uid } => {
            let job = jobs.get(uid).await?;
            let job = jobs.reject(&job).await?;
            println!("{} {}", job.uid, job.status.as_str());
        }
        JobsCommand::Run {
            uid,
            no_block,
            force,
        } => {
            let job = jobs.get(uid).await?;
            let options = RunOptions {
                blocking: !no_block,
                force,
                ..Default::default()
            };
            let outcome = jobs.run_private(&job, options).await?;
            println!("{} {}", outcome.job.uid, outcome.job.status.as_str());
        }
        JobsCommand::Share { uid } => {
            let job = jobs.get(uid).await?;
            let (path, job) = jobs.share_results(&job).await?;
            println!("{} shared at {}", job.uid, path.display());
        }
        JobsCommand::Delete {
            uid,
            delete_orphaned_usercode,
        } => {
            let deleted = jobs.delete(uid, delete_orphaned_usercode).await?;
            println!("{}", if deleted { "deleted" } else { "not found" });
        }
        JobsCommand::Logs { uid } => {
            let job = jobs.get(uid).await?;
            let (stdout, stderr) = jobs.get_logs(&job).await?;
            print!("{stdout}");
            eprint!("{stderr}");
        }
    }
    Ok(())
}

pub async fn datasets(
    host: &str,
    config: DatasiteConfig,
    command: DatasetsCommand,
) -> anyhow::Result<()> {
    let client = init_session(host, config);
    let datasets = client.dataset();
    match command {
        DatasetsCommand::List => {
            for dataset in datasets.get_all().await? {
                println!("{}  {}  {}", dataset.uid, dataset.name, dataset.mock_url);
            }
        }
        DatasetsCommand::Create {
            name,
            private,
            mock,
            summary,
            readme,
        } => {
            let dataset = datasets
                .create(DatasetCreateParams {
                    name,
                    private_path: private,
                    mock_path: mock,
                    summary,
                    description_path: readme,
                    tags: Vec::new(),
                    runtime_id: None,
                })
                .await?;
            println!("{} {}", dataset.uid, dataset.name);
        }
        DatasetsCommand::Get { name } => {
            let dataset = datasets.get_by_name(&name).await?;
            println!("{}", serde_json::to_string_pretty(&dataset)?);
        }
        DatasetsCommand::Delete { name } => {
            let deleted = datasets.delete(&name).await?;
            println!("{}", if deleted { "deleted" } else { "not found" });
        }
    }
    Ok(())
}

pub async fn runtimes(
    host: &str,
    config: DatasiteConfig,
    command: RuntimesCommand,
) -> anyhow::Result<()> {
    let client = init_session(host, config);
    let runtimes = client.runtime();
    match command {
        RuntimesCommand::List => {
            for runtime in runtimes.get_all().await? {
                println!("{}  {:<10}  {}", runtime.uid, runtime.kind.as_str(), runtime.name);
            }
        }
        RuntimesCommand::Create { name, kind, image } => {
            let kind = match kind.as_str() {
                "python" => RuntimeKind::Python,
                "docker" => RuntimeKind::Docker,
                "kubernetes" => RuntimeKind::Kubernetes,
                other => anyhow::bail!("unknown runtime kind: {other}"),
            };
            let config_field = match (kind, image) {
                (RuntimeKind::Docker, Some(image)) => Some(RuntimeConfig::Docker(
                    rds_core::models::DockerRuntimeConfig {
                        image_name: Some(image),
                        ..Default::default()
                    },
                )),
                _ => None,
            };
            let runtime = runtimes
                .create(RuntimeCreate {
                    name: Some(name),
                    kind: Some(kind),
                    config: config_field,
                    ..Default::default()
                })
                .await?;
            println!("{} {}", runtime.uid, runtime.name);
        }
    }
    Ok(())
}
