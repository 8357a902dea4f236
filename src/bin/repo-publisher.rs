//! repo-publisher CLI
//!
//! Publishes one package to the repository service and waits until it is
//! processed. Prints `true` on success and `false` on failure.

use anyhow::{Context, Result};
use clap::Parser;
use repo_publisher::{
    ConfigLoadOptions, ConfigLoader, PackageConfig, PollConfig, PublishConfig, PublishError,
    PublishOrchestrator, TransportConfig,
};
use secrecy::SecretString;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

const EXIT_INTERRUPTED: i32 = 130;

/// Publish a package to a Linux package repository service
#[derive(Parser)]
#[command(name = "repo-publisher")]
#[command(version)]
#[command(about = "Publish a package to a Linux package repository service", long_about = None)]
struct Cli {
    /// Service username
    #[arg(long, env = "REPO_PUBLISH_USERNAME")]
    username: Option<String>,

    /// Service password
    #[arg(long, env = "REPO_PUBLISH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Repository server host
    #[arg(long, env = "REPO_PUBLISH_SERVER")]
    server: Option<String>,

    /// Target repository id
    #[arg(long, env = "REPO_PUBLISH_REPOSITORY_ID")]
    repository_id: Option<String>,

    /// Artifact to upload
    #[arg(long, env = "REPO_PUBLISH_FILE")]
    file: Option<PathBuf>,

    /// Package name
    #[arg(long, env = "REPO_PUBLISH_PACKAGE_NAME")]
    package_name: Option<String>,

    /// Package version (the Debian revision is appended on registration)
    #[arg(long, env = "REPO_PUBLISH_PACKAGE_VERSION")]
    package_version: Option<String>,

    /// Maximum number of status polls
    #[arg(long, env = "REPO_PUBLISH_MAX_ATTEMPTS")]
    max_attempts: Option<u32>,

    /// Wait before the first status poll, doubled on every poll
    #[arg(long, env = "REPO_PUBLISH_INITIAL_DELAY")]
    initial_delay_secs: Option<u64>,

    /// Disable TLS certificate validation (self-signed servers only)
    #[arg(long, env = "REPO_PUBLISH_INSECURE")]
    insecure: bool,

    /// Configuration file (defaults to ./.repo-publish.yaml when present)
    #[arg(long, env = "REPO_PUBLISH_CONFIG")]
    config: Option<PathBuf>,

    /// Print the publish report as JSON
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line and environment layer of the configuration
    fn overrides(&self) -> PublishConfig {
        PublishConfig {
            server: self.server.clone(),
            repository_id: self.repository_id.clone(),
            username: self.username.clone(),
            package: Some(PackageConfig {
                file: self.file.clone(),
                name: self.package_name.clone(),
                version: self.package_version.clone(),
            }),
            poll: Some(PollConfig {
                max_attempts: self.max_attempts,
                initial_delay_secs: self.initial_delay_secs,
            }),
            transport: Some(TransportConfig {
                accept_invalid_certs: self.insecure.then_some(true),
                timeout_secs: None,
            }),
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = tokio::select! {
        result = run(cli) => match result {
            Ok(()) => 0,
            Err(e) => {
                println!("false");
                report_error(&e);
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\nInterrupted");
            println!("false");
            EXIT_INTERRUPTED
        }
    };

    process::exit(exit_code);
}

fn report_error(error: &anyhow::Error) {
    eprintln!("\nError: {:#}", error);

    if let Some(publish_error) = error.downcast_ref::<PublishError>() {
        eprintln!("  code: {}", publish_error.code());
        if let Some(phase) = publish_error.phase() {
            eprintln!("  phase: {}", phase);
        }
        for action in publish_error.suggested_actions() {
            eprintln!("  - {}", action);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let env = std::env::vars().collect();
    let project_path = std::env::current_dir().context("Failed to read working directory")?;

    let file_config = ConfigLoader::load(&ConfigLoadOptions {
        config_path: cli.config.clone(),
        project_path,
        env,
    })
    .await?;
    let config = file_config.merge(cli.overrides());

    let password = cli.password.clone().unwrap_or_default();
    let destination = config.destination(SecretString::new(password.into()))?;
    let package = config.package()?;

    let orchestrator = PublishOrchestrator::new(&destination, &config.transport_options())?
        .with_poll_policy(config.poll_policy()?);

    let report = orchestrator.publish(&package).await?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize report")?
        );
    } else {
        println!("{}", report.success);
    }

    Ok(())
}
