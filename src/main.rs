//! montagu-deploy CLI
//!
//! One subcommand per operational task; every command shells out to
//! docker, docker-compose, git and the backup scripts and propagates the
//! first failing exit code.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::exit;
use tracing::error;

use montagu_deploy::config::Settings;
use montagu_deploy::domain::ReleaseTag;
use montagu_deploy::infra::{SystemRunner, VaultClient};
use montagu_deploy::services::backup::BackupController;
use montagu_deploy::services::integration::IntegrationTestRunner;
use montagu_deploy::services::release::{self, ImageTagger};
use montagu_deploy::services::{deploy, versions};
use montagu_deploy::Result;

#[derive(Parser)]
#[command(name = "montagu-deploy")]
#[command(about = "Deploy and operate the Montagu platform")]
#[command(version)]
struct Cli {
    /// Path to the deployment settings file
    #[arg(
        long,
        global = true,
        env = "MONTAGU_SETTINGS",
        default_value = "montagu-settings.json"
    )]
    settings: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy the platform at the currently pinned versions
    Deploy,

    /// Take a backup now
    Backup,

    /// Install the recurring backup schedule
    ScheduleBackup,

    /// Restore from the remote backup
    Restore,

    /// Tag release images and push them to the internal registry
    Tag {
        /// Release version (vX.Y.Z or vX.Y.Z-RCn)
        version: String,

        /// Also publish the images to docker hub
        #[arg(long)]
        publish: bool,
    },

    /// Publish already-tagged release images to docker hub
    Publish {
        /// Release version (vX.Y.Z or vX.Y.Z-RCn)
        version: String,
    },

    /// Show the latest release tag and whether the tree is clean
    ReleaseStatus,

    /// Run integration tests against a running deployment
    RunTests {
        /// Required: confirms the tests may destroy or change data
        #[arg(long)]
        run_tests: bool,

        /// Restart the docker daemon first, to simulate recovery from a
        /// system reboot
        #[arg(long)]
        simulate_restart: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("{}", e);
        exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let runner = SystemRunner;
    let root = std::env::current_dir()?;

    match cli.command {
        Commands::Deploy => {
            let settings = Settings::load(&cli.settings)?;
            let vault = VaultClient::new(&runner, &settings.vault_addr);
            deploy::deploy(&runner, &vault, &settings, &root).await
        }
        Commands::Backup => {
            let settings = Settings::load(&cli.settings)?;
            let vault = VaultClient::new(&runner, &settings.vault_addr);
            BackupController::new(&runner, &vault, &settings).backup().await
        }
        Commands::ScheduleBackup => {
            let settings = Settings::load(&cli.settings)?;
            let vault = VaultClient::new(&runner, &settings.vault_addr);
            BackupController::new(&runner, &vault, &settings).schedule().await
        }
        Commands::Restore => {
            let settings = Settings::load(&cli.settings)?;
            let vault = VaultClient::new(&runner, &settings.vault_addr);
            BackupController::new(&runner, &vault, &settings).restore().await
        }
        Commands::Tag { version, publish } => {
            // validated before any network or subprocess call
            let tag = ReleaseTag::parse(&version)?;
            let tagger = ImageTagger::new(&runner, &root);
            tagger.tag(&tag).await?;
            if publish {
                tagger.publish(&tag).await?;
            }
            Ok(())
        }
        Commands::Publish { version } => {
            let tag = ReleaseTag::parse(&version)?;
            ImageTagger::new(&runner, &root).publish(&tag).await
        }
        Commands::ReleaseStatus => {
            if !release::git_is_clean(&runner, &root).await? {
                println!("Git status reports as not clean");
            }
            match release::latest_release_tag(&runner, &root).await? {
                Some(tag) => println!("The latest release was: {}", tag),
                None => println!("No release tags found"),
            }
            Ok(())
        }
        Commands::RunTests {
            run_tests,
            simulate_restart,
        } => {
            if !run_tests {
                eprintln!(
                    "Warning - these tests should not be run in a real environment. \
                     They will destroy or change data."
                );
                eprintln!("To run the tests, pass --run-tests");
                exit(-1);
            }
            let versions = versions::resolve(&runner, &root).await?;
            IntegrationTestRunner::new(&runner, &versions, root.clone())
                .run(simulate_restart)
                .await
        }
    }
}
