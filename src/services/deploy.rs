//! Deploy orchestration
//!
//! The full deploy sequence: pull images, take the old deployment down,
//! bring the new one up, restore data when configured, configure Orderly
//! and send the go signal. Notifications bracket the run but can never
//! mask its result.

use std::path::Path;
use tracing::info;

use crate::config::services::ORDERLY_VOLUME;
use crate::config::settings::{DataSource, Settings};
use crate::domain::VersionMap;
use crate::error::Result;
use crate::infra::command::{ProcessRequest, ProcessRunner};
use crate::infra::secrets::SecretStore;
use crate::services::backup::BackupController;
use crate::services::compose::ComposeRunner;
use crate::services::notify::Notifier;
use crate::services::orderly::OrderlyConfigurator;
use crate::services::versions;

/// Deploy the platform at the versions currently pinned in `root`
pub async fn deploy(
    runner: &dyn ProcessRunner,
    secrets: &dyn SecretStore,
    settings: &Settings,
    root: &Path,
) -> Result<()> {
    let versions = versions::resolve(runner, root).await?;
    let mut notifier = Notifier::new(secrets, settings.notify_channel.as_deref()).await;

    notifier
        .post(&format!("Deploying montagu to {}", settings.hostname))
        .await;

    let result = run_deploy(runner, secrets, settings, root, &versions).await;
    match &result {
        Ok(()) => {
            notifier
                .post(&format!("Deployed montagu to {}", settings.hostname))
                .await
        }
        Err(e) => {
            notifier
                .post(&format!(
                    "Deploy to {} failed: {}",
                    settings.hostname, e
                ))
                .await
        }
    }
    result
}

async fn run_deploy(
    runner: &dyn ProcessRunner,
    secrets: &dyn SecretStore,
    settings: &Settings,
    root: &Path,
    versions: &VersionMap,
) -> Result<()> {
    let compose = ComposeRunner::new(runner, settings, versions);

    info!(hostname = %settings.hostname, "deploying montagu");
    compose.pull().await?;
    compose.stop().await?;

    // decided before `up` creates the volume as a side effect
    let initialise_volume = !orderly_volume_exists(runner).await?;

    compose.start().await?;

    if settings.initial_data_source == DataSource::Restore {
        BackupController::new(runner, secrets, settings)
            .restore()
            .await?;
    }

    OrderlyConfigurator::new(runner, secrets, settings, root.join("orderly"))
        .configure(initialise_volume)
        .await?;

    info!("deploy complete");
    Ok(())
}

async fn orderly_volume_exists(runner: &dyn ProcessRunner) -> Result<bool> {
    let output = runner
        .run(ProcessRequest::new("docker", ["volume", "inspect", ORDERLY_VOLUME]).quiet())
        .await?;
    Ok(output.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::command::testing::RecordingRunner;
    use crate::infra::secrets::testing::FakeSecrets;

    fn settings() -> Settings {
        serde_json::from_str(
            r#"{
                "port": 443,
                "hostname": "montagu.example.com",
                "backup_bucket": "montagu-backups"
            }"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_deploy_sequences_all_stages() {
        let runner = RecordingRunner::new();
        let secrets = FakeSecrets::new();
        let settings = settings();
        let root = tempfile::tempdir().unwrap();

        // version resolution: ten submodules
        for _ in 0..10 {
            runner.push_output(0, "abc1234\n");
        }
        // pull, down
        runner.push_output(0, "");
        runner.push_output(0, "");
        // volume does not exist yet
        runner.push_output(1, "");

        deploy(&runner, &secrets, &settings, root.path())
            .await
            .unwrap();

        let lines = runner.command_lines();
        let compose_pull = lines
            .iter()
            .position(|l| l == "docker-compose --project-name montagu pull")
            .unwrap();
        let compose_down = lines
            .iter()
            .position(|l| l == "docker-compose --project-name montagu down --volumes")
            .unwrap();
        let inspect = lines
            .iter()
            .position(|l| l == "docker volume inspect orderly_volume")
            .unwrap();
        let compose_up = lines
            .iter()
            .position(|l| l == "docker-compose --project-name montagu up -d")
            .unwrap();
        let init = lines
            .iter()
            .position(|l| l.contains("orderly_init"))
            .unwrap();
        let go = lines
            .iter()
            .position(|l| l.ends_with("touch /orderly_go"))
            .unwrap();

        assert!(compose_pull < compose_down);
        assert!(compose_down < inspect);
        assert!(inspect < compose_up);
        assert!(compose_up < init);
        assert!(init < go);
    }

    #[tokio::test]
    async fn test_existing_volume_is_not_reinitialised() {
        let runner = RecordingRunner::new();
        let secrets = FakeSecrets::new();
        let mut settings = settings();
        settings.persist_data = true;
        let root = tempfile::tempdir().unwrap();

        for _ in 0..10 {
            runner.push_output(0, "abc1234\n");
        }
        runner.push_output(0, "");
        runner.push_output(0, "");
        // volume already exists
        runner.push_output(0, "");

        deploy(&runner, &secrets, &settings, root.path())
            .await
            .unwrap();

        let lines = runner.command_lines();
        assert!(lines.iter().any(|l| l == "docker-compose --project-name montagu down"));
        assert!(lines.iter().all(|l| !l.contains("orderly_init")));
    }

    #[tokio::test]
    async fn test_compose_failure_propagates() {
        let runner = RecordingRunner::new();
        let secrets = FakeSecrets::new();
        let settings = settings();
        let root = tempfile::tempdir().unwrap();

        for _ in 0..10 {
            runner.push_output(0, "abc1234\n");
        }
        // pull fails
        runner.push_output(18, "");

        let err = deploy(&runner, &secrets, &settings, root.path())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 18);
    }
}
