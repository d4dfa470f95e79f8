//! Orderly container configuration
//!
//! Runs a strict sequence against the freshly-started Orderly container:
//! SSH credentials first (cloning may need them), then the report store,
//! then the environment file, and finally the go signal. Steps are
//! skipped under documented preconditions; any subprocess failure aborts
//! the whole sequence.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::services::ORDERLY_CONTAINER;
use crate::config::settings::{DataSource, Settings};
use crate::error::{Error, Result};
use crate::infra::command::{run_checked, ProcessRequest, ProcessRunner};
use crate::infra::secrets::SecretStore;
use crate::services::database;

const REPORTS_REPO: &str = "git@github.com:vimc/montagu-reports.git";
const GO_SIGNAL: &str = "/orderly_go";

pub struct OrderlyConfigurator<'a> {
    runner: &'a dyn ProcessRunner,
    secrets: &'a dyn SecretStore,
    settings: &'a Settings,
    /// Host-side scratch directory for files copied into the container
    work_dir: PathBuf,
}

impl<'a> OrderlyConfigurator<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        secrets: &'a dyn SecretStore,
        settings: &'a Settings,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            runner,
            secrets,
            settings,
            work_dir,
        }
    }

    /// Configure the container and send the go signal.
    ///
    /// `initialise_volume` is true when the report volume was created
    /// fresh by this deploy.
    pub async fn configure(&self, initialise_volume: bool) -> Result<()> {
        // ssh first: cloning the report store may need the keys
        self.configure_ssh()
            .await
            .map_err(seq("configure orderly ssh"))?;

        // the store initialisers require an empty directory, which a
        // restore would later overwrite anyway
        if initialise_volume && self.settings.initial_data_source != DataSource::Restore {
            info!("setting up orderly store");
            self.initialise_store()
                .await
                .map_err(seq("initialise orderly store"))?;
        }

        self.configure_envir()
            .await
            .map_err(seq("configure orderly environment"))?;

        info!("sending orderly go signal");
        run_checked(
            self.runner,
            ProcessRequest::new("docker", ["exec", ORDERLY_CONTAINER, "touch", GO_SIGNAL]),
        )
        .await
        .map_err(seq("send orderly go signal"))?;
        Ok(())
    }

    async fn configure_ssh(&self) -> Result<()> {
        let needs_ssh = self.settings.clone_reports
            || self.settings.initial_data_source == DataSource::Restore;
        if !needs_ssh {
            return Ok(());
        }

        let ssh = self.work_dir.join(".ssh");
        if !ssh.exists() {
            info!("preparing orderly ssh");
            tokio::fs::create_dir_all(&ssh).await?;
            self.secrets
                .save_secret("vimc-robot/id_rsa.pub", &ssh.join("id_rsa.pub"))
                .await?;
            let key = ssh.join("id_rsa");
            self.secrets.save_secret("vimc-robot/id_rsa", &key).await?;
            restrict_permissions(&key)?;

            let scan = run_checked(
                self.runner,
                ProcessRequest::new("ssh-keyscan", ["github.com"]).capture(),
            )
            .await?;
            tokio::fs::write(ssh.join("known_hosts"), scan.stdout).await?;
        }
        self.docker_cp(&ssh, "/root/.ssh").await
    }

    async fn initialise_store(&self) -> Result<()> {
        let args: Vec<&str> = if self.settings.clone_reports {
            info!("creating orderly store by cloning montagu-reports");
            vec![
                "exec",
                ORDERLY_CONTAINER,
                "git",
                "clone",
                REPORTS_REPO,
                "/orderly",
            ]
        } else {
            info!("creating empty orderly store");
            vec!["exec", ORDERLY_CONTAINER, "/usr/bin/orderly_init", "/orderly"]
        };
        run_checked(self.runner, ProcessRequest::new("docker", args)).await?;
        Ok(())
    }

    async fn configure_envir(&self) -> Result<()> {
        info!("preparing orderly configuration");
        let user = "orderly";
        let password = database::user_password(
            self.secrets,
            self.settings.password_group.as_deref(),
            user,
        )
        .await?;

        let envir = format!(
            "MONTAGU_PASSWORD: {}\nMONTAGU_HOST: db\nMONTAGU_PORT: 5432\nMONTAGU_USER: {}\n",
            password, user
        );
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let dest = self.work_dir.join("orderly_envir.yml");
        tokio::fs::write(&dest, envir).await?;
        self.docker_cp(&dest, "/orderly").await
    }

    async fn docker_cp(&self, source: &Path, dest: &str) -> Result<()> {
        let source = source.display().to_string();
        let target = format!("{}:{}", ORDERLY_CONTAINER, dest);
        run_checked(
            self.runner,
            ProcessRequest::new("docker", ["cp", source.as_str(), target.as_str()]),
        )
        .await?;
        Ok(())
    }
}

fn seq(step: &'static str) -> impl FnOnce(Error) -> Error {
    move |e| Error::Sequence {
        step,
        source: Box::new(e),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
