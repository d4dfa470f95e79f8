//! Backup and restore
//!
//! Thin control layer over the external backup scripts. Setup renders a
//! config artifact to a fixed system path and is performed at most once
//! per host; the scripts themselves do the heavy lifting.

use tera::{Context, Tera};
use tracing::info;

use crate::config::services::{DB_CONTAINER, ORDERLY_VOLUME};
use crate::config::settings::Settings;
use crate::error::{Error, Result};
use crate::infra::command::{run_checked, ProcessRequest, ProcessRunner};
use crate::infra::secrets::SecretStore;
use crate::services::database;

const CONFIG_TEMPLATE: &str = "../backup/configs/production/config.json";
const CONFIG_DIR: &str = "/etc/montagu/backup";
const CONFIG_DEST: &str = "/etc/montagu/backup/config.json";

pub struct BackupController<'a> {
    runner: &'a dyn ProcessRunner,
    secrets: &'a dyn SecretStore,
    settings: &'a Settings,
}

impl<'a> BackupController<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        secrets: &'a dyn SecretStore,
        settings: &'a Settings,
    ) -> Self {
        Self {
            runner,
            secrets,
            settings,
        }
    }

    /// Probe the external readiness script; exit code 1 means the backup
    /// service has not been configured on this host yet
    pub async fn needs_setup(&self) -> Result<bool> {
        let output = self
            .runner
            .run(ProcessRequest::new("../backup/needs-setup.sh", Vec::<String>::new()).quiet())
            .await?;
        Ok(output.code == 1)
    }

    /// Configure and install the backup service if it isn't already.
    ///
    /// Idempotent: when `needs_setup` reports ready, nothing runs.
    pub async fn setup(&self) -> Result<()> {
        if self.needs_setup().await? {
            info!("configuring and installing backup service");
            self.configure().await?;
            run_checked(
                self.runner,
                ProcessRequest::new("../backup/setup.sh", Vec::<String>::new()),
            )
            .await?;
        }
        Ok(())
    }

    /// Take a backup now.
    ///
    /// Safe against a running system: pg_dump runs at serializable
    /// isolation, so the dump only sees transactions committed before it
    /// started.
    pub async fn backup(&self) -> Result<()> {
        info!("performing backup");
        self.setup().await?;
        run_checked(
            self.runner,
            ProcessRequest::new("../backup/backup.py", Vec::<String>::new()),
        )
        .await?;
        Ok(())
    }

    /// Install the recurring backup schedule
    pub async fn schedule(&self) -> Result<()> {
        info!("scheduling backup");
        self.setup().await?;
        run_checked(
            self.runner,
            ProcessRequest::new("../backup/schedule.py", ["--no-immediate-backup"]),
        )
        .await?;
        Ok(())
    }

    /// Restore from the remote backup.
    ///
    /// Restore happens out-of-band from normal user provisioning, so the
    /// target database users are created first; afterwards the
    /// last-restore timestamp is updated for staleness checks elsewhere.
    pub async fn restore(&self) -> Result<()> {
        info!("restoring from remote backup");
        self.setup().await?;
        database::prepare_for_import(self.runner, self.secrets, self.settings).await?;
        run_checked(
            self.runner,
            ProcessRequest::new("../backup/restore.py", Vec::<String>::new()),
        )
        .await?;
        database::last_restore_update().await?;
        Ok(())
    }

    async fn configure(&self) -> Result<()> {
        // a missing template is a fatal configuration error; there is no
        // sensible default to fall back to
        let template =
            tokio::fs::read_to_string(CONFIG_TEMPLATE)
                .await
                .map_err(|e| Error::Config {
                    path: CONFIG_TEMPLATE.to_string(),
                    detail: e.to_string(),
                })?;
        let rendered = render_config(&template, self.settings)?;
        tokio::fs::create_dir_all(CONFIG_DIR).await?;
        tokio::fs::write(CONFIG_DEST, rendered).await?;
        Ok(())
    }
}

/// Render the backup config template with this deployment's target
/// bucket and container/volume names
fn render_config(template: &str, settings: &Settings) -> Result<String> {
    let mut context = Context::new();
    context.insert("s3_bucket", &settings.backup_bucket);
    context.insert("db_container", DB_CONTAINER);
    context.insert("orderly_volume", ORDERLY_VOLUME);
    Ok(Tera::one_off(template, &context, false)?)
}
