//! Database helpers
//!
//! User provisioning normally happens as part of service configuration
//! after the deployment is up; a restore bypasses that path, so the
//! roles the dump refers to must be created before the import runs.

use chrono::Utc;
use tracing::{debug, info};

use crate::config::services::DB_CONTAINER;
use crate::config::settings::Settings;
use crate::error::Result;
use crate::infra::command::{run_checked, ProcessRequest, ProcessRunner};
use crate::infra::secrets::SecretStore;

/// Roles referenced by the backup dump
const IMPORT_USERS: &[&str] = &["api", "import", "orderly", "readonly"];

/// Timestamp record consumed by staleness checks elsewhere
const LAST_RESTORE_PATH: &str = "/etc/montagu/last_restore";

/// Ensure the restore-target users exist with their configured passwords
pub async fn prepare_for_import(
    runner: &dyn ProcessRunner,
    secrets: &dyn SecretStore,
    settings: &Settings,
) -> Result<()> {
    info!("ensuring database users exist before import");
    for user in IMPORT_USERS {
        let password =
            user_password(secrets, settings.password_group.as_deref(), user).await?;
        ensure_role(runner, user, &password).await?;
    }
    Ok(())
}

/// Password for a platform database user.
///
/// Production groups keep passwords in the secret store; without a
/// group (dev deployments) the password is just the user name.
pub async fn user_password(
    secrets: &dyn SecretStore,
    password_group: Option<&str>,
    user: &str,
) -> Result<String> {
    match password_group {
        Some(group) => {
            secrets
                .get_secret(&format!("database/{}/users/{}", group, user))
                .await
        }
        None => {
            debug!(user = %user, "no password group set, using dev password");
            Ok(user.to_string())
        }
    }
}

async fn ensure_role(runner: &dyn ProcessRunner, user: &str, password: &str) -> Result<()> {
    let probe = ProcessRequest::new(
        "docker",
        [
            "exec",
            DB_CONTAINER,
            "psql",
            "-U",
            "vimc",
            "-d",
            "montagu",
            "-tAc",
            &format!("SELECT 1 FROM pg_roles WHERE rolname = '{}'", user),
        ],
    )
    .capture();
    let exists = runner.run(probe).await?.stdout.trim() == "1";

    let sql = if exists {
        format!("ALTER ROLE {} WITH LOGIN PASSWORD '{}'", user, password)
    } else {
        format!("CREATE ROLE {} WITH LOGIN PASSWORD '{}'", user, password)
    };
    run_checked(
        runner,
        ProcessRequest::new(
            "docker",
            [
                "exec",
                DB_CONTAINER,
                "psql",
                "-U",
                "vimc",
                "-d",
                "montagu",
                "-c",
                &sql,
            ],
        )
        .quiet(),
    )
    .await?;
    Ok(())
}

/// Record the time of the last successful restore
pub async fn last_restore_update() -> Result<()> {
    tokio::fs::create_dir_all("/etc/montagu").await?;
    tokio::fs::write(LAST_RESTORE_PATH, format!("{}\n", Utc::now().to_rfc3339())).await?;
    Ok(())
}
