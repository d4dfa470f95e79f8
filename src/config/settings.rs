//! Deployment settings
//!
//! Loaded once per invocation from a JSON file, with env-var overrides
//! for the values that differ between hosts. Immutable afterwards.

use serde::Deserialize;
use std::env;
use std::path::Path;

use crate::error::{Error, Result};

/// Where the initial Orderly/database data comes from on a fresh deploy
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    #[default]
    Minimal,
    Restore,
    Legacy,
}

/// Database annex backing mode
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DbAnnexType {
    #[default]
    Real,
    Fake,
}

/// Per-deployment parameters
///
/// One instance describes one target (production, uat, a dev box).
#[derive(Clone, Debug, Deserialize)]
pub struct Settings {
    /// Port the proxy exposes
    pub port: u16,
    /// Public hostname of the deployment
    pub hostname: String,
    /// docker-compose project name (container name prefix)
    #[serde(default = "default_project_name")]
    pub project_name: String,
    /// S3 bucket backups are written to
    pub backup_bucket: String,
    /// Vault password group; None means dev-style default passwords
    #[serde(default)]
    pub password_group: Option<String>,
    #[serde(default)]
    pub initial_data_source: DataSource,
    #[serde(default)]
    pub db_annex_type: DbAnnexType,
    /// Keep named volumes when the deployment is stopped
    #[serde(default)]
    pub persist_data: bool,
    /// Clone the remote report store instead of initialising an empty one
    #[serde(default)]
    pub clone_reports: bool,
    /// Slack channel for deploy notifications; None disables them
    #[serde(default)]
    pub notify_channel: Option<String>,
    #[serde(default = "default_vault_addr")]
    pub vault_addr: String,
}

fn default_project_name() -> String {
    "montagu".to_string()
}

fn default_vault_addr() -> String {
    "https://support.montagu.dide.ic.ac.uk:8200".to_string()
}

impl Settings {
    /// Load settings from a JSON file, then apply env-var overrides
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        let mut settings: Settings =
            serde_json::from_str(&text).map_err(|e| Error::Config {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(port) = env::var("MONTAGU_PORT").ok().and_then(|v| v.parse().ok()) {
            self.port = port;
        }
        if let Ok(hostname) = env::var("MONTAGU_HOSTNAME") {
            self.hostname = hostname;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn minimal_json() -> &'static str {
        r#"{
            "port": 443,
            "hostname": "montagu.example.com",
            "backup_bucket": "montagu-backups"
        }"#
    }

    #[test]
    fn test_load_applies_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(minimal_json().as_bytes()).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.port, 443);
        assert_eq!(settings.project_name, "montagu");
        assert_eq!(settings.initial_data_source, DataSource::Minimal);
        assert_eq!(settings.db_annex_type, DbAnnexType::Real);
        assert!(!settings.persist_data);
        assert!(!settings.clone_reports);
        assert!(settings.notify_channel.is_none());
    }

    #[test]
    fn test_load_parses_explicit_values() {
        let json = r#"{
            "port": 8080,
            "hostname": "uat.montagu.example.com",
            "project_name": "montagu_uat",
            "backup_bucket": "montagu-uat-backups",
            "password_group": "uat",
            "initial_data_source": "restore",
            "db_annex_type": "fake",
            "persist_data": true,
            "clone_reports": true,
            "notify_channel": "montagu-deploys"
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.initial_data_source, DataSource::Restore);
        assert_eq!(settings.db_annex_type, DbAnnexType::Fake);
        assert!(settings.persist_data);
        assert_eq!(settings.notify_channel.as_deref(), Some("montagu-deploys"));
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let result = Settings::load(Path::new("/nonexistent/settings.json"));
        assert!(matches!(result, Err(Error::Config { .. })));
    }
}
