//! docker-compose invocation
//!
//! Builds the compose command line and environment for start/stop/pull.
//! Failures surface immediately as [`Error::Compose`]; nothing is retried.

use std::collections::BTreeMap;

use crate::config::services::REGISTRY;
use crate::config::settings::{DbAnnexType, Settings};
use crate::domain::VersionMap;
use crate::error::{Error, Result};
use crate::infra::command::{ProcessRequest, ProcessRunner};

pub struct ComposeRunner<'a> {
    runner: &'a dyn ProcessRunner,
    settings: &'a Settings,
    versions: &'a VersionMap,
}

impl<'a> ComposeRunner<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        settings: &'a Settings,
        versions: &'a VersionMap,
    ) -> Self {
        Self {
            runner,
            settings,
            versions,
        }
    }

    /// Bring the deployment up, detached
    pub async fn start(&self) -> Result<()> {
        self.invoke(&["up", "-d"], true).await
    }

    /// Take the deployment down, dropping named volumes unless
    /// `persist_data` is set
    pub async fn stop(&self) -> Result<()> {
        let mut args = vec!["down"];
        if !self.settings.persist_data {
            args.push("--volumes");
        }
        self.invoke(&args, true).await
    }

    /// Pull images for all services.
    ///
    /// Always uses the primary compose file set: pulling is annex-agnostic.
    pub async fn pull(&self) -> Result<()> {
        self.invoke(&["pull"], false).await
    }

    async fn invoke(&self, args: &[&str], annex_aware: bool) -> Result<()> {
        let mut argv: Vec<String> =
            vec!["--project-name".to_string(), self.settings.project_name.clone()];
        if annex_aware && self.settings.db_annex_type == DbAnnexType::Fake {
            // compose searches parent directories for its file like git
            // does, so the overlay set must name both files explicitly
            argv.extend([
                "-f".to_string(),
                "../docker-compose.yml".to_string(),
                "-f".to_string(),
                "../docker-compose-annex.yml".to_string(),
            ]);
        }
        argv.extend(args.iter().map(|a| a.to_string()));

        let request =
            ProcessRequest::new("docker-compose", argv).envs(self.environment()?);
        let output = self.runner.run(request).await?;
        if !output.success() {
            return Err(Error::Compose { code: output.code });
        }
        Ok(())
    }

    fn environment(&self) -> Result<BTreeMap<String, String>> {
        let v = self.versions;
        let mut env = BTreeMap::new();
        env.insert("MONTAGU_REGISTRY".to_string(), REGISTRY.to_string());
        env.insert("MONTAGU_PORT".to_string(), self.settings.port.to_string());
        env.insert(
            "MONTAGU_HOSTNAME".to_string(),
            self.settings.hostname.clone(),
        );

        let versioned = [
            ("MONTAGU_API_VERSION", "api"),
            ("MONTAGU_REPORTING_API_VERSION", "reporting-api"),
            ("MONTAGU_DB_VERSION", "db"),
            ("MONTAGU_CONTRIB_PORTAL_VERSION", "contrib-portal"),
            ("MONTAGU_ADMIN_PORTAL_VERSION", "admin-portal"),
            ("MONTAGU_REPORT_PORTAL_VERSION", "report-portal"),
            ("MONTAGU_PROXY_VERSION", "proxy"),
            ("MONTAGU_ORDERLY_VERSION", "orderly"),
            ("MONTAGU_SHINY_VERSION", "shiny"),
        ];
        for (var, service) in versioned {
            env.insert(var.to_string(), v.require(service)?.to_string());
        }
        Ok(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::services::SUBMODULES;
    use crate::infra::command::testing::RecordingRunner;

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

    fn versions() -> VersionMap {
        let mut map = VersionMap::new();
        for name in SUBMODULES {
            map.set(name, "abc1234");
        }
        map
    }

    #[tokio::test]
    async fn test_start_runs_up_detached() {
        let runner = RecordingRunner::new();
        let versions = versions();
        let settings = settings();
        ComposeRunner::new(&runner, &settings, &versions)
            .start()
            .await
            .unwrap();

        let calls = runner.calls();
        assert_eq!(
            calls[0].command_line(),
            "docker-compose --project-name montagu up -d"
        );
        assert_eq!(
            calls[0].env.get("MONTAGU_PORT").map(String::as_str),
            Some("443")
        );
        assert_eq!(
            calls[0].env.get("MONTAGU_API_VERSION").map(String::as_str),
            Some("abc1234")
        );
        assert_eq!(
            calls[0].env.get("MONTAGU_REGISTRY").map(String::as_str),
            Some(REGISTRY)
        );
    }

    #[tokio::test]
    async fn test_stop_drops_volumes_by_default() {
        let runner = RecordingRunner::new();
        let versions = versions();
        let settings = settings();
        ComposeRunner::new(&runner, &settings, &versions)
            .stop()
            .await
            .unwrap();
        assert_eq!(
            runner.command_lines()[0],
            "docker-compose --project-name montagu down --volumes"
        );
    }

    #[tokio::test]
    async fn test_stop_keeps_volumes_when_persisting() {
        let runner = RecordingRunner::new();
        let versions = versions();
        let mut settings = settings();
        settings.persist_data = true;
        ComposeRunner::new(&runner, &settings, &versions)
            .stop()
            .await
            .unwrap();
        assert_eq!(
            runner.command_lines()[0],
            "docker-compose --project-name montagu down"
        );
    }

    #[tokio::test]
    async fn test_fake_annex_adds_overlay_to_start_but_not_pull() {
        let runner = RecordingRunner::new();
        let versions = versions();
        let mut settings = settings();
        settings.db_annex_type = DbAnnexType::Fake;

        let compose = ComposeRunner::new(&runner, &settings, &versions);
        compose.start().await.unwrap();
        compose.pull().await.unwrap();

        let lines = runner.command_lines();
        assert_eq!(
            lines[0],
            "docker-compose --project-name montagu \
             -f ../docker-compose.yml -f ../docker-compose-annex.yml up -d"
        );
        assert_eq!(lines[1], "docker-compose --project-name montagu pull");
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_compose_error() {
        let runner = RecordingRunner::new();
        runner.push_output(7, "");
        let versions = versions();
        let settings = settings();
        let err = ComposeRunner::new(&runner, &settings, &versions)
            .pull()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Compose { code: 7 }));
    }
}
