//! Release image tagging
//!
//! Tags the images that make up a release and pushes them to the
//! internal registry; `publish` re-tags them to the public docker hub
//! organisation. Fail-fast and non-transactional: the first failing
//! image aborts the run and already-pushed tags are left in place.

use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::services::{CONTAINER_REPO_MAP, PUBLIC_ORG, REGISTRY};
use crate::domain::release::{is_release_tag, ReleaseTag};
use crate::error::{Error, Result};
use crate::infra::command::{run_checked, ProcessRequest, ProcessRunner};

pub struct ImageTagger<'a> {
    runner: &'a dyn ProcessRunner,
    /// Root of the montagu checkout (where the release tags live)
    root: PathBuf,
    map: &'a [(&'a str, &'a str)],
}

impl<'a> ImageTagger<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, root: &Path) -> Self {
        Self::with_map(runner, root, CONTAINER_REPO_MAP)
    }

    pub fn with_map(
        runner: &'a dyn ProcessRunner,
        root: &Path,
        map: &'a [(&'a str, &'a str)],
    ) -> Self {
        Self {
            runner,
            root: root.to_path_buf(),
            map,
        }
    }

    /// Pull each image at the commit its submodule was pinned to when
    /// `version` was tagged, then re-tag and push it under `version`
    pub async fn tag(&self, version: &ReleaseTag) -> Result<()> {
        info!(version = %version, "setting image tags");
        for (name, submodule) in self.map {
            info!("  - {}", name);
            let sha = self.submodule_version_at(submodule, version).await?;
            let source = format!("{}/{}:{}", REGISTRY, name, sha);
            let target = format!("{}/{}:{}", REGISTRY, name, version);

            run_checked(
                self.runner,
                ProcessRequest::new("docker", ["pull", source.as_str()]),
            )
            .await?;
            run_checked(
                self.runner,
                ProcessRequest::new("docker", ["tag", source.as_str(), target.as_str()]),
            )
            .await?;
            run_checked(
                self.runner,
                ProcessRequest::new("docker", ["push", target.as_str()]),
            )
            .await?;
        }
        Ok(())
    }

    /// Re-tag each internal release image to the public registry and push
    pub async fn publish(&self, version: &ReleaseTag) -> Result<()> {
        info!(version = %version, "pushing release to docker hub");
        for (name, _) in self.map {
            info!("  - {}", name);
            let source = format!("{}/{}:{}", REGISTRY, name, version);
            let target = format!("{}/{}:{}", PUBLIC_ORG, name, version);

            run_checked(
                self.runner,
                ProcessRequest::new("docker", ["tag", source.as_str(), target.as_str()]),
            )
            .await?;
            run_checked(
                self.runner,
                ProcessRequest::new("docker", ["push", target.as_str()]),
            )
            .await?;
        }
        Ok(())
    }

    /// Short hash the submodule was pinned to in the tagged master commit
    async fn submodule_version_at(
        &self,
        submodule: &str,
        version: &ReleaseTag,
    ) -> Result<String> {
        let rev = format!("{}:submodules/{}", version, submodule);
        let request = ProcessRequest::new("git", ["rev-parse", "--short=7", rev.as_str()])
            .cwd(&self.root)
            .capture();
        let output = self.runner.run(request).await.map_err(|e| Error::Resolution {
            submodule: submodule.to_string(),
            detail: e.to_string(),
        })?;
        if !output.success() {
            return Err(Error::Resolution {
                submodule: submodule.to_string(),
                detail: format!(
                    "git could not resolve {} (exit status {})",
                    rev, output.code
                ),
            });
        }
        Ok(output.stdout.trim().to_string())
    }
}

/// Most recent tag in the checkout matching the release pattern
pub async fn latest_release_tag(
    runner: &dyn ProcessRunner,
    root: &Path,
) -> Result<Option<String>> {
    let output = run_checked(
        runner,
        ProcessRequest::new("git", ["tag"]).cwd(root).capture(),
    )
    .await?;
    let mut tags: Vec<&str> = output
        .stdout
        .lines()
        .filter(|t| is_release_tag(t))
        .collect();
    tags.sort_unstable();
    Ok(tags.last().map(|t| t.to_string()))
}

/// True when `git status -s` reports nothing outstanding
pub async fn git_is_clean(runner: &dyn ProcessRunner, root: &Path) -> Result<bool> {
    let output = run_checked(
        runner,
        ProcessRequest::new("git", ["status", "-s"]).cwd(root).capture(),
    )
    .await?;
    Ok(output.stdout.trim().is_empty())
}
