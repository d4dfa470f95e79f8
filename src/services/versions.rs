//! Submodule version resolution
//!
//! Each platform service is pinned by a git submodule; the short commit
//! hash of the submodule's HEAD is the image tag the deployment runs.

use std::path::Path;

use crate::config::services::SUBMODULES;
use crate::domain::VersionMap;
use crate::error::{Error, Result};
use crate::infra::command::{ProcessRequest, ProcessRunner};

/// Resolve the pinned version of every submodule under `<root>/submodules`.
///
/// Read-only; resolved once per invocation and passed around by value.
pub async fn resolve(runner: &dyn ProcessRunner, root: &Path) -> Result<VersionMap> {
    let mut map = VersionMap::new();
    for name in SUBMODULES {
        let version = submodule_version(runner, root, name).await?;
        map.set(name, &version);
    }
    Ok(map)
}

async fn submodule_version(
    runner: &dyn ProcessRunner,
    root: &Path,
    name: &str,
) -> Result<String> {
    let path = root.join("submodules").join(name);
    let path = path.display().to_string();
    let request = ProcessRequest::new(
        "git",
        ["-C", path.as_str(), "rev-parse", "--short=7", "HEAD"],
    )
    .capture();

    let output = runner.run(request).await.map_err(|e| Error::Resolution {
        submodule: name.to_string(),
        detail: e.to_string(),
    })?;
    if !output.success() {
        return Err(Error::Resolution {
            submodule: name.to_string(),
            detail: format!("git rev-parse exited with status {}", output.code),
        });
    }
    Ok(output.stdout.trim().to_string())
}
