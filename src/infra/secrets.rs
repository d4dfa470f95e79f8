//! Secret store access
//!
//! Secrets (webhook paths, robot SSH keys, database passwords) live in
//! Vault; this wraps the `vault` CLI rather than speaking its HTTP API.

use async_trait::async_trait;
use std::path::Path;

use crate::error::{Error, Result};
use crate::infra::command::{ProcessRequest, ProcessRunner};

/// Read-only secret lookup
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get_secret(&self, name: &str) -> Result<String>;

    /// Fetch a secret and write it to `dest`
    async fn save_secret(&self, name: &str, dest: &Path) -> Result<()> {
        let value = self.get_secret(name).await?;
        tokio::fs::write(dest, value).await?;
        Ok(())
    }
}

/// Secret store backed by the `vault` CLI
pub struct VaultClient<'a> {
    runner: &'a dyn ProcessRunner,
    addr: String,
}

impl<'a> VaultClient<'a> {
    pub fn new(runner: &'a dyn ProcessRunner, addr: &str) -> Self {
        Self {
            runner,
            addr: addr.to_string(),
        }
    }
}

#[async_trait]
impl SecretStore for VaultClient<'_> {
    async fn get_secret(&self, name: &str) -> Result<String> {
        let path = format!("secret/{}", name);
        let request = ProcessRequest::new("vault", ["read", "-field=value", path.as_str()])
            .env("VAULT_ADDR", &self.addr)
            .capture();
        let output = self.runner.run(request).await.map_err(|e| Error::Secret {
            name: name.to_string(),
            detail: e.to_string(),
        })?;
        if !output.success() {
            return Err(Error::Secret {
                name: name.to_string(),
                detail: format!("vault exited with status {}", output.code),
            });
        }
        Ok(output.stdout.trim().to_string())
    }
}
