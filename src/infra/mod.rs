//! External-process and secret-store plumbing

pub mod command;
pub mod secrets;

pub use command::{run_checked, OutputMode, ProcessOutput, ProcessRequest, ProcessRunner, SystemRunner};
pub use secrets::{SecretStore, VaultClient};
