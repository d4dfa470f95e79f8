//! Montagu deployment tooling
//!
//! Operational glue for the Montagu multi-container platform: wraps
//! docker-compose, git, ssh-keyscan and the external backup scripts to
//! deploy, back up, restore, tag releases and run integration tests.

pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;

pub use error::{Error, Result};
