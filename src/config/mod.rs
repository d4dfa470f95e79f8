//! Configuration module
//!
//! Deployment settings plus the static service and image tables

pub mod services;
pub mod settings;

pub use settings::{DataSource, DbAnnexType, Settings};
