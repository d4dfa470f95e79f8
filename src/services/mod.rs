//! Operational services
//!
//! Each module wraps one family of external-tool invocations

pub mod backup;
pub mod compose;
pub mod database;
pub mod deploy;
pub mod integration;
pub mod notify;
pub mod orderly;
pub mod release;
pub mod versions;
