//! Domain models

pub mod release;
pub mod version;

pub use release::ReleaseTag;
pub use version::VersionMap;
