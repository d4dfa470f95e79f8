//! Pinned service versions
//!
//! Built once per invocation from submodule state and threaded through
//! components by value; never resolved a second time within one run.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Service name -> short (7-char) commit hash
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VersionMap {
    versions: BTreeMap<String, String>,
}

impl VersionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, service: &str, version: &str) {
        self.versions
            .insert(service.to_string(), version.to_string());
    }

    pub fn get(&self, service: &str) -> Option<&str> {
        self.versions.get(service).map(String::as_str)
    }

    /// Look up a version that must have been resolved
    pub fn require(&self, service: &str) -> Result<&str> {
        self.get(service).ok_or_else(|| Error::Resolution {
            submodule: service.to_string(),
            detail: "no version resolved for this service".to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.versions
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}
