//! Release tags
//!
//! A release tag is validated before any network or subprocess call is
//! made on its behalf.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::error::{Error, Result};

fn release_tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^v\d+\.\d+\.\d+(-RC\d)?$").unwrap())
}

/// Is this string a well-formed release tag (vX.Y.Z or vX.Y.Z-RCn)?
pub fn is_release_tag(value: &str) -> bool {
    release_tag_pattern().is_match(value)
}

/// A validated release version string
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReleaseTag(String);

impl ReleaseTag {
    pub fn parse(value: &str) -> Result<Self> {
        if is_release_tag(value) {
            Ok(ReleaseTag(value.to_string()))
        } else {
            Err(Error::TagValidation(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReleaseTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
