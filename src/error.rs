//! Unified error handling
//!
//! Almost nothing here is retried: external tools fail fast and the
//! first failing exit code is carried up to the process exit status.

use thiserror::Error;

/// Errors raised by deployment operations
#[derive(Debug, Error)]
pub enum Error {
    /// Bad git state while resolving a pinned submodule version
    #[error("could not resolve version of submodule '{submodule}': {detail}")]
    Resolution { submodule: String, detail: String },

    /// docker-compose returned a non-zero exit status
    #[error("docker-compose returned {code}")]
    Compose { code: i32 },

    /// Malformed release version string
    #[error("invalid release tag '{0}' (expected vX.Y.Z or vX.Y.Z-RCn)")]
    TagValidation(String),

    /// A step inside a multi-step configuration sequence failed
    #[error("step '{step}' failed: {source}")]
    Sequence {
        step: &'static str,
        #[source]
        source: Box<Error>,
    },

    /// A subprocess could not be spawned at all
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A subprocess ran but exited non-zero
    #[error("{program} exited with status {code}")]
    CommandFailed { program: String, code: i32 },

    /// Secret store lookup failed
    #[error("could not read secret '{name}': {detail}")]
    Secret { name: String, detail: String },

    /// A required config artifact could not be read or parsed
    #[error("could not load {path}: {detail}")]
    Config { path: String, detail: String },

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("message broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("unexpected payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A test expectation against the live deployment did not hold
    #[error("{0}")]
    Assertion(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Exit code to report for this error.
    ///
    /// Propagates the first failing subprocess's own exit code where one
    /// exists; everything else maps to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Compose { code } => *code,
            Error::CommandFailed { code, .. } => *code,
            Error::Sequence { source, .. } => source.exit_code(),
            _ => 1,
        }
    }
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_propagates_subprocess_status() {
        assert_eq!(Error::Compose { code: 14 }.exit_code(), 14);
        assert_eq!(
            Error::CommandFailed {
                program: "docker".to_string(),
                code: 125
            }
            .exit_code(),
            125
        );
    }

    #[test]
    fn test_exit_code_unwraps_sequence_steps() {
        let inner = Error::CommandFailed {
            program: "ssh-keyscan".to_string(),
            code: 2,
        };
        let err = Error::Sequence {
            step: "configure orderly ssh",
            source: Box::new(inner),
        };
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("configure orderly ssh"));
    }

    #[test]
    fn test_exit_code_defaults_to_one() {
        assert_eq!(Error::TagValidation("1.2.3".to_string()).exit_code(), 1);
    }
}
