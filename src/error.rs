//! Failure classes for a fetch.
//!
//! Every variant is fatal to the build step. Errors travel as `anyhow::Error`
//! so context can be layered on; callers that care about the class use
//! `err.downcast_ref::<FetchError>()`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Missing descriptor file, missing key, or an unusable manifest.
    #[error("configuration error: {0}")]
    Config(String),

    /// A clean was requested for a directory outside the project root.
    #[error("refusing to clean directory outside project root: {0}")]
    UnsafeClean(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("archive error: {0}")]
    Archive(String),

    /// Downloaded bytes did not match the pinned SHA-256.
    #[error("integrity error: {0}")]
    Integrity(String),
}

impl FetchError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn archive(msg: impl Into<String>) -> Self {
        Self::Archive(msg.into())
    }
}

/// Returns the failure class carried anywhere in an error chain.
pub fn classify(err: &anyhow::Error) -> Option<&FetchError> {
    err.chain().find_map(|cause| cause.downcast_ref::<FetchError>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_finds_class_under_context() {
        let err = anyhow::Error::new(FetchError::config("missing key 'repo'"))
            .context("Failed to read release descriptor");
        assert_eq!(
            classify(&err),
            Some(&FetchError::Config("missing key 'repo'".to_string()))
        );
    }

    #[test]
    fn classify_plain_error_is_none() {
        let err = anyhow::anyhow!("disk full");
        assert!(classify(&err).is_none());
    }

    #[test]
    fn display_mentions_class() {
        let msg = FetchError::UnsafeClean("/etc".to_string()).to_string();
        assert!(msg.contains("outside project root"), "msg: {msg}");
        assert!(msg.contains("/etc"));
    }
}
