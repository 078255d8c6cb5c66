//! Error types for port discovery.
//!
//! Discovery failures are transient by design: the supervisor logs them and
//! keeps the current tunnel untouched.

use thiserror::Error;

/// Errors from a discovery attempt.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The discovery command could not be started.
    #[error("Failed to run discovery command: {0}")]
    Spawn(#[source] std::io::Error),

    /// The discovery command ran but exited with a non-zero status.
    #[error("Discovery command exited with status {code:?}: {stderr}")]
    CommandFailed {
        /// Exit code, if the process exited normally.
        code: Option<i32>,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The Docker Engine API request failed (connection, non-2xx, or a
    /// malformed response body).
    #[error("Docker API request failed: {0}")]
    Api(#[from] bollard::errors::Error),
}

/// Result type for discovery operations.
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_display() {
        let err = DiscoveryError::CommandFailed {
            code: Some(1),
            stderr: "docker: command not found".to_string(),
        };
        assert!(err.to_string().contains("command not found"));
        assert!(err.to_string().contains('1'));
    }

    #[test]
    fn test_spawn_error_display() {
        let err = DiscoveryError::Spawn(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        assert!(err.to_string().contains("Failed to run"));
    }
}
