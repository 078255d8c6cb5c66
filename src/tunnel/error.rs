//! Error types for tunnel process management.

use thiserror::Error;

/// Errors from tunnel lifecycle operations.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The ssh subprocess could not be spawned.
    #[error("Failed to spawn ssh tunnel: {0}")]
    Spawn(#[source] std::io::Error),

    /// The spawned subprocess exited before its pid could be recorded.
    #[error("Tunnel process exited before its pid was recorded")]
    NoPid,
}

/// Result type for tunnel operations.
pub type TunnelResult<T> = Result<T, TunnelError>;
