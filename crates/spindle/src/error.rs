// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Errors returned by spindle operations.
//!
//! This enum covers all error conditions that can occur while creating
//! entities, waiting for work and dispatching callbacks, from middleware
//! create failures to programming bugs such as publishing through a manager
//! that has already been torn down.

/// Errors returned by spindle operations.
///
/// # Example
///
/// ```rust,no_run
/// use spindle::{Error, Node};
///
/// let node = Node::builder("sensor_hub").build();
/// match node {
///     Err(Error::CreateFailed { entity, reason }) => {
///         eprintln!("could not create {}: {}", entity, reason);
///     }
///     Err(e) => eprintln!("other error: {}", e),
///     Ok(_) => {}
/// }
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Middleware Errors
    // ========================================================================
    /// A middleware handle could not be created; carries a printable reason.
    CreateFailed {
        entity: &'static str,
        reason: String,
    },
    /// The middleware wait primitive failed.
    WaitFailed(String),
    /// A take returned neither a message nor a clean "empty".
    TakeFailed {
        entity: &'static str,
        reason: String,
    },
    /// A request or response could not be routed to its destination.
    SendFailed(String),

    // ========================================================================
    // Entity Errors
    // ========================================================================
    /// An entity create was asked to join a callback group that is not
    /// registered with the node.
    GroupNotInNode,
    /// The global context was initialized more than once, or the signal
    /// handler could not be installed.
    InitFailed(String),

    // ========================================================================
    // Intra-Process Errors
    // ========================================================================
    /// A stored message's dynamic type does not match the type declared at
    /// publisher registration.
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    /// An intra-process callback ran after the manager was destroyed. This is
    /// a programming bug in the caller, not a recoverable condition.
    ManagerDestroyed,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::CreateFailed { entity, reason } => {
                write!(f, "could not create {}: {}", entity, reason)
            }
            Error::WaitFailed(reason) => write!(f, "wait failed: {}", reason),
            Error::TakeFailed { entity, reason } => {
                write!(f, "take from {} failed: {}", entity, reason)
            }
            Error::SendFailed(reason) => write!(f, "send failed: {}", reason),
            Error::GroupNotInNode => write!(f, "callback group is not registered with this node"),
            Error::InitFailed(reason) => write!(f, "init failed: {}", reason),
            Error::TypeMismatch { expected, actual } => {
                write!(
                    f,
                    "message type mismatch: expected '{}', got '{}'",
                    expected, actual
                )
            }
            Error::ManagerDestroyed => {
                write!(
                    f,
                    "intra-process operation after destruction of the intra-process manager"
                )
            }
        }
    }
}

impl std::error::Error for Error {}

/// Convenient alias for API results using the crate `Error` type.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_create_failed() {
        let err = Error::CreateFailed {
            entity: "publisher",
            reason: "duplicate topic".to_string(),
        };
        assert_eq!(err.to_string(), "could not create publisher: duplicate topic");
    }

    #[test]
    fn test_display_type_mismatch() {
        let err = Error::TypeMismatch {
            expected: "Imu",
            actual: "LaserScan",
        };
        assert!(err.to_string().contains("expected 'Imu'"));
        assert!(err.to_string().contains("got 'LaserScan'"));
    }
}
