//! Error types for the Visionary protocol engine.
//!
//! Every fallible operation in this crate returns [`VisionaryError`]. The variants
//! follow the failure taxonomy of the device protocol:
//!
//! ## Error Categories
//!
//! - **Connection Errors**: socket could not be established, was closed or reset.
//!   Fatal to the current connection; the owner must reopen.
//! - **Timeouts**: no response or frame within the deadline. Recoverable.
//! - **Protocol Violations**: malformed frame, bad checksum, sequence regression,
//!   truncated payload. Always surfaced, never silently recovered.
//! - **Device Errors**: a well-formed response carrying a non-OK result code, raised
//!   only by typed helpers. [`send_command`](crate::ControlSession::send_command)
//!   returns device codes as data instead.
//! - **Authentication Errors**: login rejected, session keeps its previous level.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use visionary::VisionaryError;
//! use std::time::Duration;
//!
//! let error = VisionaryError::timeout("next frame", Duration::from_millis(50));
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cola::ColaError;
use crate::types::UserLevel;

/// Result type alias for protocol engine operations.
pub type Result<T, E = VisionaryError> = std::result::Result<T, E>;

/// Main error type for the protocol engine.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum VisionaryError {
    #[error("Connection failed: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{operation} timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    #[error("Protocol violation in {context}: {details}")]
    Protocol { context: String, details: String },

    #[error("Truncated payload at offset {offset}: needed {needed} bytes, {available} available")]
    TruncatedPayload { offset: usize, needed: usize, available: usize },

    #[error("Device rejected '{command}' with {code}")]
    Device { command: String, code: ColaError },

    #[error("Authentication as {level} failed: {reason}")]
    Authentication { level: UserLevel, reason: String },

    #[error("Invalid command: {details}")]
    InvalidCommand { details: String },

    #[error("Configuration error: {details}")]
    Config { details: String },

    #[error("Configuration file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl VisionaryError {
    /// Returns whether this error is potentially recoverable through retry.
    ///
    /// Connection errors count as retryable only after the owner reopens.
    pub fn is_retryable(&self) -> bool {
        match self {
            VisionaryError::Connection { .. } => true,
            VisionaryError::Timeout { .. } => true,
            VisionaryError::Protocol { .. } => false,
            VisionaryError::TruncatedPayload { .. } => false,
            VisionaryError::Device { .. } => false,
            VisionaryError::Authentication { .. } => false,
            VisionaryError::InvalidCommand { .. } => false,
            VisionaryError::Config { .. } => false,
            VisionaryError::File { .. } => false,
        }
    }

    /// Returns whether the connection that produced this error must be reopened.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VisionaryError::Connection { .. })
    }

    /// Returns whether this error signals a framing or codec violation.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, VisionaryError::Protocol { .. } | VisionaryError::TruncatedPayload { .. })
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            VisionaryError::Connection { .. } => vec![
                "Check that the device is powered and reachable",
                "Verify the IP address and port (control vs. data port)",
                "Close and reopen the connection",
            ],
            VisionaryError::Timeout { .. } => vec![
                "Retry the operation",
                "Increase the timeout duration",
                "Check that acquisition is started when waiting for frames",
            ],
            VisionaryError::Protocol { .. } => vec![
                "Verify the selected protocol variant matches the device port",
                "Check the link for corruption",
                "Reopen the connection to resynchronize",
            ],
            VisionaryError::TruncatedPayload { .. } => vec![
                "Check the variable layout in the device interface description",
                "Verify the read order and value types",
            ],
            VisionaryError::Device { .. } => vec![
                "Check the variable or method name",
                "Log in with a sufficient user level",
                "Verify the parameter values are in range",
            ],
            VisionaryError::Authentication { .. } => vec![
                "Check the password for the requested user level",
                "Request a lower user level",
            ],
            VisionaryError::InvalidCommand { .. } => vec![
                "Use a non-empty printable ASCII name without spaces",
            ],
            VisionaryError::Config { .. } => vec![
                "Check configuration values against their documented ranges",
            ],
            VisionaryError::File { .. } => vec![
                "Check the configuration file exists and is readable",
                "Check file permissions",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        VisionaryError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        VisionaryError::Connection { reason: reason.into(), source: Some(Box::new(source)) }
    }

    /// Helper constructor for the "not open" connection error.
    pub fn not_connected(what: &str) -> Self {
        VisionaryError::connection_failed(format!("{} is not open", what))
    }

    /// Helper constructor for timeouts.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        VisionaryError::Timeout { operation: operation.into(), duration }
    }

    /// Helper constructor for protocol violations.
    pub fn protocol(context: impl Into<String>, details: impl Into<String>) -> Self {
        VisionaryError::Protocol { context: context.into(), details: details.into() }
    }

    /// Helper constructor for device-reported errors.
    pub fn device(command: impl Into<String>, code: ColaError) -> Self {
        VisionaryError::Device { command: command.into(), code }
    }

    /// Helper constructor for authentication failures.
    pub fn authentication(level: UserLevel, reason: impl Into<String>) -> Self {
        VisionaryError::Authentication { level, reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        VisionaryError::Config { details: details.into() }
    }
}

impl From<std::io::Error> for VisionaryError {
    fn from(err: std::io::Error) -> Self {
        VisionaryError::connection_failed_with_source(err.to_string(), err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn error_messages_carry_their_context(
                reason in ".*",
                offset in 0usize..0x10000usize,
                needed in 1usize..16usize,
                duration_ms in 1u64..60000u64
            ) {
                let connection = VisionaryError::connection_failed(reason.clone());
                prop_assert!(connection.to_string().contains(&reason));

                let truncated = VisionaryError::TruncatedPayload { offset, needed, available: 0 };
                prop_assert!(truncated.to_string().contains(&offset.to_string()));

                let timeout = VisionaryError::timeout("frame", Duration::from_millis(duration_ms));
                prop_assert!(timeout.is_retryable());
                prop_assert!(!timeout.is_fatal());
            }
        }
    }

    #[test]
    fn taxonomy_classification() {
        assert!(VisionaryError::connection_failed("reset").is_fatal());
        assert!(VisionaryError::connection_failed("reset").is_retryable());
        assert!(!VisionaryError::protocol("blob", "bad crc").is_retryable());
        assert!(VisionaryError::protocol("blob", "bad crc").is_protocol_violation());
        assert!(
            VisionaryError::TruncatedPayload { offset: 4, needed: 4, available: 2 }
                .is_protocol_violation()
        );
        assert!(!VisionaryError::device("framePeriodTime", ColaError::VariableUnknownIndex)
            .is_protocol_violation());
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<VisionaryError>();

        let error = VisionaryError::connection_failed("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn io_errors_become_connection_errors_with_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer reset");
        let err: VisionaryError = io.into();
        assert!(err.is_fatal());
        let source = std::error::Error::source(&err).expect("source preserved");
        assert_eq!(source.to_string(), "peer reset");
    }

    #[test]
    fn every_variant_has_suggestions() {
        let errors = [
            VisionaryError::connection_failed("x"),
            VisionaryError::timeout("x", Duration::from_millis(1)),
            VisionaryError::protocol("x", "y"),
            VisionaryError::TruncatedPayload { offset: 0, needed: 1, available: 0 },
            VisionaryError::device("x", ColaError::InvalidData),
            VisionaryError::authentication(UserLevel::Service, "x"),
            VisionaryError::InvalidCommand { details: "x".to_string() },
            VisionaryError::config("x"),
        ];
        for error in &errors {
            assert!(!error.recovery_suggestions().is_empty(), "{error}");
        }
    }
}
