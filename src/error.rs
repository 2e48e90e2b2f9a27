//! Error types for the task engine.
//!
//! Errors are data, not control flow:
//!
//! - Errors returned by user closures are wrapped in [`Error`] with
//!   [`ErrorKind::User`] and keep their original value as the source
//! - Panics in user closures never become an `Error`; they are carried as
//!   [`PanicPayload`](crate::types::PanicPayload) in the outcome
//! - Cancellation is likewise not an `Error`; it travels as
//!   [`CancelReason`](crate::types::CancelReason)
//!
//! The remaining kinds describe failures of the engine's collaborators.

use core::fmt;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Error produced by user code.
    User,
    /// An execution context refused a submitted job.
    Rejected,
    /// An asynchronous registrar dropped its completion handle without
    /// completing it.
    Abandoned,
    /// Invalid configuration value.
    Config,
    /// Internal engine error (bug).
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::User => "user error",
            Self::Rejected => "submission rejected",
            Self::Abandoned => "completion abandoned",
            Self::Config => "configuration error",
            Self::Internal => "internal error",
        };
        f.write_str(name)
    }
}

/// The main error type.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
        }
    }

    /// Wraps an error returned by user code.
    ///
    /// The original value stays reachable through [`Error::downcast_ref`].
    #[must_use]
    pub fn user(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::new(ErrorKind::User).with_source(source)
    }

    /// Creates a user error carrying only a message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::User).with_message(message)
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal).with_message(message)
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the source error as a concrete type, if it is one.
    #[must_use]
    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        self.source.as_deref()?.downcast_ref::<T>()
    }

    /// Returns true if this error wraps a user error.
    #[must_use]
    pub const fn is_user(&self) -> bool {
        matches!(self.kind, ErrorKind::User)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, &self.source) {
            (Some(msg), _) => write!(f, "{}: {msg}", self.kind),
            (None, Some(source)) => write!(f, "{}: {source}", self.kind),
            (None, None) => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<crate::runtime::Rejected> for Error {
    fn from(err: crate::runtime::Rejected) -> Self {
        Self::new(ErrorKind::Rejected).with_source(err)
    }
}

impl From<crate::runtime::ConfigError> for Error {
    fn from(err: crate::runtime::ConfigError) -> Self {
        Self::new(ErrorKind::Config).with_source(err)
    }
}

/// A specialized Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug, PartialEq)]
    struct Boom(u32);

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "boom {}", self.0)
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn user_error_keeps_source() {
        let err = Error::user(Boom(3));
        assert_eq!(err.kind(), ErrorKind::User);
        assert_eq!(err.downcast_ref::<Boom>(), Some(&Boom(3)));
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "user error: boom 3");
    }

    #[test]
    fn message_takes_precedence_in_display() {
        let err = Error::user(Boom(1)).with_message("while loading");
        assert_eq!(err.to_string(), "user error: while loading");
    }

    #[test]
    fn bare_kind_display() {
        assert_eq!(Error::new(ErrorKind::Abandoned).to_string(), "completion abandoned");
        assert!(!Error::internal("x").is_user());
        assert!(Error::msg("plain").is_user());
    }

    #[test]
    fn clone_shares_source() {
        let err = Error::user(Boom(9));
        let cloned = err.clone();
        assert_eq!(cloned.downcast_ref::<Boom>(), Some(&Boom(9)));
    }
}
