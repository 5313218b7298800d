use std::{io, sync::Arc};

use thiserror::Error;

#[derive(Error, Clone, Debug)]
pub enum TransportError {
    #[error("IO Error: {0:?}")]
    Io(Arc<io::Error>),
    #[error("Other Error: {0}")]
    Other(Arc<anyhow::Error>),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io(Arc::new(err))
    }
}

impl From<anyhow::Error> for TransportError {
    fn from(x: anyhow::Error) -> Self {
        TransportError::Other(Arc::new(x))
    }
}

#[derive(Error, Clone, Debug)]
pub enum ProtocolError {
    #[error("Timeout")]
    Timeout,
    #[error("Unexpected Response: {0}")]
    UnexpectedResponse(String),
    #[error("Other Error: {0}")]
    Other(Arc<anyhow::Error>),
}

impl From<anyhow::Error> for ProtocolError {
    fn from(x: anyhow::Error) -> Self {
        ProtocolError::Other(Arc::new(x))
    }
}

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Transport Error {0}")]
    Transport(TransportError),
    #[error("Protocol Error {0}")]
    Protocol(ProtocolError),
    #[error("Argument Error {0}")]
    Argument(Arc<anyhow::Error>),
    #[error("Value {value} of `{parameter}` is out of range [{min}, {max}]")]
    OutOfRange {
        parameter: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("Invalid value `{value}` for `{parameter}`, allowed: {allowed}")]
    InvalidValue {
        parameter: String,
        value: String,
        allowed: String,
    },
    #[error("Cannot get/set {required} settings while in {actual} mode")]
    ModeMismatch { required: String, actual: String },
    #[error("Cannot switch mode while source is on")]
    OutputEnabled,
    #[error("Unknown model `{model}`. Supported models are: {supported}")]
    UnsupportedModel { model: String, supported: String },
    #[error("This driver is only compatible with the 'SCPI' command set, not '{0}' set")]
    CommandSet(String),
    #[error("Invalid channel `{0}`")]
    InvalidChannel(String),
    #[error("Invalid address `{0}`")]
    InvalidAddress(String),
    #[error("Internal Error {0}")]
    Internal(Arc<anyhow::Error>),
}

impl Error {
    pub fn transport<T: Into<TransportError>>(err: T) -> Self {
        Self::Transport(err.into())
    }

    pub fn protocol<T: Into<ProtocolError>>(err: T) -> Self {
        Self::Protocol(err.into())
    }

    pub fn protocol_timeout() -> Self {
        Error::Protocol(ProtocolError::Timeout)
    }

    pub fn unexpected_response<T: Into<String>>(response: T) -> Self {
        Error::Protocol(ProtocolError::UnexpectedResponse(response.into()))
    }

    pub fn internal<T: Into<anyhow::Error>>(err: T) -> Self {
        Self::Internal(Arc::new(err.into()))
    }

    pub fn argument<T: Into<anyhow::Error>>(err: T) -> Self {
        Self::Argument(Arc::new(err.into()))
    }

    pub fn mode_mismatch<A: ToString, B: ToString>(required: A, actual: B) -> Self {
        Self::ModeMismatch {
            required: required.to_string(),
            actual: actual.to_string(),
        }
    }

    /// True for errors raised by validation before anything was sent.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::Argument(_)
                | Error::OutOfRange { .. }
                | Error::InvalidValue { .. }
                | Error::ModeMismatch { .. }
                | Error::OutputEnabled
                | Error::InvalidChannel(_)
        )
    }
}

impl From<io::Error> for Error {
    fn from(x: io::Error) -> Self {
        if x.kind() == io::ErrorKind::TimedOut || x.kind() == io::ErrorKind::WouldBlock {
            return Error::protocol_timeout();
        }
        Error::Transport(TransportError::Io(Arc::new(x)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_mismatch_message() {
        let err = Error::mode_mismatch("VOLT", "CURR");
        assert_eq!(
            err.to_string(),
            "Cannot get/set VOLT settings while in CURR mode"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn io_timeout_maps_to_protocol_timeout() {
        let err: Error = io::Error::new(io::ErrorKind::TimedOut, "read").into();
        assert!(matches!(err, Error::Protocol(ProtocolError::Timeout)));
        let err: Error = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert!(matches!(err, Error::Transport(TransportError::Io(_))));
        assert!(!err.is_validation());
    }
}
