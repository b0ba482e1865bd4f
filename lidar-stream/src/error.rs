use crate::wire::FrameBounds;
use lidar_driver::RplidarError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`ClientError`], for callers that only need
/// to decide between reconnecting, waiting and discarding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The connection is missing, refused or gone.
    Connection,
    /// No data arrived within the configured timeout.
    Timeout,
    /// Bytes arrived but do not form a valid revolution frame.
    Data,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Connection refused by {0}. Is the server running?")]
    ConnectionRefused(String),
    #[error("Cannot reach {addr}: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("Already connected to the server")]
    AlreadyConnected,
    #[error("Not connected. Call connect() first")]
    NotConnected,
    #[error("Connection closed by the server")]
    ConnectionClosed,
    #[error("Connection lost: {0}")]
    ConnectionLost(#[source] io::Error),
    #[error("Timed out waiting for the server")]
    Timeout,
    #[error("Invalid frame length {length} bytes, expected {bounds}. Possible data corruption")]
    InvalidFrameLength { length: u32, bounds: FrameBounds },
    #[error("Invalid revolution payload: {0}")]
    Payload(#[from] WireError),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::ConnectionRefused(_)
            | ClientError::Unreachable { .. }
            | ClientError::AlreadyConnected
            | ClientError::NotConnected
            | ClientError::ConnectionClosed
            | ClientError::ConnectionLost(_) => ErrorKind::Connection,
            ClientError::Timeout => ErrorKind::Timeout,
            ClientError::InvalidFrameLength { .. } | ClientError::Payload(_) => ErrorKind::Data,
        }
    }

    /// Maps an I/O error raised while reading a connected stream.
    pub(crate) fn from_read(e: io::Error) -> ClientError {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ClientError::Timeout,
            io::ErrorKind::UnexpectedEof => ClientError::ConnectionClosed,
            _ => ClientError::ConnectionLost(e),
        }
    }

    /// Maps an I/O error raised while dialing `addr`.
    pub(crate) fn from_connect(e: io::Error, addr: &str) -> ClientError {
        match e.kind() {
            io::ErrorKind::ConnectionRefused => ClientError::ConnectionRefused(addr.to_string()),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ClientError::Timeout,
            _ => ClientError::Unreachable {
                addr: addr.to_string(),
                source: e,
            },
        }
    }
}

/// Failure to encode or decode a revolution payload.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum WireError {
    #[error("Payload must start with \"LR\". Observed = {0:02X?}")]
    BadMagic([u8; 2]),
    #[error("Unsupported schema version {0}")]
    UnsupportedVersion(u8),
    #[error("Payload truncated: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("Unknown quality tag {0}")]
    UnknownQualityTag(u8),
    #[error("Quality {0} is out of range 0..=15")]
    QualityOutOfRange(u8),
    #[error("Non-finite {field}: {value}")]
    NonFinite { field: &'static str, value: f32 },
    #[error("Negative distance {0}")]
    NegativeDistance(f32),
    #[error("{0} trailing bytes after the last measurement")]
    TrailingBytes(usize),
    #[error("Revolution holds {0} measurements, more than a frame can carry")]
    TooManyMeasurements(usize),
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error(transparent)]
    Driver(#[from] RplidarError),
    #[error("Sensor has not been started")]
    NotStarted,
    #[error("Sensor has been released")]
    Released,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("Accept failed: {0}")]
    Accept(#[source] io::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Sensor(#[from] SensorError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: impl ToString, reason: impl ToString) -> ConfigError {
        ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_exhaustive() {
        let connection = [
            ClientError::ConnectionRefused("127.0.0.1:5000".into()),
            ClientError::AlreadyConnected,
            ClientError::NotConnected,
            ClientError::ConnectionClosed,
            ClientError::ConnectionLost(io::ErrorKind::ConnectionReset.into()),
        ];
        for e in connection {
            assert_eq!(e.kind(), ErrorKind::Connection, "{e}");
        }
        assert_eq!(ClientError::Timeout.kind(), ErrorKind::Timeout);
        assert_eq!(
            ClientError::InvalidFrameLength {
                length: 50,
                bounds: FrameBounds::default()
            }
            .kind(),
            ErrorKind::Data
        );
        assert_eq!(
            ClientError::from(WireError::UnsupportedVersion(9)).kind(),
            ErrorKind::Data
        );
    }

    #[test]
    fn test_from_read() {
        assert!(matches!(
            ClientError::from_read(io::ErrorKind::WouldBlock.into()),
            ClientError::Timeout
        ));
        assert!(matches!(
            ClientError::from_read(io::ErrorKind::TimedOut.into()),
            ClientError::Timeout
        ));
        assert!(matches!(
            ClientError::from_read(io::ErrorKind::ConnectionReset.into()),
            ClientError::ConnectionLost(_)
        ));
    }

    #[test]
    fn test_from_connect() {
        assert!(matches!(
            ClientError::from_connect(io::ErrorKind::ConnectionRefused.into(), "h:1"),
            ClientError::ConnectionRefused(addr) if addr == "h:1"
        ));
        assert!(matches!(
            ClientError::from_connect(io::ErrorKind::TimedOut.into(), "h:1"),
            ClientError::Timeout
        ));
        assert_eq!(
            ClientError::from_connect(io::ErrorKind::AddrNotAvailable.into(), "h:1").kind(),
            ErrorKind::Connection
        );
    }
}
