// Error taxonomy
//
// Every connection-scoped error is fatal only to the connection that
// raised it (see the module docs on `connection`); `ConfigError` is the
// only variant that is fatal to the whole process.

use thiserror::Error;

/// Errors raised while decoding an AMF0 value from the wire
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("truncated AMF0 value at offset {offset}")]
    Truncated { offset: usize },

    #[error("unknown AMF0 marker byte 0x{marker:02x} at offset {offset}")]
    BadMarker { marker: u8, offset: usize },

    #[error("malformed UTF-8 in AMF0 string at offset {offset}")]
    BadUtf8 { offset: usize },
}

/// Errors that terminate a single RTMP connection. Never propagate past
/// the connection task that raised them.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unsupported RTMP version byte: {0:#04x}")]
    UnsupportedVersion(u8),

    #[error("malformed chunk header on channel {channel}")]
    BadChunkHeader { channel: u32 },

    #[error("channel {channel} reused for a new message before the previous one finished")]
    InterleavedMessage { channel: u32 },

    #[error("chunk size {0} outside the valid range [1, 16777215]")]
    BadChunkSize(u32),

    #[error("malformed AMF0 command payload: {0}")]
    BadAmf0(#[from] DecodeError),

    #[error("unexpected command '{command}' for this connection's role")]
    UnexpectedCommand { command: String },

    #[error("connection closed mid-message")]
    Truncated,
}

/// Errors raised while dialing out as a client-mode connection. Consumed
/// by the reconnect policy, never logged as fatal on their own.
#[derive(Debug, Error)]
pub enum DialError {
    #[error("connection attempt timed out")]
    Timeout,

    #[error("connection refused")]
    Refused,

    #[error("connection reset")]
    Reset,

    #[error("i/o error while dialing: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading the configuration file. Fatal at startup;
/// the caller should exit with status code 1.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse configuration file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Socket-layer errors. Always treated as a connection close.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by peer")]
    Closed,
}
