use crate::transport::Uuid;

/// [Result] alias for return types of the crate API
pub type Result<T> = std::result::Result<T, Error>;

/// Error enum type
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The drone is not connected or the session has been disconnected. All commands fail fast with this error.
    TransportUnavailable,
    /// A required BLE service was not found during the handshake. Contains the missing service UUID.
    ServiceNotFound(Uuid),
    /// A required BLE characteristic was not found during the handshake. Contains the missing characteristic UUID.
    CharacteristicNotFound(Uuid),
    /// The transport refused the flight status subscription. The String contains the reason.
    SubscriptionFailed(String),
    /// Writing a frame to a characteristic failed. The String contains the reason.
    WriteFailed(String),
    /// Malformed inbound notification. Never fatal, only reported in logs.
    InvalidFrame(String),
    /// A command argument is outside of what the protocol can carry. The String contains the reason.
    InvalidParameter(String),
    /// Error with the async runtime.
    SystemError(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::TransportUnavailable => write!(f, "drone transport unavailable"),
            Error::ServiceNotFound(uuid) => write!(f, "BLE service {} not found", uuid),
            Error::CharacteristicNotFound(uuid) => write!(f, "BLE characteristic {} not found", uuid),
            Error::SubscriptionFailed(reason) => write!(f, "notification subscription failed: {}", reason),
            Error::WriteFailed(reason) => write!(f, "frame write failed: {}", reason),
            Error::InvalidFrame(reason) => write!(f, "invalid frame: {}", reason),
            Error::InvalidParameter(reason) => write!(f, "invalid parameter: {}", reason),
            Error::SystemError(reason) => write!(f, "system error: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

impl From<tokio::task::JoinError> for Error {
    fn from(error: tokio::task::JoinError) -> Self {
        Self::SystemError(format!("{}", error))
    }
}
