use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    Config(ConfigError),
    /// A scripted write outside 0xFF10..=0xFF3F.
    InvalidAddress(u16),
    Audio(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroReplication,
    RateBelowReplication { rate: u32, replication: u32 },
    ZeroChunk,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::Config(err) => write!(f, "invalid config: {}", err),
            Error::InvalidAddress(addr) => {
                write!(f, "address 0x{:04X} is outside the APU window", addr)
            }
            Error::Audio(msg) => write!(f, "audio device error: {}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroReplication => write!(f, "replication must be at least 1"),
            ConfigError::RateBelowReplication { rate, replication } => write!(
                f,
                "output rate {} Hz cannot be split by replication {}",
                rate, replication
            ),
            ConfigError::ZeroChunk => write!(f, "max_chunk must be at least 1"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}
