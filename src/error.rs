#[derive(Debug, thiserror::Error)]
pub enum DrizzleError {
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid connect target: {0:?}")]
    BadTarget(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Not a directory: {0:?}")]
    NotADirectory(std::path::PathBuf),

    #[error("No such path: {0:?}")]
    NotFound(std::path::PathBuf),

    #[error("Path escapes the shared root: {0:?}")]
    PathEscapesRoot(std::path::PathBuf),

    #[error("Peer not found")]
    PeerNotFound,

    #[error("No server address configured")]
    NoServerAddress,

    #[error("Error: could not get $HOME value")]
    NoHomeDir,

    #[error("Could not serialize config")]
    ConfigSerializationFail(#[from] toml::ser::Error),

    #[error("Could not parse config file")]
    ConfigParseError(#[from] Box<figment::Error>),
}

pub type Result<T> = std::result::Result<T, DrizzleError>;
