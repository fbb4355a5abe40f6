/// Common types and utilities for contract class bindings

/// Error type for binding operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration (including a missing ABI)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The chain client reports a version this crate cannot drive
    #[error("Incompatible client: version {found} does not start with {expected}")]
    IncompatibleClient {
        /// Version reported by the client
        found: String,
        /// Required version prefix
        expected: String,
    },

    /// Deployment attempted without bytecode
    #[error("Missing bytecode")]
    MissingBytecode,

    /// Method is not installed on the binding
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// Arguments or bytecode could not be encoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Gas estimation failed on the client
    #[error("Gas estimation failed: {0}")]
    Estimation(String),

    /// Transaction submission failed or the transaction was rejected
    #[error("Submission error: {0}")]
    Submission(String),

    /// Read-only call failed
    #[error("Call error: {0}")]
    Call(String),

    /// Any other chain client failure
    #[error("Client error: {0}")]
    Client(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

impl Error {
    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Error::Configuration(msg.into())
    }

    /// Create a new unknown method error
    pub fn unknown_method<S: Into<String>>(name: S) -> Self {
        Error::UnknownMethod(name.into())
    }

    /// Create a new encoding error
    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        Error::Encoding(msg.into())
    }

    /// Create a new estimation error
    pub fn estimation<S: Into<String>>(msg: S) -> Self {
        Error::Estimation(msg.into())
    }

    /// Create a new submission error
    pub fn submission<S: Into<String>>(msg: S) -> Self {
        Error::Submission(msg.into())
    }

    /// Create a new call error
    pub fn call<S: Into<String>>(msg: S) -> Self {
        Error::Call(msg.into())
    }

    /// Create a new client error
    pub fn client<S: Into<String>>(msg: S) -> Self {
        Error::Client(msg.into())
    }

    /// Create a new serialization error
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Error::Serialization(msg.into())
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Configuration(format!("IO error: {}", err))
    }
}
