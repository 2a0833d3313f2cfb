//! Error taxonomy for the ETL client.
//!
//! Every failure a run can hit lands in one of four kinds so the caller can
//! report which stage aborted: configuration, storage, authentication, or
//! anything else.

/// Errors raised by the credential lifecycle and the ETL pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration, including an unusable secret key
    /// and any cipher failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// Record store read/write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Token endpoint rejected the request, returned a malformed body, or
    /// could not be reached.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Anything else.
    #[error("unclassified error: {0:#}")]
    Unclassified(#[from] anyhow::Error),
}

impl Error {
    /// Name of the stage that failed, for the user-visible abort message.
    pub fn stage(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Storage(_) => "storage",
            Error::Authentication(_) => "authentication",
            Error::Unclassified(_) => "unclassified",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
