//! Error types for the backup run.
//!
//! One taxonomy for the whole tool. The sync driver decides per variant
//! whether a failure aborts the run (catalog fetch, snapshot write) or is
//! recorded and skipped (a single project's mirror or pipeline fetch).

use thiserror::Error;

/// Errors produced while mirroring a GitLab instance.
#[derive(Debug, Error)]
pub enum BackupError {
    /// A catalog or pipeline fetch came back with a non-success status.
    #[error("remote fetch failed: {message}")]
    RemoteFetch {
        message: String,
        status_code: Option<u16>,
        endpoint: Option<String>,
    },

    /// Clone or fast-forward pull failed for one project.
    #[error("mirror failed: {message}")]
    Mirror {
        message: String,
        project: Option<String>,
    },

    /// Writing a snapshot to file or database failed.
    #[error("persistence failed: {message}")]
    Persistence {
        message: String,
        target: Option<String>,
    },

    /// Transport-level failure (timeout, refused connection, DNS).
    #[error("network error: {message}")]
    Network { message: String },

    /// The private token was rejected by the API.
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Bad or missing configuration.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Internal application error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl BackupError {
    /// Create a remote fetch error without status context.
    pub fn remote_fetch(message: impl Into<String>) -> Self {
        Self::RemoteFetch {
            message: message.into(),
            status_code: None,
            endpoint: None,
        }
    }

    /// Create a remote fetch error carrying the status code and endpoint.
    pub fn remote_fetch_full(
        message: impl Into<String>,
        status_code: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self::RemoteFetch {
            message: message.into(),
            status_code: Some(status_code),
            endpoint: Some(endpoint.into()),
        }
    }

    /// Create a mirror error.
    pub fn mirror(message: impl Into<String>) -> Self {
        Self::Mirror {
            message: message.into(),
            project: None,
        }
    }

    /// Create a mirror error scoped to a project path.
    pub fn mirror_for_project(message: impl Into<String>, project: impl Into<String>) -> Self {
        Self::Mirror {
            message: message.into(),
            project: Some(project.into()),
        }
    }

    /// Create a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
            target: None,
        }
    }

    /// Create a persistence error naming the file or table it hit.
    pub fn persistence_for(message: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
            target: Some(target.into()),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status carried by a remote fetch error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::RemoteFetch { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Whether retrying this error could help.
    ///
    /// Transient: transport failures and 5xx / 429 responses. Everything
    /// else (4xx, auth, local persistence) fails the same way every time.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } => true,
            Self::RemoteFetch { status_code, .. } => match status_code {
                Some(code) => *code >= 500 || *code == 429,
                None => false,
            },
            _ => false,
        }
    }
}

// Conversions from common error types

impl From<sqlx::Error> for BackupError {
    fn from(err: sqlx::Error) -> Self {
        Self::persistence(err.to_string())
    }
}

impl From<reqwest::Error> for BackupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("request timed out")
        } else if err.is_connect() {
            Self::network("failed to connect to server")
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<git2::Error> for BackupError {
    fn from(err: git2::Error) -> Self {
        Self::mirror(err.message().to_string())
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        Self::persistence(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        Self::persistence(err.to_string())
    }
}
