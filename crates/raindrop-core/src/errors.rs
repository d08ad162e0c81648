use std::path::PathBuf;

/// Core error type.
///
/// Command failures (`NotFound` .. `Usage`) are recovered by the service: the
/// requester gets a notice and the adapter only logs them. The remaining
/// variants are infrastructure failures.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("forbidden by stream policy: {stream}")]
    ForbiddenLocal { stream: String },

    #[error("data store is corrupt: {path}: {reason}")]
    ConfigCorrupt { path: PathBuf, reason: String },

    #[error("usage: {0}")]
    Usage(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// True for per-command rejections that were already reported to the requester.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_)
                | Error::AlreadyExists(_)
                | Error::Forbidden(_)
                | Error::ForbiddenLocal { .. }
                | Error::Usage(_)
        )
    }

    /// The message without the category prefix, for requester-facing notices.
    pub fn detail(&self) -> String {
        match self {
            Error::NotFound(m)
            | Error::AlreadyExists(m)
            | Error::Forbidden(m)
            | Error::Usage(m)
            | Error::Config(m)
            | Error::External(m) => m.clone(),
            other => other.to_string(),
        }
    }

    /// Stable snake_case tag for logs and the audit trail.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "not_found",
            Error::AlreadyExists(_) => "already_exists",
            Error::Forbidden(_) => "forbidden",
            Error::ForbiddenLocal { .. } => "forbidden_local",
            Error::ConfigCorrupt { .. } => "config_corrupt",
            Error::Usage(_) => "usage",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::External(_) => "external",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
