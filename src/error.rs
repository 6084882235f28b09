use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("unknown operation: {name}")]
    UnknownOperation { name: String },

    #[error("config parse error in {path}: {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    #[error("ipc error: {reason}")]
    Ipc { reason: String },

    #[error("socket not found at {path}")]
    SocketNotFound { path: PathBuf },

    #[error("companion timeout after {timeout_secs}s")]
    CompanionTimeout { timeout_secs: u64 },

    #[error("companion error: {reason}")]
    Companion { reason: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error: status={status}, body={body}")]
    Api { status: u16, body: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AssistError>;
