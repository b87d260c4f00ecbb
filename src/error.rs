use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no sync id yet. Push your tasks first: glasscal sync push")]
    NoSyncId,

    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server error: HTTP {status}{}", fmt_detail(.detail))]
    Server { status: u16, detail: Option<String> },

    #[error("server returned no response data")]
    EmptyResponse,

    #[error("unusable task record: {0}")]
    RecordConversion(String),

    #[error("{message}")]
    Rejected { message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

fn fmt_detail(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(" ({d})"),
        None => String::new(),
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::Database(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_message_includes_detail() {
        let e = Error::Server {
            status: 503,
            detail: Some("maintenance".into()),
        };
        assert_eq!(e.to_string(), "server error: HTTP 503 (maintenance)");

        let e = Error::Server {
            status: 404,
            detail: None,
        };
        assert_eq!(e.to_string(), "server error: HTTP 404");
    }

    #[test]
    fn test_rejected_message_is_verbatim() {
        let e = Error::Rejected {
            message: "quota exceeded".into(),
        };
        assert_eq!(e.to_string(), "quota exceeded");
    }
}
