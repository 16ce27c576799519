use serde::Serialize;
use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Usage,
    Auth,
    Network,
    Api,
    Storage,
    SessionExpired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Usage = 2,
    Auth = 3,
    Network = 4,
    Api = 5,
    Storage = 6,
    SessionExpired = 7,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Error surfaced by every layer of the client.
///
/// `message` is meant for humans; `cause` keeps the lower-level detail
/// (transport error text, HTTP status, sqlite message) when one exists.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[error("{message}")]
pub struct KeeperError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl KeeperError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Usage, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn api(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Api, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    pub fn session_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionExpired, message)
    }

    pub fn with_cause(mut self, cause: impl Display) -> Self {
        self.cause = Some(cause.to_string());
        self
    }

    pub fn is_session_expired(&self) -> bool {
        self.kind == ErrorKind::SessionExpired
    }

    pub fn exit_code(&self) -> ExitCode {
        match self.kind {
            ErrorKind::Usage => ExitCode::Usage,
            ErrorKind::Auth => ExitCode::Auth,
            ErrorKind::Network => ExitCode::Network,
            ErrorKind::Api => ExitCode::Api,
            ErrorKind::Storage => ExitCode::Storage,
            ErrorKind::SessionExpired => ExitCode::SessionExpired,
        }
    }
}

impl From<std::io::Error> for KeeperError {
    fn from(value: std::io::Error) -> Self {
        Self::storage(value.to_string())
    }
}

impl From<&str> for KeeperError {
    fn from(value: &str) -> Self {
        Self::usage(value)
    }
}

impl From<String> for KeeperError {
    fn from(value: String) -> Self {
        Self::usage(value)
    }
}

impl<T: Display> From<(ErrorKind, T)> for KeeperError {
    fn from((kind, value): (ErrorKind, T)) -> Self {
        Self::new(kind, value.to_string())
    }
}

pub type KeeperResult<T> = Result<T, KeeperError>;
