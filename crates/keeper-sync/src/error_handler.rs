use keeper_core::{ErrorKind, KeeperError};

pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please log in again.";

/// Turns errors from the client and store into what a user should read.
pub trait ErrorHandler: Send + Sync {
    fn classify(&self, error: KeeperError) -> KeeperError;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorHandler;

impl ErrorHandler for DefaultErrorHandler {
    fn classify(&self, error: KeeperError) -> KeeperError {
        let message = match error.kind {
            ErrorKind::SessionExpired => SESSION_EXPIRED_MESSAGE.to_string(),
            ErrorKind::Network => {
                format!("Could not reach the server ({}).", error.message)
            }
            ErrorKind::Auth if error.message.trim().is_empty() => {
                "Login failed. Check your username and password.".to_string()
            }
            ErrorKind::Api => format!("The server returned an error: {}", error.message),
            ErrorKind::Auth | ErrorKind::Usage | ErrorKind::Storage => return error,
        };

        let cause = match error.cause {
            Some(cause) => format!("{}: {}", error.message, cause),
            None => error.message,
        };

        KeeperError {
            kind: error.kind,
            message,
            cause: Some(cause),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expired_sessions_get_one_fixed_message() {
        let classified = DefaultErrorHandler.classify(
            KeeperError::session_expired("session has been expired").with_cause("http_status=500"),
        );

        assert_eq!(classified.kind, ErrorKind::SessionExpired);
        assert_eq!(classified.message, SESSION_EXPIRED_MESSAGE);
        assert_eq!(
            classified.cause.as_deref(),
            Some("session has been expired: http_status=500")
        );
    }

    #[test]
    fn network_errors_keep_the_transport_detail_as_cause() {
        let classified = DefaultErrorHandler.classify(
            KeeperError::network("could not connect to server").with_cause("connection refused"),
        );

        assert_eq!(
            classified.message,
            "Could not reach the server (could not connect to server)."
        );
        assert_eq!(
            classified.cause.as_deref(),
            Some("could not connect to server: connection refused")
        );
    }

    #[test]
    fn storage_and_auth_messages_pass_through() {
        let storage = KeeperError::storage("disk full");
        assert_eq!(DefaultErrorHandler.classify(storage.clone()), storage);

        let auth = KeeperError::auth("username and password do not match");
        assert_eq!(DefaultErrorHandler.classify(auth.clone()), auth);
    }
}
