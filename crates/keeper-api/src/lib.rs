mod dto;

pub use dto::{
    AccountDto, BookmarkDto, BookmarkRequest, BookmarksDto, LoginRequest, SessionDto, TagDto,
};

use keeper_core::{KeeperError, KeeperResult};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const SESSION_HEADER: &str = "X-Session-Id";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// Text the server puts in the body when a session id is no longer valid.
const SESSION_EXPIRED_MARKER: &str = "session has been expired";

/// The remote operations the sync layer needs. Every call takes the server
/// base URL from the caller because it lives in the user's stored settings.
pub trait RemoteApi: Send + Sync {
    fn login(&self, server_url: &str, body: &LoginRequest) -> KeeperResult<SessionDto>;

    /// Succeeds whenever the server answered, whatever the status code.
    fn logout(&self, server_url: &str, session: &str) -> KeeperResult<()>;

    fn bookmarks(&self, server_url: &str, session: &str) -> KeeperResult<BookmarksDto>;

    fn add_bookmark(
        &self,
        server_url: &str,
        session: &str,
        body: &BookmarkRequest,
    ) -> KeeperResult<BookmarkDto>;

    fn edit_bookmark(
        &self,
        server_url: &str,
        session: &str,
        body: &BookmarkRequest,
    ) -> KeeperResult<BookmarkDto>;

    fn delete_bookmarks(&self, server_url: &str, session: &str, ids: &[i64]) -> KeeperResult<()>;

    fn tags(&self, server_url: &str, session: &str) -> KeeperResult<Vec<TagDto>>;
}

#[derive(Debug, Clone)]
pub struct ShioriApi {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    error: Option<String>,
}

impl ShioriApi {
    pub fn new(timeout: Duration) -> KeeperResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("keeper/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| {
                KeeperError::storage("failed to construct API client").with_cause(err)
            })?;

        Ok(Self { client })
    }

    fn authed(&self, request: RequestBuilder, session: &str) -> KeeperResult<RequestBuilder> {
        if session.trim().is_empty() {
            return Err(KeeperError::session_expired(
                "no active session; log in again",
            ));
        }
        Ok(request.header(SESSION_HEADER, session))
    }
}

impl RemoteApi for ShioriApi {
    fn login(&self, server_url: &str, body: &LoginRequest) -> KeeperResult<SessionDto> {
        let url = endpoint(server_url, "/api/login")?;
        debug!(%url, username = %body.username, "sending login");
        let response = self.client.post(url).json(body).send().map_err(network_error)?;
        let session: SessionDto = parse_json_response(response, false)?;

        if session
            .session
            .as_deref()
            .is_none_or(|token| token.trim().is_empty())
        {
            return Err(KeeperError::auth(
                "login response did not include a session id",
            ));
        }

        Ok(session)
    }

    fn logout(&self, server_url: &str, session: &str) -> KeeperResult<()> {
        let url = endpoint(server_url, "/api/logout")?;
        let response = self
            .client
            .post(url)
            .header(SESSION_HEADER, session)
            .send()
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!(
                status = status.as_u16(),
                body = %truncate_for_error(body.trim(), 120),
                "server rejected logout; treating session as closed"
            );
        }
        Ok(())
    }

    fn bookmarks(&self, server_url: &str, session: &str) -> KeeperResult<BookmarksDto> {
        let url = endpoint(server_url, "/api/bookmarks")?;
        let request = self.authed(self.client.get(url), session)?;
        parse_json_response(request.send().map_err(network_error)?, true)
    }

    fn add_bookmark(
        &self,
        server_url: &str,
        session: &str,
        body: &BookmarkRequest,
    ) -> KeeperResult<BookmarkDto> {
        if body.url.trim().is_empty() {
            return Err(KeeperError::usage("bookmark URL cannot be empty"));
        }

        let url = endpoint(server_url, "/api/bookmarks")?;
        let request = self.authed(self.client.post(url), session)?.json(body);
        parse_json_response(request.send().map_err(network_error)?, true)
    }

    fn edit_bookmark(
        &self,
        server_url: &str,
        session: &str,
        body: &BookmarkRequest,
    ) -> KeeperResult<BookmarkDto> {
        if body.id.is_none() {
            return Err(KeeperError::usage("bookmark id is required for edit"));
        }

        let url = endpoint(server_url, "/api/bookmarks")?;
        let request = self.authed(self.client.put(url), session)?.json(body);
        parse_json_response(request.send().map_err(network_error)?, true)
    }

    fn delete_bookmarks(&self, server_url: &str, session: &str, ids: &[i64]) -> KeeperResult<()> {
        if ids.is_empty() {
            return Err(KeeperError::usage("no bookmark ids given for delete"));
        }

        let url = endpoint(server_url, "/api/bookmarks")?;
        let request = self.authed(self.client.delete(url), session)?.json(ids);
        parse_no_content_response(request.send().map_err(network_error)?, true)
    }

    fn tags(&self, server_url: &str, session: &str) -> KeeperResult<Vec<TagDto>> {
        let url = endpoint(server_url, "/api/tags")?;
        let request = self.authed(self.client.get(url), session)?;
        parse_json_response(request.send().map_err(network_error)?, true)
    }
}

pub fn endpoint(server_url: &str, path: &str) -> KeeperResult<String> {
    let trimmed = server_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(KeeperError::usage("server URL cannot be empty"));
    }
    Ok(format!("{trimmed}{path}"))
}

fn parse_no_content_response(response: Response, authenticated: bool) -> KeeperResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body_text = response.text().unwrap_or_default();
    Err(parse_error_response(status, &body_text, authenticated))
}

fn parse_json_response<T: DeserializeOwned>(
    response: Response,
    authenticated: bool,
) -> KeeperResult<T> {
    let status = response.status();
    let body_text = response.text().unwrap_or_default();

    if !status.is_success() {
        return Err(parse_error_response(status, &body_text, authenticated));
    }

    let value = serde_json::from_str::<Value>(&body_text).map_err(|err| {
        malformed_body("server returned a response that is not valid JSON", authenticated)
            .with_cause(err)
    })?;

    // Some server versions wrap payloads in {"ok": .., "message": ..}.
    if let Some(message) = value.get("message")
        && value.get("ok").is_some()
        && !message.is_null()
        && let Ok(parsed) = serde_json::from_value::<T>(message.clone())
    {
        return Ok(parsed);
    }

    serde_json::from_value::<T>(value).map_err(|err| {
        malformed_body("server response did not match the expected shape", authenticated)
            .with_cause(err)
    })
}

// An unreadable login answer means no session was granted.
fn malformed_body(message: &str, authenticated: bool) -> KeeperError {
    if authenticated {
        KeeperError::api(message)
    } else {
        KeeperError::auth(message)
    }
}

/// Turns a non-2xx answer into a typed error. Session expiry is decided here
/// once so callers only ever look at `ErrorKind`.
fn parse_error_response(status: StatusCode, body_text: &str, authenticated: bool) -> KeeperError {
    let body_trimmed = body_text.trim();
    let parsed = serde_json::from_str::<ErrorEnvelope>(body_trimmed).ok();
    let message = parsed
        .as_ref()
        .and_then(|payload| payload.message.clone().or_else(|| payload.error.clone()))
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            if body_trimmed.is_empty() {
                format!("request failed with status {}", status.as_u16())
            } else {
                truncate_for_error(body_trimmed, 240)
            }
        });
    let cause = format!("http_status={}", status.as_u16());

    if message.to_lowercase().contains(SESSION_EXPIRED_MARKER)
        || (authenticated
            && matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN))
    {
        return KeeperError::session_expired(message).with_cause(cause);
    }

    // Any failed login, whatever the status, leaves the user unauthenticated.
    if !authenticated {
        return KeeperError::auth(message).with_cause(cause);
    }

    KeeperError::api(message).with_cause(cause)
}

fn truncate_for_error(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }

    let truncated: String = input.chars().take(max_chars).collect();
    format!("{truncated}...")
}

fn network_error(err: reqwest::Error) -> KeeperError {
    let message = if err.is_timeout() {
        "request to server timed out"
    } else if err.is_connect() {
        "could not connect to server"
    } else {
        "network request failed"
    };
    KeeperError::network(message).with_cause(err)
}
