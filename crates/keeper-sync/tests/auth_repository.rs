use httpmock::Method::POST;
use httpmock::MockServer;
use keeper_api::{DEFAULT_TIMEOUT, ShioriApi};
use keeper_core::{Account, ErrorKind, Resource, User};
use keeper_fs::init_workspace;
use keeper_store::{LocalStore, SessionRecord, SqliteStore};
use keeper_sync::{AuthRepository, DefaultErrorHandler, SettingsRepository};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    _temp: tempfile::TempDir,
    store: Arc<SqliteStore>,
    auth: AuthRepository,
    settings: SettingsRepository,
}

fn harness() -> Harness {
    let temp = tempfile::tempdir().expect("tempdir");
    let init = init_workspace(Some(&temp.path().join("ws")), None).expect("init workspace");
    let store = Arc::new(SqliteStore::from_workspace(&init.paths).expect("store"));
    let api = Arc::new(ShioriApi::new(DEFAULT_TIMEOUT).expect("api"));

    Harness {
        _temp: temp,
        auth: AuthRepository::new(api, store.clone(), Arc::new(DefaultErrorHandler)),
        settings: SettingsRepository::new(store.clone()),
        store,
    }
}

fn mock_login(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(POST)
            .path("/api/login")
            .json_body(json!({"username": "alice", "password": "pw123"}));
        then.status(200).json_body(json!({
            "session": "tok-1",
            "account": {"id": 7, "userName": "alice", "isOwner": true}
        }));
    })
}

fn stored_alice(store: &SqliteStore, server_url: &str) {
    store
        .save_user(
            "pw123",
            &SessionRecord {
                session: "tok-0".to_string(),
                id: 7,
                user_name: "alice".to_string(),
                owner: true,
            },
            server_url,
        )
        .expect("seed user");
}

#[test]
fn login_persists_session_and_reports_stored_user() {
    let server = MockServer::start();
    let login = mock_login(&server);
    let harness = harness();

    let states: Vec<_> = harness
        .auth
        .send_login("alice", "pw123", &format!("{}/", server.base_url()))
        .collect();

    login.assert_hits(1);
    let expected = User {
        session: "tok-1".to_string(),
        account: Account {
            id: 7,
            user_name: "alice".to_string(),
            password: "pw123".to_string(),
            owner: true,
            server_url: server.base_url(),
        },
    };
    assert_eq!(states, vec![Resource::Loading, Resource::Success(expected.clone())]);
    assert_eq!(harness.settings.get_user().expect("user"), expected);
    assert_eq!(harness.settings.get_user_name().expect("name"), "alice");
}

#[test]
fn login_always_hits_the_network_even_with_a_cached_user() {
    let server = MockServer::start();
    let login = mock_login(&server);
    let harness = harness();
    stored_alice(&harness.store, &server.base_url());

    let user = harness
        .auth
        .send_login("alice", "pw123", &server.base_url())
        .wait()
        .expect("login");

    login.assert_hits(1);
    assert_eq!(user.session, "tok-1");
}

#[test]
fn login_falls_back_to_the_typed_username() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/login");
        then.status(200).json_body(json!({"session": "tok-9"}));
    });
    let harness = harness();

    let user = harness
        .auth
        .send_login("carol", "pw", &server.base_url())
        .wait()
        .expect("login");

    assert_eq!(user.session, "tok-9");
    assert_eq!(user.account.user_name, "carol");
    assert_eq!(user.account.id, -1);
}

#[test]
fn unreachable_server_yields_one_error_and_keeps_prior_session() {
    let harness = harness();
    stored_alice(&harness.store, "http://127.0.0.1:1");

    let states: Vec<_> = harness
        .auth
        .send_login("alice", "pw123", "http://127.0.0.1:1")
        .collect();

    assert_eq!(states.len(), 2);
    assert_eq!(states[0], Resource::Loading);
    let errors: Vec<_> = states
        .iter()
        .filter_map(|state| match state {
            Resource::Error(error) => Some(error),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, ErrorKind::Network);
    assert_eq!(harness.settings.session().expect("session"), "tok-0");
}

#[test]
fn rejected_credentials_do_not_touch_the_store() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/login");
        then.status(401)
            .json_body(json!({"message": "username and password do not match"}));
    });
    let harness = harness();

    let error = harness
        .auth
        .send_login("alice", "wrong", &server.base_url())
        .wait()
        .expect_err("login rejected");

    assert_eq!(error.kind, ErrorKind::Auth);
    assert!(!harness.settings.get_user().expect("user").is_authenticated());
}

#[test]
fn logout_sends_session_header_and_clears_local_state() {
    let server = MockServer::start();
    let logout = server.mock(|when, then| {
        when.method(POST)
            .path("/api/logout")
            .header("x-session-id", "tok-0");
        then.status(200).json_body(json!({"ok": true}));
    });
    let harness = harness();
    stored_alice(&harness.store, &server.base_url());

    let states: Vec<_> = harness
        .auth
        .send_logout(&server.base_url(), "tok-0")
        .collect();

    logout.assert_hits(1);
    assert_eq!(states, vec![Resource::Loading, Resource::Success(String::new())]);
    let user = harness.settings.get_user().expect("user");
    assert_eq!(user, User::default());
}

// The server's status is ignored on logout: any answer clears local state.
#[test]
fn logout_with_server_error_still_clears_local_state() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/logout");
        then.status(500).body("internal error");
    });
    let harness = harness();
    stored_alice(&harness.store, &server.base_url());

    let result = harness.auth.send_logout(&server.base_url(), "tok-0").wait();

    assert_eq!(result, Ok(String::new()));
    assert!(harness.settings.session().expect("session").is_empty());
}

#[test]
fn logout_transport_failure_keeps_the_session() {
    let harness = harness();
    stored_alice(&harness.store, "http://127.0.0.1:1");

    let error = harness
        .auth
        .send_logout("http://127.0.0.1:1", "tok-0")
        .wait()
        .expect_err("logout fails");

    assert_eq!(error.kind, ErrorKind::Network);
    assert_eq!(harness.settings.session().expect("session"), "tok-0");
}

#[test]
fn expiring_the_session_resets_the_user_and_notifies_streams() {
    let harness = harness();
    stored_alice(&harness.store, "https://host");
    let stream = harness.settings.user_data_stream().expect("stream");
    let first = stream
        .next_timeout(Duration::from_secs(1))
        .expect("current");
    assert_eq!(first.session, "tok-0");

    harness.auth.expire_session().expect("expire");

    let next = stream
        .next_timeout(Duration::from_secs(1))
        .expect("reset");
    assert!(!next.is_authenticated());
}
