use crate::error_handler::ErrorHandler;
use crate::mapper;
use crate::resource::{NetworkBoundResource, ResourceStream};
use keeper_api::{LoginRequest, RemoteApi};
use keeper_core::{KeeperResult, User};
use keeper_store::LocalStore;
use std::sync::Arc;
use tracing::info;

/// Login and logout against the remote service. Both always go to the
/// network, whatever is cached.
#[derive(Clone)]
pub struct AuthRepository {
    api: Arc<dyn RemoteApi>,
    store: Arc<dyn LocalStore>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl AuthRepository {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        store: Arc<dyn LocalStore>,
        error_handler: Arc<dyn ErrorHandler>,
    ) -> Self {
        Self {
            api,
            store,
            error_handler,
        }
    }

    /// Emits `Loading`, then the stored user after a successful login or the
    /// classified failure. Nothing is written unless the server accepted the
    /// credentials.
    pub fn send_login(
        &self,
        username: &str,
        password: &str,
        server_url: &str,
    ) -> ResourceStream<User> {
        let server = normalize_server(server_url);
        let body = LoginRequest {
            username: username.trim().to_string(),
            password: password.to_string(),
        };

        let local_store = Arc::clone(&self.store);
        let save_store = Arc::clone(&self.store);
        let api = Arc::clone(&self.api);
        let remote_server = server.clone();
        let login_name = body.username.clone();
        let password = body.password.clone();

        NetworkBoundResource::new(
            "login",
            Arc::clone(&self.error_handler),
            move || current_user(local_store.as_ref()),
            |_| true,
            move || api.login(&remote_server, &body),
            move |response| {
                let mut record = mapper::session_record(&response);
                if record.user_name.trim().is_empty() {
                    record.user_name = login_name;
                }
                save_store.save_user(&password, &record, &server)?;
                info!(user = %record.user_name, server = %server, "logged in");
                Ok(())
            },
        )
        .spawn()
    }

    /// Ends the session remotely and then clears it locally. Succeeds with an
    /// empty string whenever the server answered at all.
    pub fn send_logout(&self, server_url: &str, session: &str) -> ResourceStream<String> {
        let server = normalize_server(server_url);
        let session = session.to_string();
        let api = Arc::clone(&self.api);
        let store = Arc::clone(&self.store);

        NetworkBoundResource::new(
            "logout",
            Arc::clone(&self.error_handler),
            || Ok(String::new()),
            |_| true,
            move || api.logout(&server, &session),
            move |()| {
                store.reset_user()?;
                info!("logged out");
                Ok(())
            },
        )
        .spawn()
    }

    /// Drops the stored session after the server reported it expired, so the
    /// next command starts from a fresh login.
    pub fn expire_session(&self) -> KeeperResult<()> {
        self.store.reset_user()?;
        info!("stored session expired; login required");
        Ok(())
    }
}

fn current_user(store: &dyn LocalStore) -> KeeperResult<User> {
    store.user().map(|stored| mapper::user_from_stored(&stored))
}

fn normalize_server(server_url: &str) -> String {
    server_url.trim().trim_end_matches('/').to_string()
}
