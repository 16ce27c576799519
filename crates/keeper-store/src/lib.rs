mod credentials;
mod feed;
mod records;

pub use credentials::{
    ENV_FILE_VAR, EnvCredentials, PASSWORD_VAR, USERNAME_VAR, resolve_env_credentials,
};
pub use feed::UserStream;
pub use records::{BookmarkRecord, PreferenceFlag, SessionRecord, StoredUser, TagRecord};

use chrono::Utc;
use feed::UserFeed;
use keeper_core::{KeeperError, KeeperResult};
use keeper_fs::WorkspacePaths;
use rusqlite::{Connection, Error as SqlError, ErrorCode, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const USER_SLOT: i64 = 1;

/// Local persistence the sync layer depends on. Each method is one atomic
/// store operation; nothing spans two calls.
pub trait LocalStore: Send + Sync {
    fn user(&self) -> KeeperResult<StoredUser>;

    /// Stream starting with the current user, then every later write.
    fn subscribe_user(&self) -> KeeperResult<UserStream>;

    fn save_user(
        &self,
        password: &str,
        session: &SessionRecord,
        server_url: &str,
    ) -> KeeperResult<()>;

    fn reset_user(&self) -> KeeperResult<()>;

    fn preference(&self, flag: PreferenceFlag) -> KeeperResult<bool>;

    fn set_preference(&self, flag: PreferenceFlag, value: bool) -> KeeperResult<()>;

    fn cached_bookmarks(&self) -> KeeperResult<Vec<BookmarkRecord>>;

    fn replace_bookmarks(&self, bookmarks: &[BookmarkRecord]) -> KeeperResult<()>;

    fn upsert_bookmark(&self, bookmark: &BookmarkRecord) -> KeeperResult<()>;

    fn remove_bookmarks(&self, ids: &[i64]) -> KeeperResult<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
    feed: Arc<UserFeed>,
}

impl SqliteStore {
    pub fn from_workspace(paths: &WorkspacePaths) -> KeeperResult<Self> {
        Self::open(&paths.state_db_path)
    }

    pub fn open(db_path: &Path) -> KeeperResult<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
            feed: Arc::new(UserFeed::default()),
        };

        let conn = store.connection()?;
        store.initialize_schema(&conn)?;

        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Number of live user streams.
    pub fn subscriber_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    /// Replaces the user row. The bookmark cache belongs to one account on one
    /// server, so it is dropped in the same transaction whenever the session
    /// ends or the row switches to someone else.
    fn write_user(&self, user: &StoredUser, action: &str) -> KeeperResult<()> {
        let payload = serde_json::to_string(user)
            .map_err(|err| KeeperError::storage(format!("failed to serialize user: {err}")))?;

        self.feed.publish(|| {
            let mut conn = self.connection()?;
            let transaction = conn
                .transaction()
                .map_err(|err| sqlite_error(action, &self.db_path, err))?;

            let previous = transaction
                .query_row(
                    "SELECT payload_json FROM user_record WHERE slot = ?1",
                    params![USER_SLOT],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .map_err(|err| sqlite_error(action, &self.db_path, err))?
                .and_then(|payload| serde_json::from_str::<StoredUser>(&payload).ok())
                .unwrap_or_default();

            transaction
                .execute(
                    "INSERT INTO user_record (slot, payload_json, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(slot) DO UPDATE SET payload_json = excluded.payload_json, updated_at = excluded.updated_at",
                    params![USER_SLOT, payload, Utc::now().to_rfc3339()],
                )
                .map_err(|err| sqlite_error(action, &self.db_path, err))?;

            let switched = user.session.is_empty()
                || previous.user_name != user.user_name
                || previous.server_url != user.server_url;
            if switched {
                let cleared = transaction
                    .execute("DELETE FROM bookmarks", [])
                    .map_err(|err| sqlite_error("clear cached bookmarks", &self.db_path, err))?;
                if cleared > 0 {
                    debug!(cleared, "dropped bookmark cache of previous account");
                }
            }

            transaction
                .commit()
                .map_err(|err| sqlite_error(action, &self.db_path, err))?;
            Ok(user.clone())
        })
    }

    fn connection(&self) -> KeeperResult<Connection> {
        let conn = Connection::open(&self.db_path)
            .map_err(|err| sqlite_error("open state database", &self.db_path, err))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|err| sqlite_error("configure busy timeout", &self.db_path, err))?;
        Ok(conn)
    }

    fn initialize_schema(&self, conn: &Connection) -> KeeperResult<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             CREATE TABLE IF NOT EXISTS user_record (
                 slot INTEGER PRIMARY KEY CHECK (slot = 1),
                 payload_json TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS preferences (
                 key TEXT PRIMARY KEY,
                 value INTEGER NOT NULL,
                 updated_at TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS bookmarks (
                 id INTEGER PRIMARY KEY,
                 position INTEGER NOT NULL,
                 payload_json TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             );",
        )
        .map_err(|err| sqlite_error("initialize schema", &self.db_path, err))?;

        Ok(())
    }
}

impl LocalStore for SqliteStore {
    fn user(&self) -> KeeperResult<StoredUser> {
        let conn = self.connection()?;
        let payload = conn
            .query_row(
                "SELECT payload_json FROM user_record WHERE slot = ?1",
                params![USER_SLOT],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|err| sqlite_error("load user", &self.db_path, err))?;

        let Some(payload) = payload else {
            return Ok(StoredUser::default());
        };

        serde_json::from_str::<StoredUser>(&payload).map_err(|err| {
            KeeperError::storage(format!(
                "failed to parse stored user in '{}': {}",
                self.db_path.display(),
                err
            ))
        })
    }

    fn subscribe_user(&self) -> KeeperResult<UserStream> {
        self.feed.subscribe(|| self.user())
    }

    fn save_user(
        &self,
        password: &str,
        session: &SessionRecord,
        server_url: &str,
    ) -> KeeperResult<()> {
        if !session.session.is_empty() && session.user_name.trim().is_empty() {
            return Err(KeeperError::usage(
                "refusing to store a session without a user name",
            ));
        }

        let user = StoredUser {
            session: session.session.clone(),
            id: session.id,
            user_name: session.user_name.clone(),
            password: password.to_string(),
            owner: session.owner,
            server_url: server_url.to_string(),
        };
        self.write_user(&user, "save user")?;
        info!(user = %user.user_name, server = %user.server_url, "stored session");
        Ok(())
    }

    fn reset_user(&self) -> KeeperResult<()> {
        self.write_user(&StoredUser::default(), "reset user")?;
        info!("cleared stored session");
        Ok(())
    }

    fn preference(&self, flag: PreferenceFlag) -> KeeperResult<bool> {
        let conn = self.connection()?;
        let value = conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![flag.key()],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(|err| sqlite_error("load preference", &self.db_path, err))?;

        Ok(value.is_some_and(|value| value != 0))
    }

    fn set_preference(&self, flag: PreferenceFlag, value: bool) -> KeeperResult<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![flag.key(), i64::from(value), Utc::now().to_rfc3339()],
        )
        .map_err(|err| sqlite_error("save preference", &self.db_path, err))?;

        debug!(key = flag.key(), value, "preference updated");
        Ok(())
    }

    fn cached_bookmarks(&self) -> KeeperResult<Vec<BookmarkRecord>> {
        let conn = self.connection()?;
        let mut statement = conn
            .prepare("SELECT payload_json FROM bookmarks ORDER BY position ASC, id DESC")
            .map_err(|err| sqlite_error("prepare cached bookmarks query", &self.db_path, err))?;

        let rows = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|err| sqlite_error("query cached bookmarks", &self.db_path, err))?;

        let mut bookmarks = Vec::new();
        for row in rows {
            let payload =
                row.map_err(|err| sqlite_error("read cached bookmark row", &self.db_path, err))?;
            let parsed = serde_json::from_str::<BookmarkRecord>(&payload).map_err(|err| {
                KeeperError::storage(format!(
                    "failed to parse cached bookmark in '{}': {}",
                    self.db_path.display(),
                    err
                ))
            })?;
            bookmarks.push(parsed);
        }

        Ok(bookmarks)
    }

    fn replace_bookmarks(&self, bookmarks: &[BookmarkRecord]) -> KeeperResult<()> {
        let mut conn = self.connection()?;
        let transaction = conn.transaction().map_err(|err| {
            sqlite_error("start cached bookmarks transaction", &self.db_path, err)
        })?;

        transaction
            .execute("DELETE FROM bookmarks", [])
            .map_err(|err| sqlite_error("clear cached bookmarks", &self.db_path, err))?;

        let now = Utc::now().to_rfc3339();
        for (position, bookmark) in bookmarks.iter().enumerate() {
            let payload = serde_json::to_string(bookmark).map_err(|err| {
                KeeperError::storage(format!("failed to encode cached bookmark: {err}"))
            })?;
            transaction
                .execute(
                    "INSERT OR REPLACE INTO bookmarks (id, position, payload_json, updated_at) VALUES (?1, ?2, ?3, ?4)",
                    params![bookmark.id, position as i64, payload, now],
                )
                .map_err(|err| sqlite_error("insert cached bookmark", &self.db_path, err))?;
        }

        transaction.commit().map_err(|err| {
            sqlite_error("commit cached bookmarks transaction", &self.db_path, err)
        })?;

        debug!(count = bookmarks.len(), "replaced bookmark cache");
        Ok(())
    }

    fn upsert_bookmark(&self, bookmark: &BookmarkRecord) -> KeeperResult<()> {
        let payload = serde_json::to_string(bookmark).map_err(|err| {
            KeeperError::storage(format!("failed to encode cached bookmark: {err}"))
        })?;

        // New rows go to the top of the feed; existing rows keep their place.
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO bookmarks (id, position, payload_json, updated_at)
             VALUES (?1, (SELECT COALESCE(MIN(position), 0) - 1 FROM bookmarks), ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET payload_json = excluded.payload_json, updated_at = excluded.updated_at",
            params![bookmark.id, payload, Utc::now().to_rfc3339()],
        )
        .map_err(|err| sqlite_error("upsert cached bookmark", &self.db_path, err))?;

        Ok(())
    }

    fn remove_bookmarks(&self, ids: &[i64]) -> KeeperResult<()> {
        let mut conn = self.connection()?;
        let transaction = conn.transaction().map_err(|err| {
            sqlite_error("start bookmark removal transaction", &self.db_path, err)
        })?;

        for id in ids {
            transaction
                .execute("DELETE FROM bookmarks WHERE id = ?1", params![id])
                .map_err(|err| sqlite_error("remove cached bookmark", &self.db_path, err))?;
        }

        transaction.commit().map_err(|err| {
            sqlite_error("commit bookmark removal transaction", &self.db_path, err)
        })?;

        Ok(())
    }
}

fn sqlite_error(action: &str, db_path: &Path, err: SqlError) -> KeeperError {
    if let SqlError::SqliteFailure(code, message) = &err
        && (code.code == ErrorCode::DatabaseCorrupt || code.code == ErrorCode::NotADatabase)
    {
        let detail = message.as_deref().unwrap_or("sqlite reported corruption");
        return KeeperError::storage(format!(
            "failed to {action}: state database '{}' is corrupted ({detail}); remove '.keeper/state.db' and log in again to rebuild it",
            db_path.display()
        ));
    }

    KeeperError::storage(format!(
        "failed to {action} using state database '{}'",
        db_path.display()
    ))
    .with_cause(err)
}
