//! Session-authenticated sync between the remote bookmark API and the local
//! store.
//!
//! Repositories never block the caller: each operation runs on its own worker
//! thread and reports back through a [`ResourceStream`].

mod auth;
mod bookmarks;
mod error_handler;
pub mod mapper;
mod resource;
mod settings;

pub use auth::AuthRepository;
pub use bookmarks::{BookmarksRepository, filter_by_tags, toggle_tag};
pub use error_handler::{DefaultErrorHandler, ErrorHandler, SESSION_EXPIRED_MESSAGE};
pub use resource::{NetworkBoundResource, ResourceStream, spawn_task};
pub use settings::{BookmarkDefaults, SettingsRepository, UserDataStream};
