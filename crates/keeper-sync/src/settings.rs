use crate::mapper;
use keeper_core::{KeeperResult, User};
use keeper_store::{LocalStore, PreferenceFlag, UserStream};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Defaults applied to the add-bookmark form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BookmarkDefaults {
    pub public: bool,
    pub create_archive: bool,
    pub create_ebook: bool,
}

/// Read/write access to the stored user and the preference flags. Every call
/// is a single store operation.
#[derive(Clone)]
pub struct SettingsRepository {
    store: Arc<dyn LocalStore>,
}

impl SettingsRepository {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// The user as currently stored; the same value a new stream starts with.
    pub fn get_user(&self) -> KeeperResult<User> {
        Ok(mapper::user_from_stored(&self.store.user()?))
    }

    pub fn get_user_name(&self) -> KeeperResult<String> {
        Ok(self.get_user()?.account.user_name)
    }

    pub fn server_url(&self) -> KeeperResult<String> {
        Ok(self.get_user()?.account.server_url)
    }

    pub fn session(&self) -> KeeperResult<String> {
        Ok(self.get_user()?.session)
    }

    pub fn user_data_stream(&self) -> KeeperResult<UserDataStream> {
        Ok(UserDataStream {
            inner: self.store.subscribe_user()?,
        })
    }

    pub fn set_theme(&self, dark: bool) -> KeeperResult<()> {
        self.store.set_preference(PreferenceFlag::DarkTheme, dark)
    }

    pub fn is_dark_theme(&self) -> KeeperResult<bool> {
        self.store.preference(PreferenceFlag::DarkTheme)
    }

    pub fn preference(&self, flag: PreferenceFlag) -> KeeperResult<bool> {
        self.store.preference(flag)
    }

    pub fn set_preference(&self, flag: PreferenceFlag, value: bool) -> KeeperResult<()> {
        self.store.set_preference(flag, value)
    }

    pub fn make_archive_public(&self) -> KeeperResult<bool> {
        self.store.preference(PreferenceFlag::MakeArchivePublic)
    }

    pub fn set_make_archive_public(&self, value: bool) -> KeeperResult<()> {
        self.store.set_preference(PreferenceFlag::MakeArchivePublic, value)
    }

    pub fn create_archive(&self) -> KeeperResult<bool> {
        self.store.preference(PreferenceFlag::CreateArchive)
    }

    pub fn set_create_archive(&self, value: bool) -> KeeperResult<()> {
        self.store.set_preference(PreferenceFlag::CreateArchive, value)
    }

    pub fn create_ebook(&self) -> KeeperResult<bool> {
        self.store.preference(PreferenceFlag::CreateEbook)
    }

    pub fn set_create_ebook(&self, value: bool) -> KeeperResult<()> {
        self.store.set_preference(PreferenceFlag::CreateEbook, value)
    }

    pub fn compact_view(&self) -> KeeperResult<bool> {
        self.store.preference(PreferenceFlag::CompactView)
    }

    pub fn set_compact_view(&self, value: bool) -> KeeperResult<()> {
        self.store.set_preference(PreferenceFlag::CompactView, value)
    }

    pub fn bookmark_defaults(&self) -> KeeperResult<BookmarkDefaults> {
        Ok(BookmarkDefaults {
            public: self.make_archive_public()?,
            create_archive: self.create_archive()?,
            create_ebook: self.create_ebook()?,
        })
    }
}

/// Live [`User`] updates: the current user first, then one value per write.
#[derive(Debug)]
pub struct UserDataStream {
    inner: UserStream,
}

impl UserDataStream {
    pub fn next_timeout(&self, timeout: Duration) -> Option<User> {
        self.inner
            .next_timeout(timeout)
            .map(|stored| mapper::user_from_stored(&stored))
    }
}

impl Iterator for UserDataStream {
    type Item = User;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|stored| mapper::user_from_stored(&stored))
    }
}
