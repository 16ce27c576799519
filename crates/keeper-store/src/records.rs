use keeper_core::UNKNOWN_ACCOUNT_ID;
use serde::{Deserialize, Serialize};

/// The single persisted user row: session, credentials and server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredUser {
    #[serde(default)]
    pub session: String,
    #[serde(default = "unknown_id")]
    pub id: i64,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub owner: bool,
    #[serde(default)]
    pub server_url: String,
}

fn unknown_id() -> i64 {
    UNKNOWN_ACCOUNT_ID
}

impl Default for StoredUser {
    fn default() -> Self {
        Self {
            session: String::new(),
            id: UNKNOWN_ACCOUNT_ID,
            user_name: String::new(),
            password: String::new(),
            owner: false,
            server_url: String::new(),
        }
    }
}

/// What a login response contributes to [`StoredUser`]; password and server
/// come from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session: String,
    pub id: i64,
    pub user_name: String,
    pub owner: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
}

/// Cached bookmark row. `image_url` is the raw fragment from the server,
/// joined with the server URL only when read back into the domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub excerpt: String,
    pub author: String,
    pub public: i32,
    pub modified: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub has_content: bool,
    pub has_archive: bool,
    #[serde(default)]
    pub has_ebook: bool,
    pub create_archive: bool,
    #[serde(default)]
    pub create_ebook: bool,
    #[serde(default)]
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PreferenceFlag {
    DarkTheme,
    MakeArchivePublic,
    CreateArchive,
    CreateEbook,
    CompactView,
}

impl PreferenceFlag {
    pub const ALL: [PreferenceFlag; 5] = [
        PreferenceFlag::DarkTheme,
        PreferenceFlag::MakeArchivePublic,
        PreferenceFlag::CreateArchive,
        PreferenceFlag::CreateEbook,
        PreferenceFlag::CompactView,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PreferenceFlag::DarkTheme => "dark_theme",
            PreferenceFlag::MakeArchivePublic => "make_archive_public",
            PreferenceFlag::CreateArchive => "create_archive",
            PreferenceFlag::CreateEbook => "create_ebook",
            PreferenceFlag::CompactView => "compact_view",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.key() == key.trim().replace('-', "_"))
    }
}
