use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Account id used until the server tells us the real one.
pub const UNKNOWN_ACCOUNT_ID: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub user_name: String,
    pub password: String,
    pub owner: bool,
    pub server_url: String,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            id: UNKNOWN_ACCOUNT_ID,
            user_name: String::new(),
            password: String::new(),
            owner: false,
            server_url: String::new(),
        }
    }
}

/// Current session plus the account it belongs to. An empty `session`
/// means nobody is logged in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub session: String,
    pub account: Account,
}

impl User {
    pub fn is_authenticated(&self) -> bool {
        !self.session.is_empty()
    }
}

/// A bookmark category. Tags are identified by name; `selected` only tracks
/// filter state and never reaches the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub selected: bool,
}

impl Tag {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            selected: false,
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub excerpt: String,
    pub author: String,
    pub public: i32,
    pub modified: String,
    pub image_url: String,
    pub has_content: bool,
    pub has_archive: bool,
    pub has_ebook: bool,
    pub create_archive: bool,
    pub create_ebook: bool,
    pub tags: Vec<Tag>,
}

impl Bookmark {
    pub fn is_public(&self) -> bool {
        self.public != 0
    }
}

/// One page of the remote feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookmarksPage {
    pub error: String,
    pub page: i64,
    pub max_page: i64,
    pub bookmarks: Vec<Bookmark>,
}

/// Input for creating a bookmark; the server assigns everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub url: String,
    pub title: String,
    pub excerpt: String,
    pub tags: Vec<Tag>,
    pub public: bool,
    pub create_archive: bool,
    pub create_ebook: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn tags_compare_by_name_only() {
        let mut selected = Tag::named("rust");
        selected.id = 4;
        selected.selected = true;

        assert_eq!(selected, Tag::named("rust"));
        assert_ne!(selected, Tag::named("go"));

        let set: HashSet<Tag> = [selected, Tag::named("rust")].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn default_user_is_unauthenticated_with_unknown_account() {
        let user = User::default();
        assert!(!user.is_authenticated());
        assert_eq!(user.account.id, UNKNOWN_ACCOUNT_ID);
        assert!(user.account.user_name.is_empty());
    }
}
