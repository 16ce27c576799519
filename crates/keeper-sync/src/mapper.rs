//! Conversions between wire objects, cached rows and domain entities.
//!
//! Every function here is total: missing fields fall back to documented
//! defaults and nothing can fail.

use keeper_api::{
    AccountDto, BookmarkDto, BookmarkRequest, BookmarksDto, LoginRequest, SessionDto, TagDto,
};
use keeper_core::{
    Account, Bookmark, BookmarksPage, NewBookmark, Tag, UNKNOWN_ACCOUNT_ID, User,
};
use keeper_store::{BookmarkRecord, SessionRecord, StoredUser, TagRecord};

pub fn user_from_session(dto: &SessionDto) -> User {
    User {
        session: dto.session.clone().unwrap_or_default(),
        account: dto
            .account
            .as_ref()
            .map(account_from_dto)
            .unwrap_or_default(),
    }
}

/// The login response does not echo the server URL and its id is not trusted
/// until persisted, so both are left unknown here.
pub fn account_from_dto(dto: &AccountDto) -> Account {
    Account {
        id: UNKNOWN_ACCOUNT_ID,
        user_name: dto.user_name.clone().unwrap_or_default(),
        password: dto.password.clone().unwrap_or_default(),
        owner: dto.is_owner.unwrap_or(false),
        server_url: String::new(),
    }
}

pub fn session_record(dto: &SessionDto) -> SessionRecord {
    let account = dto.account.as_ref();
    SessionRecord {
        session: dto.session.clone().unwrap_or_default(),
        id: account
            .and_then(|account| account.id)
            .unwrap_or(UNKNOWN_ACCOUNT_ID),
        user_name: account
            .and_then(|account| account.user_name.clone())
            .unwrap_or_default(),
        owner: account
            .and_then(|account| account.is_owner)
            .unwrap_or(false),
    }
}

pub fn user_from_stored(stored: &StoredUser) -> User {
    User {
        session: stored.session.clone(),
        account: Account {
            id: stored.id,
            user_name: stored.user_name.clone(),
            password: stored.password.clone(),
            owner: stored.owner,
            server_url: stored.server_url.clone(),
        },
    }
}

pub fn login_body(account: &Account) -> LoginRequest {
    LoginRequest {
        username: account.user_name.clone(),
        password: account.password.clone(),
    }
}

pub fn tag_from_dto(dto: &TagDto) -> Tag {
    Tag {
        id: dto.id.unwrap_or(0),
        name: dto.name.clone().unwrap_or_default(),
        selected: false,
    }
}

pub fn bookmark_from_dto(dto: &BookmarkDto, server_url: &str) -> Bookmark {
    Bookmark {
        id: dto.id.unwrap_or(0),
        url: dto.url.clone().unwrap_or_default(),
        title: dto.title.clone().unwrap_or_default(),
        excerpt: dto.excerpt.clone().unwrap_or_default(),
        author: dto.author.clone().unwrap_or_default(),
        public: dto.public.unwrap_or(0),
        modified: dto.modified.clone().unwrap_or_default(),
        image_url: image_url(server_url, dto.image_url.as_deref()),
        has_content: dto.has_content.unwrap_or(false),
        has_archive: dto.has_archive.unwrap_or(false),
        has_ebook: dto.has_ebook.unwrap_or(false),
        create_archive: dto.create_archive.unwrap_or(false),
        create_ebook: dto.create_ebook.unwrap_or(false),
        tags: dto
            .tags
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(tag_from_dto)
            .collect(),
    }
}

pub fn bookmarks_page_from_dto(dto: &BookmarksDto, server_url: &str) -> BookmarksPage {
    BookmarksPage {
        error: String::new(),
        page: dto.page.unwrap_or(0),
        max_page: dto.max_page.unwrap_or(0),
        bookmarks: dto
            .bookmarks
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|bookmark| bookmark_from_dto(bookmark, server_url))
            .collect(),
    }
}

pub fn bookmark_record(dto: &BookmarkDto) -> BookmarkRecord {
    BookmarkRecord {
        id: dto.id.unwrap_or(0),
        url: dto.url.clone().unwrap_or_default(),
        title: dto.title.clone().unwrap_or_default(),
        excerpt: dto.excerpt.clone().unwrap_or_default(),
        author: dto.author.clone().unwrap_or_default(),
        public: dto.public.unwrap_or(0),
        modified: dto.modified.clone().unwrap_or_default(),
        image_url: dto.image_url.clone().filter(|url| !url.trim().is_empty()),
        has_content: dto.has_content.unwrap_or(false),
        has_archive: dto.has_archive.unwrap_or(false),
        has_ebook: dto.has_ebook.unwrap_or(false),
        create_archive: dto.create_archive.unwrap_or(false),
        create_ebook: dto.create_ebook.unwrap_or(false),
        tags: dto
            .tags
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|tag| TagRecord {
                id: tag.id.unwrap_or(0),
                name: tag.name.clone().unwrap_or_default(),
            })
            .collect(),
    }
}

pub fn bookmark_from_record(record: &BookmarkRecord, server_url: &str) -> Bookmark {
    Bookmark {
        id: record.id,
        url: record.url.clone(),
        title: record.title.clone(),
        excerpt: record.excerpt.clone(),
        author: record.author.clone(),
        public: record.public,
        modified: record.modified.clone(),
        image_url: image_url(server_url, record.image_url.as_deref()),
        has_content: record.has_content,
        has_archive: record.has_archive,
        has_ebook: record.has_ebook,
        create_archive: record.create_archive,
        create_ebook: record.create_ebook,
        tags: record
            .tags
            .iter()
            .map(|tag| Tag {
                id: tag.id,
                name: tag.name.clone(),
                selected: false,
            })
            .collect(),
    }
}

pub fn bookmark_request(bookmark: &Bookmark) -> BookmarkRequest {
    BookmarkRequest {
        id: Some(bookmark.id),
        url: bookmark.url.clone(),
        title: bookmark.title.clone(),
        excerpt: bookmark.excerpt.clone(),
        public: bookmark.public,
        tags: tag_dtos(&bookmark.tags),
        create_archive: bookmark.create_archive,
        create_ebook: bookmark.create_ebook,
    }
}

pub fn new_bookmark_request(bookmark: &NewBookmark) -> BookmarkRequest {
    BookmarkRequest {
        id: None,
        url: bookmark.url.trim().to_string(),
        title: bookmark.title.clone(),
        excerpt: bookmark.excerpt.clone(),
        public: i32::from(bookmark.public),
        tags: tag_dtos(&bookmark.tags),
        create_archive: bookmark.create_archive,
        create_ebook: bookmark.create_ebook,
    }
}

fn tag_dtos(tags: &[Tag]) -> Vec<TagDto> {
    tags.iter()
        .map(|tag| TagDto {
            id: None,
            name: Some(tag.name.clone()),
        })
        .collect()
}

/// Resolves a thumbnail path against the server. A missing fragment stays
/// empty instead of turning into "<server>null"; absolute URLs are kept.
pub fn image_url(server_url: &str, fragment: Option<&str>) -> String {
    let Some(fragment) = fragment.map(str::trim).filter(|value| !value.is_empty()) else {
        return String::new();
    };

    if fragment.starts_with("http://") || fragment.starts_with("https://") {
        return fragment.to_string();
    }

    let server = server_url.trim().trim_end_matches('/');
    if server.is_empty() {
        return fragment.to_string();
    }

    format!("{server}/{}", fragment.trim_start_matches('/'))
}
