use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountDto {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, rename = "username", alias = "userName")]
    pub user_name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default, rename = "owner", alias = "isOwner")]
    pub is_owner: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionDto {
    #[serde(default)]
    pub session: Option<String>,
    #[serde(default)]
    pub account: Option<AccountDto>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkDto {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub public: Option<i32>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default, rename = "imageURL")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub has_content: Option<bool>,
    #[serde(default)]
    pub has_archive: Option<bool>,
    #[serde(default)]
    pub has_ebook: Option<bool>,
    #[serde(default)]
    pub tags: Option<Vec<TagDto>>,
    #[serde(default)]
    pub create_archive: Option<bool>,
    #[serde(default)]
    pub create_ebook: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarksDto {
    #[serde(default)]
    pub bookmarks: Option<Vec<BookmarkDto>>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub max_page: Option<i64>,
}

/// Body for `POST /api/bookmarks` (no id) and `PUT /api/bookmarks` (with id).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub url: String,
    pub title: String,
    pub excerpt: String,
    pub public: i32,
    pub tags: Vec<TagDto>,
    pub create_archive: bool,
    pub create_ebook: bool,
}
