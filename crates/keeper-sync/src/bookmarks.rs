use crate::error_handler::ErrorHandler;
use crate::mapper;
use crate::resource::{NetworkBoundResource, ResourceStream, spawn_task};
use keeper_api::RemoteApi;
use keeper_core::{Bookmark, KeeperResult, NewBookmark, Tag};
use keeper_store::{BookmarkRecord, LocalStore};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct BookmarksRepository {
    api: Arc<dyn RemoteApi>,
    store: Arc<dyn LocalStore>,
    error_handler: Arc<dyn ErrorHandler>,
}

impl BookmarksRepository {
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

    /// Serves the cached feed, going to the server only when `refresh` is set
    /// or nothing is cached yet. A refresh replaces the whole cache.
    pub fn get_bookmarks(
        &self,
        server_url: &str,
        session: &str,
        refresh: bool,
    ) -> ResourceStream<Vec<Bookmark>> {
        let server = server_url.to_string();
        let session = session.to_string();
        let local_server = server.clone();
        let local_store = Arc::clone(&self.store);
        let save_store = Arc::clone(&self.store);
        let api = Arc::clone(&self.api);

        NetworkBoundResource::new(
            "bookmarks",
            Arc::clone(&self.error_handler),
            move || cached_bookmarks(local_store.as_ref(), &local_server),
            move |cached: &Vec<Bookmark>| refresh || cached.is_empty(),
            move || api.bookmarks(&server, &session),
            move |page| {
                let records: Vec<BookmarkRecord> = page
                    .bookmarks
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(mapper::bookmark_record)
                    .collect();
                save_store.replace_bookmarks(&records)
            },
        )
        .spawn()
    }

    pub fn add_bookmark(
        &self,
        server_url: &str,
        session: &str,
        bookmark: NewBookmark,
    ) -> ResourceStream<Bookmark> {
        let server = server_url.to_string();
        let session = session.to_string();
        let api = Arc::clone(&self.api);
        let store = Arc::clone(&self.store);

        spawn_task("add-bookmark", Arc::clone(&self.error_handler), move || {
            let request = mapper::new_bookmark_request(&bookmark);
            let created = api.add_bookmark(&server, &session, &request)?;
            store.upsert_bookmark(&mapper::bookmark_record(&created))?;
            let created = mapper::bookmark_from_dto(&created, &server);
            info!(id = created.id, url = %created.url, "bookmark added");
            Ok(created)
        })
    }

    pub fn edit_bookmark(
        &self,
        server_url: &str,
        session: &str,
        bookmark: Bookmark,
    ) -> ResourceStream<Bookmark> {
        let server = server_url.to_string();
        let session = session.to_string();
        let api = Arc::clone(&self.api);
        let store = Arc::clone(&self.store);

        spawn_task("edit-bookmark", Arc::clone(&self.error_handler), move || {
            let request = mapper::bookmark_request(&bookmark);
            let updated = api.edit_bookmark(&server, &session, &request)?;
            store.upsert_bookmark(&mapper::bookmark_record(&updated))?;
            let updated = mapper::bookmark_from_dto(&updated, &server);
            info!(id = updated.id, "bookmark updated");
            Ok(updated)
        })
    }

    pub fn delete_bookmarks(
        &self,
        server_url: &str,
        session: &str,
        ids: Vec<i64>,
    ) -> ResourceStream<()> {
        let server = server_url.to_string();
        let session = session.to_string();
        let api = Arc::clone(&self.api);
        let store = Arc::clone(&self.store);

        spawn_task("delete-bookmarks", Arc::clone(&self.error_handler), move || {
            api.delete_bookmarks(&server, &session, &ids)?;
            store.remove_bookmarks(&ids)?;
            info!(count = ids.len(), "bookmarks deleted");
            Ok(())
        })
    }

    pub fn get_tags(&self, server_url: &str, session: &str) -> ResourceStream<Vec<Tag>> {
        let server = server_url.to_string();
        let session = session.to_string();
        let api = Arc::clone(&self.api);

        spawn_task("tags", Arc::clone(&self.error_handler), move || {
            let tags = api.tags(&server, &session)?;
            debug!(count = tags.len(), "fetched tags");
            Ok(tags.iter().map(mapper::tag_from_dto).collect())
        })
    }

    /// Distinct tags across the cached feed, in first-seen order.
    pub fn available_tags(&self) -> KeeperResult<Vec<Tag>> {
        let mut seen = HashSet::new();
        let mut tags = Vec::new();
        for record in self.store.cached_bookmarks()? {
            for tag in record.tags {
                if seen.insert(tag.name.clone()) {
                    tags.push(Tag {
                        id: tag.id,
                        name: tag.name,
                        selected: false,
                    });
                }
            }
        }
        Ok(tags)
    }
}

fn cached_bookmarks(store: &dyn LocalStore, server_url: &str) -> KeeperResult<Vec<Bookmark>> {
    Ok(store
        .cached_bookmarks()?
        .iter()
        .map(|record| mapper::bookmark_from_record(record, server_url))
        .collect())
}

/// Bookmarks carrying at least one of the selected tags. An empty selection
/// keeps everything.
pub fn filter_by_tags(bookmarks: &[Bookmark], selected: &[Tag]) -> Vec<Bookmark> {
    if selected.is_empty() {
        return bookmarks.to_vec();
    }

    bookmarks
        .iter()
        .filter(|bookmark| bookmark.tags.iter().any(|tag| selected.contains(tag)))
        .cloned()
        .collect()
}

/// Adds `tag` to the selection, or removes it if a tag with that name is
/// already selected.
pub fn toggle_tag(selected: &mut Vec<Tag>, tag: Tag) {
    if let Some(index) = selected.iter().position(|existing| *existing == tag) {
        selected.remove(index);
    } else {
        selected.push(Tag {
            selected: true,
            ..tag
        });
    }
}
