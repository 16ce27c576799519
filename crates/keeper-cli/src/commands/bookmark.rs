use keeper_core::{Bookmark, ExitCode, KeeperError, KeeperResult, NewBookmark, Tag};
use keeper_sync::{filter_by_tags, toggle_tag};
use serde_json::json;

use crate::{BookmarkCommand, GlobalOptions, TagCommand, print_json, with_app_context};

pub(crate) fn cmd_bookmark(
    command: BookmarkCommand,
    globals: &GlobalOptions,
) -> KeeperResult<ExitCode> {
    with_app_context(globals, |ctx| {
        let session = ctx.require_session()?;
        let server = ctx.server(globals)?;

        match command {
            BookmarkCommand::List { tags, refresh } => {
                let stream = ctx.bookmarks.get_bookmarks(&server, &session, refresh);
                let bookmarks = ctx.settle("Loading bookmarks", stream, globals)?;

                let mut selected = Vec::new();
                for name in tags {
                    let tag = Tag::named(name.trim());
                    if !tag.name.is_empty() && !selected.contains(&tag) {
                        toggle_tag(&mut selected, tag);
                    }
                }
                let visible = filter_by_tags(&bookmarks, &selected);

                if globals.json {
                    print_json(&json!({
                        "ok": true,
                        "result": {
                            "total": bookmarks.len(),
                            "count": visible.len(),
                            "bookmarks": visible,
                        }
                    }))?;
                } else if visible.is_empty() {
                    println!("No bookmarks.");
                } else {
                    let compact = ctx.settings.compact_view()?;
                    for bookmark in &visible {
                        print_bookmark(bookmark, compact);
                    }
                }

                Ok(ExitCode::Success)
            }
            BookmarkCommand::Add {
                url,
                title,
                excerpt,
                tags,
                public,
                archive,
                ebook,
            } => {
                if url.trim().is_empty() {
                    return Err(KeeperError::usage("bookmark URL cannot be empty"));
                }

                let defaults = ctx.settings.bookmark_defaults()?;
                let bookmark = NewBookmark {
                    url,
                    title: title.unwrap_or_default(),
                    excerpt: excerpt.unwrap_or_default(),
                    tags: tag_list(tags),
                    public: public.unwrap_or(defaults.public),
                    create_archive: archive.unwrap_or(defaults.create_archive),
                    create_ebook: ebook.unwrap_or(defaults.create_ebook),
                };

                let stream = ctx.bookmarks.add_bookmark(&server, &session, bookmark);
                let created = ctx.settle("Saving bookmark", stream, globals)?;

                if globals.json {
                    print_json(&json!({"ok": true, "result": created}))?;
                } else {
                    println!("Added bookmark {}: {}", created.id, created.url);
                }

                Ok(ExitCode::Success)
            }
            BookmarkCommand::Edit {
                id,
                url,
                title,
                excerpt,
                tags,
                public,
            } => {
                let stream = ctx.bookmarks.get_bookmarks(&server, &session, false);
                let cached = ctx.settle("Loading bookmarks", stream, globals)?;
                let mut bookmark = cached
                    .into_iter()
                    .find(|bookmark| bookmark.id == id)
                    .ok_or_else(|| {
                        KeeperError::usage(format!(
                            "bookmark {id} is not in the local cache; run `keeper bookmark list --refresh` first"
                        ))
                    })?;

                if let Some(url) = url {
                    bookmark.url = url;
                }
                if let Some(title) = title {
                    bookmark.title = title;
                }
                if let Some(excerpt) = excerpt {
                    bookmark.excerpt = excerpt;
                }
                if !tags.is_empty() {
                    bookmark.tags = tag_list(tags);
                }
                if let Some(public) = public {
                    bookmark.public = i32::from(public);
                }

                let stream = ctx.bookmarks.edit_bookmark(&server, &session, bookmark);
                let updated = ctx.settle("Saving bookmark", stream, globals)?;

                if globals.json {
                    print_json(&json!({"ok": true, "result": updated}))?;
                } else {
                    println!("Updated bookmark {}: {}", updated.id, updated.title);
                }

                Ok(ExitCode::Success)
            }
            BookmarkCommand::Delete { ids } => {
                let count = ids.len();
                let stream = ctx.bookmarks.delete_bookmarks(&server, &session, ids);
                ctx.settle("Deleting bookmarks", stream, globals)?;

                if globals.json {
                    print_json(&json!({"ok": true, "result": {"deleted": count}}))?;
                } else {
                    println!("Deleted {count} bookmark(s).");
                }

                Ok(ExitCode::Success)
            }
        }
    })
}

pub(crate) fn cmd_tag(command: TagCommand, globals: &GlobalOptions) -> KeeperResult<ExitCode> {
    with_app_context(globals, |ctx| match command {
        TagCommand::List { remote } => {
            let tags = if remote {
                let session = ctx.require_session()?;
                let server = ctx.server(globals)?;
                let stream = ctx.bookmarks.get_tags(&server, &session);
                ctx.settle("Loading tags", stream, globals)?
            } else {
                ctx.bookmarks.available_tags()?
            };

            if globals.json {
                print_json(&json!({"ok": true, "result": {"tags": tags}}))?;
            } else if tags.is_empty() {
                println!("No tags.");
            } else {
                for tag in &tags {
                    println!("{}", tag.name);
                }
            }

            Ok(ExitCode::Success)
        }
    })
}

fn tag_list(names: Vec<String>) -> Vec<Tag> {
    let mut tags: Vec<Tag> = Vec::new();
    for name in names {
        let tag = Tag::named(name.trim());
        if !tag.name.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

fn print_bookmark(bookmark: &Bookmark, compact: bool) {
    if compact {
        println!("{}\t{}", bookmark.id, bookmark.url);
        return;
    }

    let title = if bookmark.title.is_empty() {
        bookmark.url.as_str()
    } else {
        bookmark.title.as_str()
    };
    println!("[{}] {}", bookmark.id, title);
    println!("    {}", bookmark.url);
    if !bookmark.tags.is_empty() {
        let names: Vec<&str> = bookmark.tags.iter().map(|tag| tag.name.as_str()).collect();
        println!("    tags: {}", names.join(", "));
    }
}
