use assert_cmd::Command;
use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct LoggedIn {
    _temp: TempDir,
    workspace: PathBuf,
}

fn logged_in(server: &MockServer) -> LoggedIn {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path().join("workspace");

    server.mock(|when, then| {
        when.method(POST).path("/api/login");
        then.status(200).json_body(json!({
            "session": "tok-1",
            "account": {"id": 7, "userName": "alice", "isOwner": true}
        }));
    });

    let base_url = server.base_url();
    let mut init = assert_cmd::cargo::cargo_bin_cmd!("keeper");
    init.args(["init", "--json", "--server", base_url.as_str(), "--workspace"])
        .arg(&workspace);
    init.assert().success();

    let mut login = base_command(&workspace);
    login.args(["auth", "login", "--username", "alice", "--password", "pw123", "--json"]);
    login.assert().success();

    LoggedIn {
        _temp: temp,
        workspace,
    }
}

fn base_command(workspace: &Path) -> Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("keeper");
    cmd.current_dir(workspace)
        .env_remove("KEEPER_ENV_FILE")
        .env_remove("KEEPER_USERNAME")
        .env_remove("KEEPER_PASSWORD")
        .env("RUST_LOG", "off")
        .arg("--workspace")
        .arg(workspace);
    cmd
}

fn run_json(workspace: &Path, args: &[&str]) -> Value {
    let mut cmd = base_command(workspace);
    cmd.args(args).arg("--json");
    let assert = cmd.assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    serde_json::from_str(&stdout).expect("json stdout")
}

#[test]
fn list_fetches_once_then_filters_cached_rows_by_tag() {
    let server = MockServer::start();
    let session = logged_in(&server);
    let feed = server.mock(|when, then| {
        when.method(GET)
            .path("/api/bookmarks")
            .header("x-session-id", "tok-1");
        then.status(200).json_body(json!({
            "page": 1,
            "maxPage": 1,
            "bookmarks": [
                {"id": 1, "url": "https://a.example", "title": "A", "tags": [{"name": "rust"}]},
                {"id": 2, "url": "https://b.example", "title": "B", "tags": [{"name": "go"}]},
                {"id": 3, "url": "https://c.example", "title": "C"}
            ]
        }));
    });

    let all = run_json(&session.workspace, &["bookmark", "list"]);
    assert_eq!(all["result"]["count"], 3);

    let filtered = run_json(
        &session.workspace,
        &["bookmark", "list", "--tag", "rust", "--tag", "go"],
    );
    assert_eq!(filtered["result"]["total"], 3);
    let ids: Vec<i64> = filtered["result"]["bookmarks"]
        .as_array()
        .expect("bookmarks")
        .iter()
        .map(|bookmark| bookmark["id"].as_i64().expect("id"))
        .collect();
    assert_eq!(ids, vec![1, 2]);

    let tags = run_json(&session.workspace, &["tag", "list"]);
    assert_eq!(tags["result"]["tags"][0]["name"], "rust");
    assert_eq!(tags["result"]["tags"][1]["name"], "go");

    feed.assert_hits(1);
}

#[test]
fn add_uses_stored_defaults_unless_overridden() {
    let server = MockServer::start();
    let session = logged_in(&server);
    let add = server.mock(|when, then| {
        when.method(POST).path("/api/bookmarks").json_body_partial(
            json!({
                "url": "https://example.com/article",
                "public": 0,
                "createArchive": true,
                "createEbook": false,
                "tags": [{"name": "reading"}]
            })
            .to_string(),
        );
        then.status(200).json_body(json!({
            "id": 42,
            "url": "https://example.com/article",
            "createArchive": true,
            "tags": [{"id": 9, "name": "reading"}]
        }));
    });

    run_json(&session.workspace, &["settings", "set", "create-archive", "true"]);
    run_json(&session.workspace, &["settings", "set", "make_archive_public", "true"]);

    let created = run_json(
        &session.workspace,
        &[
            "bookmark",
            "add",
            "https://example.com/article",
            "--tag",
            "reading",
            "--public",
            "false",
        ],
    );

    add.assert_hits(1);
    assert_eq!(created["result"]["id"], 42);
    assert_eq!(created["result"]["create_archive"], true);
}

#[test]
fn settings_show_lists_every_flag_and_rejects_unknown_keys() {
    let server = MockServer::start();
    let session = logged_in(&server);

    run_json(&session.workspace, &["settings", "set", "dark_theme", "true"]);
    let shown = run_json(&session.workspace, &["settings", "show"]);
    let preferences = &shown["result"]["preferences"];
    assert_eq!(preferences["dark_theme"], true);
    assert_eq!(preferences["compact_view"], false);
    assert_eq!(preferences["create_ebook"], false);
    assert_eq!(shown["result"]["user_name"], "alice");

    let mut cmd = base_command(&session.workspace);
    cmd.args(["settings", "set", "font_size", "true"]);
    let assert = cmd.assert().code(2);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("unknown setting"), "stderr: {stderr}");
}

#[test]
fn bookmark_commands_require_a_session() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = temp.path().join("workspace");
    let mut init = assert_cmd::cargo::cargo_bin_cmd!("keeper");
    init.args(["init", "--server", "https://host", "--workspace"])
        .arg(&workspace);
    init.assert().success();

    let mut cmd = base_command(&workspace);
    cmd.args(["bookmark", "list"]);
    let assert = cmd.assert().code(3);
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("not logged in"), "stderr: {stderr}");
}
