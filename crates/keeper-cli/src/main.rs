mod commands;

use clap::{Parser, Subcommand};
use keeper_api::ShioriApi;
use keeper_core::{ExitCode, KeeperError, KeeperResult, Resource};
use keeper_fs::{WorkspaceConfig, WorkspacePaths, load_config, resolve_server, resolve_workspace};
use keeper_store::SqliteStore;
use keeper_sync::{
    AuthRepository, BookmarksRepository, DefaultErrorHandler, ErrorHandler, ResourceStream,
    SettingsRepository,
};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "keeper",
    version,
    about = "Command-line client for a self-hosted Shiori bookmark server",
    arg_required_else_help = true
)]
struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    workspace: Option<PathBuf>,

    #[arg(long, global = true)]
    server: Option<String>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    no_color: bool,

    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create or update the `.keeper` workspace.
    Init,
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
    Bookmark {
        #[command(subcommand)]
        command: BookmarkCommand,
    },
    Tag {
        #[command(subcommand)]
        command: TagCommand,
    },
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Debug, Subcommand)]
enum AuthCommand {
    Login {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    Status,
    Logout,
}

#[derive(Debug, Subcommand)]
enum BookmarkCommand {
    List {
        /// Only show bookmarks carrying one of these tags.
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Fetch from the server even when the cache is populated.
        #[arg(long)]
        refresh: bool,
    },
    Add {
        url: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        excerpt: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        public: Option<bool>,
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        archive: Option<bool>,
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        ebook: Option<bool>,
    },
    Edit {
        id: i64,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        excerpt: Option<String>,
        /// Replaces the bookmark's tags.
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        public: Option<bool>,
    },
    Delete {
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Debug, Subcommand)]
enum TagCommand {
    List {
        /// Ask the server instead of reading tags from cached bookmarks.
        #[arg(long)]
        remote: bool,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsCommand {
    Show,
    Set {
        key: String,
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
}

#[derive(Debug, Clone)]
struct GlobalOptions {
    workspace: Option<PathBuf>,
    server: Option<String>,
    json: bool,
}

/// Everything a command needs, wired once per invocation.
struct AppContext {
    paths: WorkspacePaths,
    config: WorkspaceConfig,
    auth: AuthRepository,
    settings: SettingsRepository,
    bookmarks: BookmarksRepository,
}

impl AppContext {
    fn server(&self, globals: &GlobalOptions) -> KeeperResult<String> {
        let stored = self.settings.server_url()?;
        resolve_server(&self.config, globals.server.as_deref(), Some(&stored))
    }

    fn require_session(&self) -> KeeperResult<String> {
        let session = self.settings.session()?;
        if session.is_empty() {
            return Err(KeeperError::auth(
                "not logged in; run `keeper auth login` first",
            ));
        }
        Ok(session)
    }

    /// Follows a repository stream to its terminal state. A session the
    /// server no longer accepts is dropped locally before the error is
    /// reported.
    fn settle<T>(
        &self,
        label: &str,
        stream: ResourceStream<T>,
        globals: &GlobalOptions,
    ) -> KeeperResult<T> {
        self.follow(label, stream, globals).inspect_err(|error| {
            if error.is_session_expired()
                && let Err(reset) = self.auth.expire_session()
            {
                warn!(error = %reset, "failed to clear expired session");
            }
        })
    }

    /// Like `settle`, but never touches the stored session. Login uses this
    /// so a failed attempt leaves the previous session in place.
    fn follow<T>(
        &self,
        label: &str,
        stream: ResourceStream<T>,
        globals: &GlobalOptions,
    ) -> KeeperResult<T> {
        for state in stream {
            match state {
                Resource::Loading => {
                    debug!(operation = label, "waiting for server");
                    if !globals.json {
                        eprintln!("{label}...");
                    }
                }
                Resource::Success(data) => return Ok(data),
                Resource::Error(error) => return Err(error),
            }
        }

        Err(KeeperError::storage(format!(
            "{label} stopped before reporting a result"
        )))
    }
}

#[derive(Debug, Serialize)]
struct InitOutput {
    workspace: String,
    server: String,
    created: Vec<String>,
    updated: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    configure_logging(cli.debug, cli.json, cli.no_color);

    let globals = GlobalOptions {
        workspace: cli.workspace,
        server: cli.server,
        json: cli.json,
    };

    let result = run_command(cli.command, &globals);

    let exit = match result {
        Ok(code) => code,
        Err(error) => {
            render_error(&error, globals.json);
            error.exit_code()
        }
    };

    std::process::exit(exit.as_i32());
}

fn configure_logging(debug: bool, json: bool, no_color: bool) {
    let default_filter = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(false)
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_ansi(!no_color)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn run_command(command: Command, globals: &GlobalOptions) -> KeeperResult<ExitCode> {
    match command {
        Command::Init => commands::settings::cmd_init(globals),
        Command::Auth { command } => commands::auth::cmd_auth(command, globals),
        Command::Bookmark { command } => commands::bookmark::cmd_bookmark(command, globals),
        Command::Tag { command } => commands::bookmark::cmd_tag(command, globals),
        Command::Settings { command } => commands::settings::cmd_settings(command, globals),
    }
}

fn with_app_context<F>(globals: &GlobalOptions, run: F) -> KeeperResult<ExitCode>
where
    F: FnOnce(AppContext) -> KeeperResult<ExitCode>,
{
    let paths = resolve_workspace(globals.workspace.as_deref())?;
    let config = load_config(&paths)?;
    let store = Arc::new(SqliteStore::from_workspace(&paths)?);
    let api = Arc::new(ShioriApi::new(config.request_timeout())?);
    let error_handler: Arc<dyn ErrorHandler> = Arc::new(DefaultErrorHandler);

    run(AppContext {
        auth: AuthRepository::new(api.clone(), store.clone(), Arc::clone(&error_handler)),
        settings: SettingsRepository::new(store.clone()),
        bookmarks: BookmarksRepository::new(api, store, error_handler),
        paths,
        config,
    })
}

fn render_error(error: &KeeperError, json_output: bool) {
    if json_output {
        let payload = json!({
            "ok": false,
            "error": {
                "kind": error.kind,
                "message": &error.message,
                "cause": &error.cause,
            }
        });
        let serialized = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| {
            "{\"ok\":false,\"error\":{\"kind\":\"storage\",\"message\":\"failed to serialize error\"}}".to_string()
        });
        eprintln!("{serialized}");
    } else {
        eprintln!("error: {}", error.message);
        if let Some(cause) = &error.cause {
            debug!(cause = %cause, "error detail");
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> KeeperResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| KeeperError::storage(format!("failed to render JSON output: {err}")))?;
    println!("{rendered}");
    Ok(())
}
