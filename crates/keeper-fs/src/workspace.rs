//! A workspace is any directory holding a `.keeper/` folder with
//! `config.toml` and the SQLite state next to it.

use crate::config::{WorkspaceConfig, load_config, save_config};
use keeper_core::{KeeperError, KeeperResult};
use std::fs;
use std::path::{Path, PathBuf};

pub const WORKSPACE_DIR: &str = ".keeper";

#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub keeper_dir: PathBuf,
    pub config_path: PathBuf,
    pub state_db_path: PathBuf,
}

/// What `keeper init` touched, for reporting back to the user.
#[derive(Debug, Clone)]
pub struct WorkspaceInitResult {
    pub paths: WorkspacePaths,
    pub created: Vec<PathBuf>,
    pub updated: Vec<PathBuf>,
}

impl WorkspacePaths {
    /// Paths of the workspace rooted at `dir`, relative to the current
    /// directory, or at the current directory itself.
    pub fn locate(dir: Option<&Path>) -> KeeperResult<Self> {
        let cwd = std::env::current_dir().map_err(|err| {
            KeeperError::storage("failed to resolve the current directory").with_cause(err)
        })?;
        let root = match dir {
            Some(dir) => cwd.join(dir),
            None => cwd,
        };
        let keeper_dir = root.join(WORKSPACE_DIR);

        Ok(Self {
            config_path: keeper_dir.join("config.toml"),
            state_db_path: keeper_dir.join("state.db"),
            root,
            keeper_dir,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.config_path.is_file()
    }
}

/// Creates `.keeper/config.toml` if missing. Running it again only rewrites
/// the config when `server` names a different default.
pub fn init_workspace(
    dir: Option<&Path>,
    server: Option<&str>,
) -> KeeperResult<WorkspaceInitResult> {
    let paths = WorkspacePaths::locate(dir)?;
    let mut created = Vec::new();
    let mut updated = Vec::new();

    if !paths.keeper_dir.is_dir() {
        fs::create_dir_all(&paths.keeper_dir).map_err(|err| {
            KeeperError::storage(format!(
                "failed to create workspace directory '{}'",
                paths.keeper_dir.display()
            ))
            .with_cause(err)
        })?;
        created.push(paths.keeper_dir.clone());
    }

    if paths.is_initialized() {
        let mut config = load_config(&paths)?;
        if server.is_some_and(|server| config.set_server(server)) {
            save_config(&paths, &config)?;
            updated.push(paths.config_path.clone());
        }
    } else {
        let mut config = WorkspaceConfig::default();
        if let Some(server) = server {
            config.set_server(server);
        }
        save_config(&paths, &config)?;
        created.push(paths.config_path.clone());
    }

    Ok(WorkspaceInitResult {
        paths,
        created,
        updated,
    })
}

pub fn resolve_workspace(dir: Option<&Path>) -> KeeperResult<WorkspacePaths> {
    let paths = WorkspacePaths::locate(dir)?;
    if paths.is_initialized() {
        return Ok(paths);
    }

    let root = paths.root.display();
    Err(KeeperError::usage(format!(
        "workspace is not initialized at '{root}'; run `keeper init --workspace {root} --server <url>` first"
    )))
}
