mod config;
mod workspace;

pub use config::{
    CONFIG_VERSION, DEFAULT_TIMEOUT_SECS, WorkspaceConfig, load_config, resolve_server,
    save_config,
};
pub use workspace::{
    WORKSPACE_DIR, WorkspaceInitResult, WorkspacePaths, init_workspace, resolve_workspace,
};
