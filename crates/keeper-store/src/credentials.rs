use keeper_core::{KeeperError, KeeperResult};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const USERNAME_VAR: &str = "KEEPER_USERNAME";
pub const PASSWORD_VAR: &str = "KEEPER_PASSWORD";
pub const ENV_FILE_VAR: &str = "KEEPER_ENV_FILE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvCredentials {
    pub username: String,
    pub password: String,
}

/// Looks for login credentials in the process environment, then in the
/// nearest `.env` file above the current directory or the workspace.
pub fn resolve_env_credentials(workspace_root: &Path) -> KeeperResult<Option<EnvCredentials>> {
    if let Some(creds) = credentials_from_env() {
        return Ok(Some(creds));
    }

    if let Some(path) = resolve_env_file(workspace_root) {
        let values = load_env_file(&path)?;
        let username = values.get(USERNAME_VAR).cloned();
        let password = values.get(PASSWORD_VAR).cloned();

        if let (Some(username), Some(password)) = (username, password)
            && !username.trim().is_empty()
            && !password.is_empty()
        {
            return Ok(Some(EnvCredentials { username, password }));
        }
    }

    Ok(None)
}

fn credentials_from_env() -> Option<EnvCredentials> {
    let username = std::env::var(USERNAME_VAR).ok()?;
    let password = std::env::var(PASSWORD_VAR).ok()?;

    if username.trim().is_empty() || password.is_empty() {
        return None;
    }

    Some(EnvCredentials { username, password })
}

fn resolve_env_file(workspace_root: &Path) -> Option<PathBuf> {
    if let Ok(path) = std::env::var(ENV_FILE_VAR) {
        let candidate = PathBuf::from(path);
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    if let Ok(cwd) = std::env::current_dir()
        && let Some(found) = search_upwards_for(&cwd, Path::new(".env"))
    {
        return Some(found);
    }

    search_upwards_for(workspace_root, Path::new(".env"))
}

fn search_upwards_for(start: &Path, relative_path: &Path) -> Option<PathBuf> {
    let mut cursor = Some(start);

    while let Some(path) = cursor {
        let candidate = path.join(relative_path);
        if candidate.is_file() {
            return Some(candidate);
        }
        cursor = path.parent();
    }

    None
}

fn load_env_file(path: &Path) -> KeeperResult<BTreeMap<String, String>> {
    let raw = fs::read_to_string(path).map_err(|err| {
        KeeperError::storage(format!(
            "failed to read env file '{}': {}",
            path.display(),
            err
        ))
    })?;

    Ok(parse_env(&raw))
}

fn parse_env(raw: &str) -> BTreeMap<String, String> {
    let mut vars = BTreeMap::new();
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
        let Some((key, value)) = trimmed.split_once('=') else {
            continue;
        };

        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let mut value = value.trim().to_string();
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            value = value[1..value.len() - 1].to_string();
        }

        vars.insert(key.to_string(), value);
    }

    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_file_parsing_handles_quotes_comments_and_export() {
        let vars = parse_env(
            "# login\nKEEPER_USERNAME=\"alice\"\nexport KEEPER_PASSWORD='p=w#1'\nBROKEN\n=x\n",
        );

        assert_eq!(vars.get(USERNAME_VAR).map(String::as_str), Some("alice"));
        assert_eq!(vars.get(PASSWORD_VAR).map(String::as_str), Some("p=w#1"));
        assert_eq!(vars.len(), 2);
    }
}
