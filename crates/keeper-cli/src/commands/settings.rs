use keeper_core::{ExitCode, KeeperError, KeeperResult};
use keeper_fs::{init_workspace, load_config};
use keeper_store::{PreferenceFlag, SqliteStore};
use serde_json::{Map, Value, json};

use crate::{GlobalOptions, InitOutput, SettingsCommand, print_json, with_app_context};

pub(crate) fn cmd_init(globals: &GlobalOptions) -> KeeperResult<ExitCode> {
    let mut init = init_workspace(globals.workspace.as_deref(), globals.server.as_deref())?;

    let db_existed = init.paths.state_db_path.exists();
    SqliteStore::from_workspace(&init.paths)?;
    if !db_existed {
        init.created.push(init.paths.state_db_path.clone());
    }

    let config = load_config(&init.paths)?;
    let output = InitOutput {
        workspace: init.paths.root.display().to_string(),
        server: config.server,
        created: init
            .created
            .iter()
            .map(|path| path.display().to_string())
            .collect(),
        updated: init
            .updated
            .iter()
            .map(|path| path.display().to_string())
            .collect(),
    };

    if globals.json {
        print_json(&json!({"ok": true, "result": output}))?;
    } else {
        println!("Workspace ready: {}", output.workspace);
        if output.server.is_empty() {
            println!("Server: (not set; pass --server <url>)");
        } else {
            println!("Server: {}", output.server);
        }
        for path in &output.created {
            println!("Created: {path}");
        }
        for path in &output.updated {
            println!("Updated: {path}");
        }
    }

    Ok(ExitCode::Success)
}

pub(crate) fn cmd_settings(
    command: SettingsCommand,
    globals: &GlobalOptions,
) -> KeeperResult<ExitCode> {
    with_app_context(globals, |ctx| match command {
        SettingsCommand::Show => {
            let user = ctx.settings.get_user()?;
            let mut flags = Map::new();
            for flag in PreferenceFlag::ALL {
                flags.insert(
                    flag.key().to_string(),
                    Value::Bool(ctx.settings.preference(flag)?),
                );
            }

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {
                        "server": ctx.config.server,
                        "session_server": user.account.server_url,
                        "user_name": user.account.user_name,
                        "request_timeout_secs": ctx.config.request_timeout_secs,
                        "preferences": flags,
                    }
                }))?;
            } else {
                println!("Workspace: {}", ctx.paths.root.display());
                println!("Configured server: {}", ctx.config.server);
                if user.is_authenticated() {
                    println!(
                        "Logged in as {} on {}",
                        user.account.user_name, user.account.server_url
                    );
                }
                for (key, value) in &flags {
                    println!("{key} = {value}");
                }
            }

            Ok(ExitCode::Success)
        }
        SettingsCommand::Set { key, value } => {
            let flag = PreferenceFlag::from_key(&key).ok_or_else(|| {
                let known: Vec<&str> = PreferenceFlag::ALL.iter().map(|flag| flag.key()).collect();
                KeeperError::usage(format!(
                    "unknown setting '{key}'; expected one of: {}",
                    known.join(", ")
                ))
            })?;

            if flag == PreferenceFlag::DarkTheme {
                ctx.settings.set_theme(value)?;
            } else {
                ctx.settings.set_preference(flag, value)?;
            }

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {"key": flag.key(), "value": value}
                }))?;
            } else {
                println!("{} = {}", flag.key(), value);
            }

            Ok(ExitCode::Success)
        }
    })
}
