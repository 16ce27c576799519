use keeper_core::{ExitCode, KeeperError, KeeperResult};
use keeper_store::{EnvCredentials, resolve_env_credentials};
use serde_json::json;
use std::path::Path;

use crate::{AppContext, AuthCommand, GlobalOptions, print_json, with_app_context};

pub(crate) fn cmd_auth(command: AuthCommand, globals: &GlobalOptions) -> KeeperResult<ExitCode> {
    with_app_context(globals, |ctx| match command {
        AuthCommand::Login { username, password } => {
            let credentials = login_credentials(username, password, &ctx.paths.root)?;
            let server = ctx.server(globals)?;

            let stream = ctx
                .auth
                .send_login(&credentials.username, &credentials.password, &server);
            let user = ctx.follow("Logging in", stream, globals)?;

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {
                        "server": user.account.server_url,
                        "user_name": user.account.user_name,
                        "account_id": user.account.id,
                        "owner": user.account.owner,
                    }
                }))?;
            } else {
                println!("Logged in to {}", user.account.server_url);
                println!("User: {}", user.account.user_name);
                println!("Session saved: {}", ctx.paths.state_db_path.display());
            }

            Ok(ExitCode::Success)
        }
        AuthCommand::Status => {
            let user = ctx.settings.get_user()?;

            if !user.is_authenticated() {
                if globals.json {
                    print_json(&json!({
                        "ok": false,
                        "result": {
                            "authenticated": false,
                            "reason": "no stored session",
                        }
                    }))?;
                } else {
                    println!("Authenticated: no");
                    println!("Reason: no stored session");
                }
                return Ok(ExitCode::Auth);
            }

            if globals.json {
                print_json(&json!({
                    "ok": true,
                    "result": {
                        "authenticated": true,
                        "server": user.account.server_url,
                        "user_name": user.account.user_name,
                        "account_id": user.account.id,
                        "owner": user.account.owner,
                    }
                }))?;
            } else {
                println!("Server: {}", user.account.server_url);
                println!("Authenticated: yes");
                println!("User: {}", user.account.user_name);
                println!("Owner: {}", if user.account.owner { "yes" } else { "no" });
            }

            Ok(ExitCode::Success)
        }
        AuthCommand::Logout => logout(&ctx, globals),
    })
}

fn logout(ctx: &AppContext, globals: &GlobalOptions) -> KeeperResult<ExitCode> {
    let user = ctx.settings.get_user()?;
    if !user.is_authenticated() {
        if globals.json {
            print_json(&json!({"ok": true, "result": {"logged_out": false}}))?;
        } else {
            println!("No active session.");
        }
        return Ok(ExitCode::Success);
    }

    let server = ctx.server(globals)?;
    let stream = ctx.auth.send_logout(&server, &user.session);
    ctx.settle("Logging out", stream, globals)?;

    if globals.json {
        print_json(&json!({
            "ok": true,
            "result": {"logged_out": true, "server": server}
        }))?;
    } else {
        println!("Logged out of {server}");
    }

    Ok(ExitCode::Success)
}

fn login_credentials(
    username: Option<String>,
    password: Option<String>,
    workspace_root: &Path,
) -> KeeperResult<EnvCredentials> {
    let credentials = match (username, password) {
        (Some(username), Some(password)) => Some(EnvCredentials { username, password }),
        (username, password) => {
            resolve_env_credentials(workspace_root)?.map(|env| EnvCredentials {
                username: username.unwrap_or(env.username),
                password: password.unwrap_or(env.password),
            })
        }
    };

    match credentials {
        Some(credentials)
            if !credentials.username.trim().is_empty() && !credentials.password.is_empty() =>
        {
            Ok(credentials)
        }
        _ => Err(KeeperError::auth(
            "missing credentials; pass --username/--password or set KEEPER_USERNAME and KEEPER_PASSWORD in the environment or .env",
        )),
    }
}
