use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, no_workspace, parse_session, respond};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::{info, warn};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match open_workspace(state, &path) {
        Ok(()) => ok(&req.id, json!({ "workspacePath": path.to_string_lossy() })),
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

pub fn open_workspace(state: &mut AppState, path: &std::path::Path) -> anyhow::Result<()> {
    match db::open_db(path) {
        Ok(conn) => {
            state.workspace = Some(path.to_path_buf());
            state.db = Some(conn);
            info!(workspace = %path.display(), "workspace opened");
            Ok(())
        }
        Err(e) => {
            warn!(workspace = %path.display(), error = %e, "workspace open failed");
            Err(e)
        }
    }
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let key = match get_required_str(&req.params, "key") {
        Ok(k) => k,
        Err(e) => return respond(&req.id, Err(e)),
    };
    match db::settings_get_json(conn, &key) {
        Ok(value) => ok(&req.id, json!({ "key": key, "value": value })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_settings_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let checked = parse_session(&req.params)
        .and_then(|s| s.require_admin())
        .and_then(|_| get_required_str(&req.params, "key"));
    let key = match checked {
        Ok(k) => k,
        Err(e) => return respond(&req.id, Err(e)),
    };
    let Some(value) = req.params.get("value") else {
        return err(&req.id, "bad_params", "missing value", None);
    };
    match db::settings_set_json(conn, &key, value) {
        Ok(()) => ok(&req.id, json!({ "key": key, "value": value })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.set" => Some(handle_settings_set(state, req)),
        _ => None,
    }
}
