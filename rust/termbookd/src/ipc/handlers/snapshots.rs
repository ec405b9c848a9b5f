use crate::collab;
use crate::error::TermError;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_optional_str, respond};
use crate::ipc::types::{AppState, Request};
use crate::snapshot;
use serde_json::json;

fn handle_snapshots_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "snapshots": [] }));
    };
    let term_id = get_optional_str(&req.params, "termId");
    let student_id = get_optional_str(&req.params, "studentId");
    let result: Result<_, TermError> =
        snapshot::list_snapshots(conn, term_id.as_deref(), student_id.as_deref())
            .map(|rows| json!({ "snapshots": rows }));
    respond(&req.id, result)
}

fn handle_notifications_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "notifications": [] }));
    };
    let kind = get_optional_str(&req.params, "kind");
    match collab::list_notifications(conn, kind.as_deref()) {
        Ok(rows) => ok(&req.id, json!({ "notifications": rows })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "snapshots.list" => Some(handle_snapshots_list(state, req)),
        "notifications.list" => Some(handle_notifications_list(state, req)),
        _ => None,
    }
}
