use crate::db;
use crate::error::TermError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_str, get_required_str, no_workspace, parse_session, respond};
use crate::ipc::types::{AppState, Request};
use crate::student::{self, RecordKind};
use crate::term;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };
    let enrolled_only = req
        .params
        .get("enrolledOnly")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    respond(
        &req.id,
        student::list_students(conn, enrolled_only).map(|students| json!({ "students": students })),
    )
}

fn handle_students_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let result = get_required_str(&req.params, "studentId")
        .and_then(|id| student::require_student(conn, &id))
        .map(|s| json!({ "student": s }));
    respond(&req.id, result)
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(&req.id, create_student(conn, &req.params))
}

fn create_student(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, TermError> {
    parse_session(params)?.require_admin()?;
    let name = get_required_str(params, "name")?;
    let grade = get_required_str(params, "grade")?;
    let enrolled = params
        .get("enrolled")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let s = student::create_student(conn, &name, &grade, enrolled, &db::now_rfc3339())?;
    Ok(json!({ "studentId": s.id, "student": s }))
}

fn handle_records_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(&req.id, add_record(conn, &req.params))
}

/// New activity goes to the explicit `termId`, else the current term, else no term.
fn add_record(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, TermError> {
    parse_session(params)?.require_staff()?;
    let kind_raw = get_required_str(params, "kind")?;
    let kind = RecordKind::parse(&kind_raw)
        .ok_or_else(|| TermError::BadParams(format!("unknown record kind: {kind_raw}")))?;
    let student_id = get_required_str(params, "studentId")?;
    student::require_student(conn, &student_id)?;

    let date = get_required_str(params, "date")?;
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| TermError::BadParams(format!("date must be YYYY-MM-DD (got {date:?})")))?;
    let detail = get_optional_str(params, "detail").unwrap_or_else(|| match kind {
        RecordKind::Attendance => "present".to_string(),
        _ => String::new(),
    });

    let term_id = match get_optional_str(params, "termId") {
        Some(id) => Some(term::require_term(conn, &id)?.id),
        None => term::current_term(conn)?.map(|t| t.id),
    };

    let record_id = student::add_record(
        conn,
        kind,
        &student_id,
        term_id.as_deref(),
        date.trim(),
        &detail,
    )?;
    Ok(json!({
        "recordId": record_id,
        "kind": kind.as_str(),
        "termId": term_id,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.get" => Some(handle_students_get(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "records.add" => Some(handle_records_add(state, req)),
        _ => None,
    }
}
