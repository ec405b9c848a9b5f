use crate::collab::Collaborators;
use crate::db;
use crate::deletion;
use crate::error::TermError;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    get_optional_str, get_required_str, no_workspace, parse_params, parse_session, respond,
};
use crate::ipc::types::{AppState, Request};
use crate::term::{self, TermDraft};
use crate::transition::{self, TransitionRequest};
use rusqlite::Connection;
use serde_json::json;
use tracing::info;

fn handle_terms_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "terms": [] }));
    };
    respond(
        &req.id,
        term::list_terms(conn).map(|terms| {
            json!({ "terms": terms.iter().map(|t| t.to_json()).collect::<Vec<_>>() })
        }),
    )
}

fn handle_terms_current(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(
        &req.id,
        term::current_term(conn).map(|t| json!({ "term": t.map(|t| t.to_json()) })),
    )
}

fn handle_terms_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let result = get_required_str(&req.params, "termId")
        .and_then(|id| term::require_term(conn, &id))
        .map(|t| json!({ "term": t.to_json() }));
    respond(&req.id, result)
}

/// Creates the very first term. Every later term comes from `terms.transition`.
fn handle_terms_setup(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    match setup_first_term(conn, &req.params) {
        Ok(Some(v)) => ok(&req.id, v),
        Ok(None) => err(
            &req.id,
            "terms_exist",
            "terms already exist; use terms.transition to open the next term",
            None,
        ),
        Err(e) => respond(&req.id, Err(e)),
    }
}

fn setup_first_term(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<Option<serde_json::Value>, TermError> {
    let session = parse_session(params)?;
    session.require_admin()?;
    let term_number = params
        .get("termNumber")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| TermError::BadParams("missing termNumber".into()))?;
    let draft = TermDraft::validate(
        get_optional_str(params, "name").as_deref(),
        term_number,
        &get_required_str(params, "startDate")?,
        get_optional_str(params, "endDate").as_deref(),
        &get_required_str(params, "academicYear")?,
    )?;
    if term::count_terms(conn)? > 0 {
        return Ok(None);
    }
    let t = term::insert_open_term(conn, &draft, &db::now_rfc3339())?;
    info!(actor = %session.actor_id, term_id = %t.id, "initial term created");
    Ok(Some(json!({ "term": t.to_json() })))
}

fn handle_terms_mark_invoice_sent(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(&req.id, mark_invoice_sent(conn, &req.params))
}

fn mark_invoice_sent(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, TermError> {
    parse_session(params)?.require_admin()?;
    let term_id = get_required_str(params, "termId")?;
    let date = get_required_str(params, "date")?;
    let t = term::mark_invoice_sent(conn, &term_id, &date)?;
    Ok(json!({ "term": t.to_json() }))
}

fn handle_terms_transition(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(&req.id, run_transition(conn, &state.collaborators, &req.params))
}

fn run_transition(
    conn: &Connection,
    collab: &Collaborators,
    params: &serde_json::Value,
) -> Result<serde_json::Value, TermError> {
    let session = parse_session(params)?;
    let tr: TransitionRequest = parse_params(params)?;
    let summary = transition::transition_term(conn, &session, &tr, collab)?;
    Ok(json!(summary))
}

fn handle_terms_prepare_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    let result = get_required_str(&req.params, "termId")
        .and_then(|id| deletion::prepare_deletion(conn, &id))
        .map(|impact| json!(impact));
    respond(&req.id, result)
}

fn handle_terms_confirm_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(&req.id, confirm_delete(conn, &req.params))
}

fn confirm_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, TermError> {
    let session = parse_session(params)?;
    let term_id = get_required_str(params, "termId")?;
    let typed = get_required_str(params, "confirmation")?;
    let impact = deletion::confirm_deletion(conn, &session, &term_id, &typed)?;
    Ok(json!({ "deleted": true, "impact": impact }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "terms.list" => Some(handle_terms_list(state, req)),
        "terms.current" => Some(handle_terms_current(state, req)),
        "terms.get" => Some(handle_terms_get(state, req)),
        "terms.setup" => Some(handle_terms_setup(state, req)),
        "terms.markInvoiceSent" => Some(handle_terms_mark_invoice_sent(state, req)),
        "terms.transition" => Some(handle_terms_transition(state, req)),
        "terms.prepareDelete" => Some(handle_terms_prepare_delete(state, req)),
        "terms.confirmDelete" => Some(handle_terms_confirm_delete(state, req)),
        _ => None,
    }
}
