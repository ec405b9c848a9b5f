use crate::error::TermError;
use crate::ipc::error::{err, ok};
use crate::session::Session;
use serde::de::DeserializeOwned;

pub fn respond(id: &str, result: Result<serde_json::Value, TermError>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => err(id, e.code(), e.to_string(), e.details()),
    }
}

pub fn no_workspace(id: &str) -> serde_json::Value {
    err(id, "no_workspace", "select a workspace first", None)
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, TermError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| TermError::BadParams(format!("missing {}", key)))
}

pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn parse_session(params: &serde_json::Value) -> Result<Session, TermError> {
    let raw = params
        .get("session")
        .ok_or_else(|| TermError::BadParams("missing session".into()))?;
    serde_json::from_value(raw.clone())
        .map_err(|e| TermError::BadParams(format!("invalid session: {e}")))
}

pub fn parse_params<T: DeserializeOwned>(params: &serde_json::Value) -> Result<T, TermError> {
    serde_json::from_value(params.clone()).map_err(|e| TermError::BadParams(e.to_string()))
}
