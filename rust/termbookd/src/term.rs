use crate::error::{Result, TermError};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

/// Stored in place of an end date that is not known yet.
pub const END_DATE_SENTINEL: &str = "2099-12-31";
pub const END_DATE_UNSET_LABEL: &str = "Not set";

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TermState {
    Open,
    Closed,
}

impl TermState {
    fn from_db(s: &str) -> TermState {
        if s == "open" {
            TermState::Open
        } else {
            TermState::Closed
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Term {
    pub id: String,
    pub name: String,
    pub term_number: i64,
    pub start_date: String,
    pub end_date: String,
    pub academic_year: String,
    pub state: TermState,
    pub invoice_sent: bool,
    pub invoice_sent_date: Option<String>,
    pub created_at: String,
    pub closed_at: Option<String>,
}

impl Term {
    pub fn is_current(&self) -> bool {
        self.state == TermState::Open
    }

    pub fn end_date_display(&self) -> &str {
        display_end_date(&self.end_date)
    }

    /// Wire shape: the stored fields plus the derived `isCurrent` and `endDateDisplay`.
    pub fn to_json(&self) -> serde_json::Value {
        let mut v = json!(self);
        v["isCurrent"] = json!(self.is_current());
        v["endDateDisplay"] = json!(self.end_date_display());
        v
    }
}

pub fn display_end_date(end_date: &str) -> &str {
    if end_date == END_DATE_SENTINEL {
        END_DATE_UNSET_LABEL
    } else {
        end_date
    }
}

/// A new term's fields after validation; nothing is written until this exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermDraft {
    pub name: String,
    pub term_number: i64,
    pub start_date: String,
    pub end_date: String,
    pub academic_year: String,
}

impl TermDraft {
    pub fn validate(
        name: Option<&str>,
        term_number: i64,
        start_date: &str,
        end_date: Option<&str>,
        academic_year: &str,
    ) -> Result<TermDraft> {
        if !(1..=4).contains(&term_number) {
            return Err(TermError::InvalidTermNumber(term_number));
        }
        let academic_year = academic_year.trim();
        if academic_year.is_empty() {
            return Err(TermError::BadParams(
                "academic year must not be empty".into(),
            ));
        }
        let start_date = start_date.trim();
        if start_date.is_empty() {
            return Err(TermError::BadParams("start date must not be empty".into()));
        }
        let start = parse_date("start date", start_date)?;

        let end_date = match end_date.map(str::trim).filter(|s| !s.is_empty()) {
            None => END_DATE_SENTINEL.to_string(),
            Some(raw) => {
                let end = parse_date("end date", raw)?;
                if end < start {
                    return Err(TermError::BadParams(format!(
                        "end date {raw} is before start date {start_date}"
                    )));
                }
                end.format(DATE_FORMAT).to_string()
            }
        };

        let name = match name.map(str::trim).filter(|s| !s.is_empty()) {
            Some(n) => n.to_string(),
            None => default_term_name(term_number, academic_year),
        };

        Ok(TermDraft {
            name,
            term_number,
            start_date: start.format(DATE_FORMAT).to_string(),
            end_date,
            academic_year: academic_year.to_string(),
        })
    }
}

pub fn default_term_name(term_number: i64, academic_year: &str) -> String {
    format!("Term {} - {}", term_number, academic_year)
}

fn parse_date(field: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| TermError::BadParams(format!("{field} must be YYYY-MM-DD (got {raw:?})")))
}

const TERM_COLUMNS: &str = "id, name, term_number, start_date, end_date, academic_year, state,
     invoice_sent, invoice_sent_date, created_at, closed_at";

fn term_from_row(r: &Row<'_>) -> rusqlite::Result<Term> {
    let state: String = r.get(6)?;
    Ok(Term {
        id: r.get(0)?,
        name: r.get(1)?,
        term_number: r.get(2)?,
        start_date: r.get(3)?,
        end_date: r.get(4)?,
        academic_year: r.get(5)?,
        state: TermState::from_db(&state),
        invoice_sent: r.get::<_, i64>(7)? != 0,
        invoice_sent_date: r.get(8)?,
        created_at: r.get(9)?,
        closed_at: r.get(10)?,
    })
}

pub fn get_term(conn: &Connection, term_id: &str) -> Result<Option<Term>> {
    let sql = format!("SELECT {TERM_COLUMNS} FROM terms WHERE id = ?");
    Ok(conn.query_row(&sql, [term_id], term_from_row).optional()?)
}

pub fn require_term(conn: &Connection, term_id: &str) -> Result<Term> {
    get_term(conn, term_id)?.ok_or_else(|| TermError::NotFound(format!("term {term_id} not found")))
}

pub fn current_term(conn: &Connection) -> Result<Option<Term>> {
    let sql = format!("SELECT {TERM_COLUMNS} FROM terms WHERE state = 'open'");
    Ok(conn.query_row(&sql, [], term_from_row).optional()?)
}

pub fn find_by_period(
    conn: &Connection,
    term_number: i64,
    academic_year: &str,
) -> Result<Option<Term>> {
    let sql = format!(
        "SELECT {TERM_COLUMNS} FROM terms WHERE term_number = ? AND academic_year = ?"
    );
    Ok(conn
        .query_row(&sql, (term_number, academic_year), term_from_row)
        .optional()?)
}

/// Newest first.
pub fn list_terms(conn: &Connection) -> Result<Vec<Term>> {
    let sql = format!(
        "SELECT {TERM_COLUMNS} FROM terms ORDER BY academic_year DESC, term_number DESC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let terms = stmt
        .query_map([], term_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(terms)
}

pub fn count_terms(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM terms", [], |r| r.get(0))?)
}

/// Inserts `draft` as the open term. The caller must have closed any previously open term.
pub fn insert_open_term(
    conn: &Connection,
    draft: &TermDraft,
    created_at: &str,
) -> Result<Term> {
    let id = Uuid::new_v4().to_string();
    let res = conn.execute(
        "INSERT INTO terms(
           id, name, term_number, start_date, end_date, academic_year, state, created_at)
         VALUES(?, ?, ?, ?, ?, ?, 'open', ?)",
        (
            &id,
            &draft.name,
            draft.term_number,
            &draft.start_date,
            &draft.end_date,
            &draft.academic_year,
            created_at,
        ),
    );
    match res {
        Ok(_) => require_term(conn, &id),
        Err(e) if TermError::is_constraint_violation(&e) => Err(TermError::DuplicateTerm {
            term_number: draft.term_number,
            academic_year: draft.academic_year.clone(),
        }),
        Err(e) => Err(e.into()),
    }
}

pub fn close_term(conn: &Connection, term_id: &str, closed_at: &str) -> Result<()> {
    let changed = conn.execute(
        "UPDATE terms SET state = 'closed', closed_at = ? WHERE id = ? AND state = 'open'",
        (closed_at, term_id),
    )?;
    if changed == 0 {
        return Err(TermError::NoCurrentTerm(term_id.to_string()));
    }
    Ok(())
}

pub fn mark_invoice_sent(conn: &Connection, term_id: &str, sent_date: &str) -> Result<Term> {
    let sent = parse_date("invoice date", sent_date.trim())?;
    let changed = conn.execute(
        "UPDATE terms SET invoice_sent = 1, invoice_sent_date = ? WHERE id = ?",
        (sent.format(DATE_FORMAT).to_string(), term_id),
    )?;
    if changed == 0 {
        return Err(TermError::NotFound(format!("term {term_id} not found")));
    }
    require_term(conn, term_id)
}

pub fn delete_term(conn: &Connection, term_id: &str) -> Result<()> {
    conn.execute("DELETE FROM terms WHERE id = ?", [term_id])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn draft(n: i64, year: &str) -> TermDraft {
        TermDraft::validate(None, n, "2026-01-01", None, year).expect("valid draft")
    }

    #[test]
    fn validate_fills_defaults() {
        let d = draft(1, "2026");
        assert_eq!(d.name, "Term 1 - 2026");
        assert_eq!(d.end_date, END_DATE_SENTINEL);

        let d = TermDraft::validate(
            Some("  Autumn "),
            2,
            "2026-04-01",
            Some("2026-06-30"),
            " 2026 ",
        )
        .expect("valid");
        assert_eq!(d.name, "Autumn");
        assert_eq!(d.end_date, "2026-06-30");
        assert_eq!(d.academic_year, "2026");
    }

    #[test]
    fn validate_rejects_bad_input() {
        let e = TermDraft::validate(None, 5, "2026-01-01", None, "2026").expect_err("5");
        assert_eq!(e.code(), "invalid_term_number");
        let e = TermDraft::validate(None, 0, "2026-01-01", None, "2026").expect_err("0");
        assert_eq!(e.code(), "invalid_term_number");
        let e = TermDraft::validate(None, 1, "", None, "2026").expect_err("start");
        assert_eq!(e.code(), "bad_params");
        let e = TermDraft::validate(None, 1, "2026-01-01", None, "  ").expect_err("year");
        assert_eq!(e.code(), "bad_params");
        let e = TermDraft::validate(None, 1, "01/02/2026", None, "2026").expect_err("format");
        assert_eq!(e.code(), "bad_params");
        let e = TermDraft::validate(None, 1, "2026-03-01", Some("2026-02-01"), "2026")
            .expect_err("end before start");
        assert_eq!(e.code(), "bad_params");
    }

    #[test]
    fn sentinel_end_date_renders_as_not_set() {
        assert_eq!(display_end_date(END_DATE_SENTINEL), "Not set");
        assert_eq!(display_end_date("2026-03-31"), "2026-03-31");

        let conn = db::open_in_memory().expect("open");
        let t = insert_open_term(&conn, &draft(1, "2026"), "2026-01-01T00:00:00Z").expect("insert");
        let v = t.to_json();
        assert_eq!(v["endDate"], "2099-12-31");
        assert_eq!(v["endDateDisplay"], "Not set");
        assert_eq!(v["isCurrent"], true);
        assert_eq!(v["state"], "open");
    }

    #[test]
    fn duplicate_period_maps_to_duplicate_term() {
        let conn = db::open_in_memory().expect("open");
        let t = insert_open_term(&conn, &draft(2, "2026"), "now").expect("insert");
        close_term(&conn, &t.id, "later").expect("close");
        let e = insert_open_term(&conn, &draft(2, "2026"), "now").expect_err("dup");
        assert_eq!(e.code(), "duplicate_term");
        assert_eq!(count_terms(&conn).expect("count"), 1);
    }

    #[test]
    fn close_requires_open_term() {
        let conn = db::open_in_memory().expect("open");
        let t = insert_open_term(&conn, &draft(1, "2026"), "now").expect("insert");
        close_term(&conn, &t.id, "later").expect("close");
        assert!(current_term(&conn).expect("current").is_none());
        let e = close_term(&conn, &t.id, "again").expect_err("closed twice");
        assert_eq!(e.code(), "no_current_term");
    }

    #[test]
    fn invoice_metadata_is_recorded() {
        let conn = db::open_in_memory().expect("open");
        let t = insert_open_term(&conn, &draft(1, "2026"), "now").expect("insert");
        assert!(!t.invoice_sent);
        let t = mark_invoice_sent(&conn, &t.id, "2026-01-15").expect("mark");
        assert!(t.invoice_sent);
        assert_eq!(t.invoice_sent_date.as_deref(), Some("2026-01-15"));
        let e = mark_invoice_sent(&conn, "missing", "2026-01-15").expect_err("missing");
        assert_eq!(e.code(), "not_found");
    }
}
