use crate::db;
use crate::error::{Result, TermError};
use crate::session::Session;
use crate::snapshot;
use crate::student::{self, RecordKind};
use crate::term::{self, Term};
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

/// What deleting a term touches. Snapshots are removed; the other rows only lose
/// their term reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionImpact {
    pub term_id: String,
    pub term_name: String,
    pub attendance_count: i64,
    pub homework_count: i64,
    pub behavior_count: i64,
    pub snapshot_count: i64,
}

fn impact_for(conn: &Connection, t: &Term) -> Result<DeletionImpact> {
    Ok(DeletionImpact {
        term_id: t.id.clone(),
        term_name: t.name.clone(),
        attendance_count: student::count_for_term(conn, RecordKind::Attendance, &t.id)?,
        homework_count: student::count_for_term(conn, RecordKind::Homework, &t.id)?,
        behavior_count: student::count_for_term(conn, RecordKind::Behavior, &t.id)?,
        snapshot_count: snapshot::count_for_term(conn, &t.id)?,
    })
}

fn ensure_not_current(t: &Term) -> Result<()> {
    if t.is_current() {
        return Err(TermError::CannotDeleteCurrentTerm(t.name.clone()));
    }
    Ok(())
}

pub fn prepare_deletion(conn: &Connection, term_id: &str) -> Result<DeletionImpact> {
    let t = term::require_term(conn, term_id)?;
    ensure_not_current(&t)?;
    impact_for(conn, &t)
}

/// Deletes a past term once `typed` matches its name exactly.
///
/// State and counts are re-read here rather than trusted from `prepare_deletion`.
/// The returned impact is what was actually removed or detached.
pub fn confirm_deletion(
    conn: &Connection,
    session: &Session,
    term_id: &str,
    typed: &str,
) -> Result<DeletionImpact> {
    session.require_admin()?;

    let tx = db::begin_write(conn)?;
    let t = term::require_term(&tx, term_id)?;
    ensure_not_current(&t)?;
    if typed != t.name {
        return Err(TermError::ConfirmationMismatch { expected: t.name });
    }

    let impact = impact_for(&tx, &t)?;
    snapshot::delete_for_term(&tx, &t.id)?;
    for kind in RecordKind::ALL {
        student::detach_from_term(&tx, kind, &t.id)?;
    }
    term::delete_term(&tx, &t.id)?;
    tx.commit()?;

    info!(
        actor = %session.actor_id,
        term_id = %impact.term_id,
        snapshots = impact.snapshot_count,
        attendance = impact.attendance_count,
        homework = impact.homework_count,
        behavior = impact.behavior_count,
        "term deleted"
    );
    Ok(impact)
}
