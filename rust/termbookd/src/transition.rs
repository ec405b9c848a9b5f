use crate::collab::{Collaborators, GradeProgression, Promotion};
use crate::db;
use crate::error::{Result, TermError};
use crate::grade::{self, Grade};
use crate::session::Session;
use crate::snapshot;
use crate::student;
use crate::term::{self, TermDraft};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const NOTIFY_ON_PROMOTION_KEY: &str = "transition.notify_on_promotion";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub current_term_id: String,
    #[serde(default)]
    pub new_term_name: Option<String>,
    pub new_term_number: i64,
    pub new_start_date: String,
    #[serde(default)]
    pub new_end_date: Option<String>,
    pub new_academic_year: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionSummary {
    pub snapshots_created: usize,
    pub snapshots_skipped: usize,
    pub grade_progression_applied: bool,
    pub grades_promoted: usize,
    /// Enrolled students whose grade label is outside the promotion ladder.
    pub ungraded_student_ids: Vec<String>,
    pub closed_term_id: String,
    pub new_term_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reset_warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_warning: Option<String>,
}

/// Closes the current term and opens the next one.
///
/// Validation happens before anything is written. Snapshots, grade promotion, closing
/// the old term and inserting the new one share one transaction, with the open/close
/// swap last. The payments and notification collaborators run after commit and their
/// failures come back as warnings on the summary.
pub fn transition_term(
    conn: &Connection,
    session: &Session,
    req: &TransitionRequest,
    collab: &Collaborators,
) -> Result<TransitionSummary> {
    session.require_admin()?;
    let draft = TermDraft::validate(
        req.new_term_name.as_deref(),
        req.new_term_number,
        &req.new_start_date,
        req.new_end_date.as_deref(),
        &req.new_academic_year,
    )?;

    let tx = db::begin_write(conn)?;

    if term::find_by_period(&tx, draft.term_number, &draft.academic_year)?.is_some() {
        return Err(TermError::DuplicateTerm {
            term_number: draft.term_number,
            academic_year: draft.academic_year,
        });
    }
    let closing = match term::get_term(&tx, &req.current_term_id)? {
        Some(t) if t.is_current() => t,
        _ => return Err(TermError::NoCurrentTerm(req.current_term_id.clone())),
    };

    let now = db::now_rfc3339();
    let students = student::enrolled_students(&tx)?;
    let snapshots = snapshot::generate_snapshots(&tx, &closing.id, &students, &now)?;
    debug!(
        term_id = %closing.id,
        created = snapshots.created.len(),
        skipped = snapshots.skipped.len(),
        "snapshots taken"
    );

    let promote = grade::is_promotion_boundary(closing.term_number, draft.term_number);
    let mut promotions = Vec::new();
    let mut ungraded = Vec::new();
    if promote {
        for s in &students {
            let Some(current) = Grade::parse(&s.grade) else {
                ungraded.push(s.id.clone());
                continue;
            };
            let next = grade::next_grade(current);
            if next == current {
                continue;
            }
            student::set_grade(&tx, &s.id, next.label())?;
            promotions.push(Promotion {
                student_id: s.id.clone(),
                from: s.grade.clone(),
                to: next.label().to_string(),
            });
        }
    }

    term::close_term(&tx, &closing.id, &now)?;
    let opened = term::insert_open_term(&tx, &draft, &now)?;
    tx.commit()?;

    info!(
        actor = %session.actor_id,
        closed_term = %closing.id,
        new_term = %opened.id,
        snapshots = snapshots.created.len(),
        promoted = promotions.len(),
        "term transition committed"
    );

    let mut summary = TransitionSummary {
        snapshots_created: snapshots.created.len(),
        snapshots_skipped: snapshots.skipped.len(),
        grade_progression_applied: promote,
        grades_promoted: promotions.len(),
        ungraded_student_ids: ungraded,
        closed_term_id: closing.id.clone(),
        new_term_id: opened.id.clone(),
        payment_reset_warning: None,
        notification_warning: None,
    };

    let student_ids: Vec<String> = students.iter().map(|s| s.id.clone()).collect();
    match collab.payments.reset_invoicing(conn, &closing, &student_ids) {
        Ok(n) => debug!(term_id = %closing.id, reset = n, "invoicing reset"),
        Err(e) => {
            warn!(term_id = %closing.id, error = %e, "invoicing reset failed");
            summary.payment_reset_warning = Some(e.to_string());
        }
    }

    // Nothing to announce when every student was already terminal or ungraded.
    if !promotions.is_empty() && db::settings_get_bool(conn, NOTIFY_ON_PROMOTION_KEY, true) {
        let event = GradeProgression {
            closed_term_id: closing.id.clone(),
            new_term_id: opened.id.clone(),
            academic_year: opened.academic_year.clone(),
            promotions,
        };
        if let Err(e) = collab.notifier.grade_progression(conn, &event) {
            warn!(term_id = %opened.id, error = %e, "grade progression notification failed");
            summary.notification_warning = Some(e.to_string());
        }
    }

    Ok(summary)
}
