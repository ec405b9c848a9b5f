use crate::db;
use crate::term::Term;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

/// Resets invoicing state when a term closes. How the reset happens is up to the
/// implementation; the rollover only decides that it is needed.
pub trait Payments {
    fn reset_invoicing(
        &self,
        conn: &Connection,
        closing_term: &Term,
        student_ids: &[String],
    ) -> anyhow::Result<usize>;
}

pub trait Notifier {
    fn grade_progression(&self, conn: &Connection, event: &GradeProgression) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub student_id: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeProgression {
    pub closed_term_id: String,
    pub new_term_id: String,
    pub academic_year: String,
    pub promotions: Vec<Promotion>,
}

/// Puts every listed student back to `pending` with no invoice sent.
pub struct LedgerPayments;

impl Payments for LedgerPayments {
    fn reset_invoicing(
        &self,
        conn: &Connection,
        _closing_term: &Term,
        student_ids: &[String],
    ) -> anyhow::Result<usize> {
        let mut stmt = conn.prepare(
            "UPDATE students SET payment_status = 'pending', invoice_sent = 0 WHERE id = ?",
        )?;
        let mut changed = 0;
        for id in student_ids {
            changed += stmt.execute([id])?;
        }
        Ok(changed)
    }
}

/// Writes events to the `notifications` table for whoever sends parent mail.
pub struct OutboxNotifier;

impl Notifier for OutboxNotifier {
    fn grade_progression(&self, conn: &Connection, event: &GradeProgression) -> anyhow::Result<()> {
        conn.execute(
            "INSERT INTO notifications(id, kind, payload, created_at) VALUES(?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                "grade_progression",
                serde_json::to_string(event)?,
                db::now_rfc3339(),
            ),
        )?;
        Ok(())
    }
}

pub struct Collaborators {
    pub payments: Box<dyn Payments>,
    pub notifier: Box<dyn Notifier>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Collaborators {
            payments: Box::new(LedgerPayments),
            notifier: Box::new(OutboxNotifier),
        }
    }
}

pub fn list_notifications(
    conn: &Connection,
    kind: Option<&str>,
) -> anyhow::Result<Vec<serde_json::Value>> {
    let mut stmt = conn.prepare(
        "SELECT id, kind, payload, created_at
         FROM notifications
         WHERE (?1 IS NULL OR kind = ?1)
         ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map([kind], |r| {
            let id: String = r.get(0)?;
            let kind: String = r.get(1)?;
            let payload: String = r.get(2)?;
            let created_at: String = r.get(3)?;
            Ok((id, kind, payload, created_at))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(id, kind, payload, created_at)| -> anyhow::Result<serde_json::Value> {
            Ok(json!({
                "id": id,
                "kind": kind,
                "payload": serde_json::from_str::<serde_json::Value>(&payload)?,
                "createdAt": created_at,
            }))
        })
        .collect()
}
