use crate::error::{Result, TermError};
use crate::student::{self, RecordKind, Student};
use rusqlite::{Connection, Row};
use serde::Serialize;
use uuid::Uuid;

/// Point-in-time copy of one student's term-scoped aggregates. Rows are only ever
/// inserted or, through the deletion guard, removed with their term.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTermSnapshot {
    pub id: String,
    pub term_id: String,
    pub student_id: String,
    pub attendance_count: i64,
    pub homework_count: i64,
    pub behavior_count: i64,
    pub grade: String,
    pub created_at: String,
}

#[derive(Debug, Default)]
pub struct SnapshotOutcome {
    pub created: Vec<String>,
    /// Students that already had a snapshot for this term.
    pub skipped: Vec<String>,
}

struct Aggregates {
    attendance: i64,
    homework: i64,
    behavior: i64,
}

fn aggregate(conn: &Connection, term_id: &str, student_id: &str) -> rusqlite::Result<Aggregates> {
    Ok(Aggregates {
        attendance: student::count_for_student(conn, RecordKind::Attendance, term_id, student_id)?,
        homework: student::count_for_student(conn, RecordKind::Homework, term_id, student_id)?,
        behavior: student::count_for_student(conn, RecordKind::Behavior, term_id, student_id)?,
    })
}

fn snapshot_exists(conn: &Connection, term_id: &str, student_id: &str) -> Result<bool> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM student_term_snapshots WHERE term_id = ? AND student_id = ?",
        (term_id, student_id),
        |r| r.get(0),
    )?;
    Ok(n > 0)
}

/// Snapshots every student in `students` for `term_id`.
///
/// Re-running for a term is a no-op for students already captured. A failed
/// aggregation aborts the whole run; callers hold a transaction so nothing
/// partial is kept.
pub fn generate_snapshots(
    conn: &Connection,
    term_id: &str,
    students: &[Student],
    created_at: &str,
) -> Result<SnapshotOutcome> {
    let mut out = SnapshotOutcome::default();
    for s in students {
        if snapshot_exists(conn, term_id, &s.id)? {
            out.skipped.push(s.id.clone());
            continue;
        }
        let agg = aggregate(conn, term_id, &s.id).map_err(|source| {
            TermError::SnapshotAggregation {
                student_id: s.id.clone(),
                source,
            }
        })?;
        conn.execute(
            "INSERT INTO student_term_snapshots(
               id, term_id, student_id, attendance_count, homework_count, behavior_count,
               grade, created_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                term_id,
                &s.id,
                agg.attendance,
                agg.homework,
                agg.behavior,
                &s.grade,
                created_at,
            ),
        )?;
        out.created.push(s.id.clone());
    }
    Ok(out)
}

fn snapshot_from_row(r: &Row<'_>) -> rusqlite::Result<StudentTermSnapshot> {
    Ok(StudentTermSnapshot {
        id: r.get(0)?,
        term_id: r.get(1)?,
        student_id: r.get(2)?,
        attendance_count: r.get(3)?,
        homework_count: r.get(4)?,
        behavior_count: r.get(5)?,
        grade: r.get(6)?,
        created_at: r.get(7)?,
    })
}

pub fn list_snapshots(
    conn: &Connection,
    term_id: Option<&str>,
    student_id: Option<&str>,
) -> Result<Vec<StudentTermSnapshot>> {
    let mut stmt = conn.prepare(
        "SELECT id, term_id, student_id, attendance_count, homework_count, behavior_count,
                grade, created_at
         FROM student_term_snapshots
         WHERE (?1 IS NULL OR term_id = ?1)
           AND (?2 IS NULL OR student_id = ?2)
         ORDER BY created_at, student_id",
    )?;
    let rows = stmt
        .query_map((term_id, student_id), snapshot_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn count_for_term(conn: &Connection, term_id: &str) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM student_term_snapshots WHERE term_id = ?",
        [term_id],
        |r| r.get(0),
    )?)
}

pub fn delete_for_term(conn: &Connection, term_id: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM student_term_snapshots WHERE term_id = ?",
        [term_id],
    )?)
}
