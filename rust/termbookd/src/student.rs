use crate::error::{Result, TermError};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub grade: String,
    pub enrolled: bool,
    pub payment_status: String,
    pub invoice_sent: bool,
    pub created_at: String,
}

/// Kinds of term-scoped rows a student accumulates during a term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Attendance,
    Homework,
    Behavior,
}

impl RecordKind {
    pub const ALL: [RecordKind; 3] = [
        RecordKind::Attendance,
        RecordKind::Homework,
        RecordKind::Behavior,
    ];

    pub fn parse(s: &str) -> Option<RecordKind> {
        match s {
            "attendance" => Some(RecordKind::Attendance),
            "homework" => Some(RecordKind::Homework),
            "behavior" | "behaviour" => Some(RecordKind::Behavior),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Attendance => "attendance",
            RecordKind::Homework => "homework",
            RecordKind::Behavior => "behavior",
        }
    }

    fn table(self) -> &'static str {
        match self {
            RecordKind::Attendance => "attendance_records",
            RecordKind::Homework => "homework_records",
            RecordKind::Behavior => "behavior_notes",
        }
    }

    fn detail_column(self) -> &'static str {
        match self {
            RecordKind::Attendance => "status",
            RecordKind::Homework => "title",
            RecordKind::Behavior => "note",
        }
    }
}

const STUDENT_COLUMNS: &str =
    "id, name, grade, enrolled, payment_status, invoice_sent, created_at";

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        grade: r.get(2)?,
        enrolled: r.get::<_, i64>(3)? != 0,
        payment_status: r.get(4)?,
        invoice_sent: r.get::<_, i64>(5)? != 0,
        created_at: r.get(6)?,
    })
}

pub fn create_student(
    conn: &Connection,
    name: &str,
    grade: &str,
    enrolled: bool,
    created_at: &str,
) -> Result<Student> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TermError::BadParams("name must not be empty".into()));
    }
    let grade = grade.trim();
    if grade.is_empty() {
        return Err(TermError::BadParams("grade must not be empty".into()));
    }
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, name, grade, enrolled, created_at) VALUES(?, ?, ?, ?, ?)",
        (&id, name, grade, enrolled as i64, created_at),
    )?;
    require_student(conn, &id)
}

pub fn get_student(conn: &Connection, student_id: &str) -> Result<Option<Student>> {
    let sql = format!("SELECT {STUDENT_COLUMNS} FROM students WHERE id = ?");
    Ok(conn
        .query_row(&sql, [student_id], student_from_row)
        .optional()?)
}

pub fn require_student(conn: &Connection, student_id: &str) -> Result<Student> {
    get_student(conn, student_id)?
        .ok_or_else(|| TermError::NotFound(format!("student {student_id} not found")))
}

pub fn list_students(conn: &Connection, enrolled_only: bool) -> Result<Vec<Student>> {
    let sql = format!(
        "SELECT {STUDENT_COLUMNS} FROM students
         WHERE (? = 0 OR enrolled = 1)
         ORDER BY name, id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let students = stmt
        .query_map([enrolled_only as i64], student_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(students)
}

pub fn enrolled_students(conn: &Connection) -> Result<Vec<Student>> {
    list_students(conn, true)
}

pub fn set_grade(conn: &Connection, student_id: &str, grade: &str) -> Result<()> {
    conn.execute(
        "UPDATE students SET grade = ? WHERE id = ?",
        (grade, student_id),
    )?;
    Ok(())
}

/// Adds one term-scoped row. `term_id = None` leaves it unattributed.
pub fn add_record(
    conn: &Connection,
    kind: RecordKind,
    student_id: &str,
    term_id: Option<&str>,
    date: &str,
    detail: &str,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let sql = format!(
        "INSERT INTO {}(id, student_id, term_id, date, {}) VALUES(?, ?, ?, ?, ?)",
        kind.table(),
        kind.detail_column()
    );
    conn.execute(&sql, (&id, student_id, term_id, date, detail))?;
    Ok(id)
}

pub fn count_for_student(
    conn: &Connection,
    kind: RecordKind,
    term_id: &str,
    student_id: &str,
) -> rusqlite::Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE term_id = ? AND student_id = ?",
        kind.table()
    );
    conn.query_row(&sql, (term_id, student_id), |r| r.get(0))
}

pub fn count_for_term(conn: &Connection, kind: RecordKind, term_id: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE term_id = ?", kind.table());
    Ok(conn.query_row(&sql, [term_id], |r| r.get(0))?)
}

#[cfg(test)]
pub fn count_unattributed(conn: &Connection, kind: RecordKind) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {} WHERE term_id IS NULL", kind.table());
    Ok(conn.query_row(&sql, [], |r| r.get(0))?)
}

/// Clears the term reference; the rows themselves are kept.
pub fn detach_from_term(conn: &Connection, kind: RecordKind, term_id: &str) -> Result<usize> {
    let sql = format!("UPDATE {} SET term_id = NULL WHERE term_id = ?", kind.table());
    Ok(conn.execute(&sql, [term_id])?)
}
