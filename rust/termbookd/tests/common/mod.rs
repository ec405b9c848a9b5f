#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
    pub workspace: tempfile::TempDir,
}

impl Sidecar {
    /// Spawns the binary and selects a fresh workspace.
    pub fn start() -> Sidecar {
        let exe = env!("CARGO_BIN_EXE_termbookd");
        let mut child = Command::new(exe)
            .env_remove("TERMBOOKD_WORKSPACE")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn termbookd");
        let stdin = child.stdin.take().expect("child stdin");
        let stdout = child.stdout.take().expect("child stdout");
        let workspace = tempfile::tempdir().expect("temp workspace");
        let mut sc = Sidecar {
            child,
            stdin,
            reader: BufReader::new(stdout),
            next_id: 0,
            workspace,
        };
        let path = sc.workspace.path().to_string_lossy().to_string();
        sc.request_ok("workspace.select", json!({ "path": path }));
        sc
    }

    pub fn send_raw(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response for {}", line);
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn request_ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let value = self.request(method, params);
        assert!(
            value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or_else(|| json!({}))
    }

    /// Returns the error code, failing the test if the call succeeded.
    pub fn request_err(&mut self, method: &str, params: serde_json::Value) -> String {
        let value = self.request(method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value["error"]["code"]
            .as_str()
            .expect("error code")
            .to_string()
    }
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn admin() -> serde_json::Value {
    json!({ "actorId": "admin-1", "role": "admin" })
}

pub fn teacher() -> serde_json::Value {
    json!({ "actorId": "teacher-1", "role": "teacher" })
}

pub fn setup_term(sc: &mut Sidecar, term_number: i64, year: &str, start: &str) -> String {
    let res = sc.request_ok(
        "terms.setup",
        json!({
            "session": admin(),
            "termNumber": term_number,
            "academicYear": year,
            "startDate": start,
        }),
    );
    res["term"]["id"].as_str().expect("term id").to_string()
}

pub fn create_student(sc: &mut Sidecar, name: &str, grade: &str) -> String {
    let res = sc.request_ok(
        "students.create",
        json!({ "session": admin(), "name": name, "grade": grade }),
    );
    res["studentId"].as_str().expect("student id").to_string()
}

pub fn add_record(sc: &mut Sidecar, kind: &str, student_id: &str, date: &str) {
    sc.request_ok(
        "records.add",
        json!({
            "session": teacher(),
            "kind": kind,
            "studentId": student_id,
            "date": date,
        }),
    );
}

pub fn transition(
    sc: &mut Sidecar,
    current_term_id: &str,
    term_number: i64,
    year: &str,
    start: &str,
) -> serde_json::Value {
    sc.request(
        "terms.transition",
        json!({
            "session": admin(),
            "currentTermId": current_term_id,
            "newTermNumber": term_number,
            "newStartDate": start,
            "newAcademicYear": year,
        }),
    )
}

pub fn current_term(sc: &mut Sidecar) -> serde_json::Value {
    sc.request_ok("terms.current", json!({}))["term"].clone()
}

pub fn open_term_count(sc: &mut Sidecar) -> usize {
    let terms = sc.request_ok("terms.list", json!({}));
    terms["terms"]
        .as_array()
        .expect("terms array")
        .iter()
        .filter(|t| t["isCurrent"] == true)
        .count()
}
