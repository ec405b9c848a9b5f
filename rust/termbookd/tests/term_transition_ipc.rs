mod common;

use common::{
    add_record, admin, create_student, current_term, open_term_count, setup_term, transition,
    Sidecar,
};
use serde_json::json;

fn grade_of(sc: &mut Sidecar, student_id: &str) -> String {
    let res = sc.request_ok("students.get", json!({ "studentId": student_id }));
    res["student"]["grade"].as_str().expect("grade").to_string()
}

#[test]
fn year_end_transition_snapshots_and_promotes() {
    let mut sc = Sidecar::start();
    let old = setup_term(&mut sc, 4, "2025", "2025-10-01");
    let amy = create_student(&mut sc, "Amy", "Grade 6");
    let ben = create_student(&mut sc, "Ben", "Grade 3");
    add_record(&mut sc, "attendance", &amy, "2025-10-02");
    add_record(&mut sc, "attendance", &amy, "2025-10-03");
    add_record(&mut sc, "homework", &ben, "2025-10-03");
    add_record(&mut sc, "behavior", &ben, "2025-10-04");

    let resp = transition(&mut sc, &old, 1, "2026", "2026-01-01");
    assert_eq!(resp["ok"], true, "{}", resp);
    let summary = &resp["result"];
    assert_eq!(summary["snapshotsCreated"], 2);
    assert_eq!(summary["gradeProgressionApplied"], true);
    assert_eq!(summary["gradesPromoted"], 2);
    assert!(summary.get("paymentResetWarning").is_none());

    assert_eq!(grade_of(&mut sc, &amy), "Grade 7");
    assert_eq!(grade_of(&mut sc, &ben), "Grade 4");

    let old_term = sc.request_ok("terms.get", json!({ "termId": old }));
    assert_eq!(old_term["term"]["isCurrent"], false);
    assert_eq!(old_term["term"]["state"], "closed");

    let current = current_term(&mut sc);
    assert_eq!(current["id"], summary["newTermId"]);
    assert_eq!(current["isCurrent"], true);
    assert_eq!(current["name"], "Term 1 - 2026");
    assert_eq!(current["endDateDisplay"], "Not set");
    assert_eq!(open_term_count(&mut sc), 1);

    let snaps = sc.request_ok("snapshots.list", json!({ "termId": old, "studentId": amy }));
    let snaps = snaps["snapshots"].as_array().expect("snapshots");
    assert_eq!(snaps.len(), 1);
    assert_eq!(snaps[0]["attendanceCount"], 2);
    assert_eq!(snaps[0]["grade"], "Grade 6");

    let ben_snap = sc.request_ok("snapshots.list", json!({ "termId": old, "studentId": ben }));
    assert_eq!(ben_snap["snapshots"][0]["homeworkCount"], 1);
    assert_eq!(ben_snap["snapshots"][0]["behaviorCount"], 1);

    let notes = sc.request_ok("notifications.list", json!({ "kind": "grade_progression" }));
    assert_eq!(notes["notifications"].as_array().expect("list").len(), 1);
}

#[test]
fn mid_year_transition_keeps_grades() {
    let mut sc = Sidecar::start();
    let old = setup_term(&mut sc, 1, "2026", "2026-01-01");
    let amy = create_student(&mut sc, "Amy", "Grade 2");

    let resp = transition(&mut sc, &old, 2, "2026", "2026-04-20");
    assert_eq!(resp["ok"], true, "{}", resp);
    assert_eq!(resp["result"]["snapshotsCreated"], 1);
    assert_eq!(resp["result"]["gradeProgressionApplied"], false);
    assert_eq!(grade_of(&mut sc, &amy), "Grade 2");
    assert_eq!(open_term_count(&mut sc), 1);
}

#[test]
fn duplicate_term_is_rejected_without_changes() {
    let mut sc = Sidecar::start();
    let first = setup_term(&mut sc, 1, "2026", "2026-01-01");
    create_student(&mut sc, "Amy", "Prep");
    let resp = transition(&mut sc, &first, 2, "2026", "2026-04-20");
    assert_eq!(resp["ok"], true, "{}", resp);
    let current = current_term(&mut sc);
    let current_id = current["id"].as_str().expect("id").to_string();

    let resp = transition(&mut sc, &current_id, 2, "2026", "2026-07-10");
    assert_eq!(resp["ok"], false);
    assert_eq!(resp["error"]["code"], "duplicate_term");
    assert_eq!(
        resp["error"]["message"],
        "term 2 of academic year 2026 already exists"
    );

    let terms = sc.request_ok("terms.list", json!({}));
    assert_eq!(terms["terms"].as_array().expect("terms").len(), 2);
    assert_eq!(current_term(&mut sc)["id"], current_id.as_str());
    let snaps = sc.request_ok("snapshots.list", json!({ "termId": current_id }));
    assert!(snaps["snapshots"].as_array().expect("snaps").is_empty());
}

#[test]
fn validation_errors_are_specific() {
    let mut sc = Sidecar::start();
    let first = setup_term(&mut sc, 1, "2026", "2026-01-01");

    let resp = transition(&mut sc, &first, 5, "2026", "2026-04-20");
    assert_eq!(resp["error"]["code"], "invalid_term_number");

    let resp = transition(&mut sc, "not-a-term", 2, "2026", "2026-04-20");
    assert_eq!(resp["error"]["code"], "no_current_term");

    let resp = transition(&mut sc, &first, 2, "", "2026-04-20");
    assert_eq!(resp["error"]["code"], "bad_params");

    let resp = transition(&mut sc, &first, 2, "2026", "");
    assert_eq!(resp["error"]["code"], "bad_params");

    let code = sc.request_err(
        "terms.transition",
        json!({
            "session": { "actorId": "t1", "role": "teacher" },
            "currentTermId": first,
            "newTermNumber": 2,
            "newStartDate": "2026-04-20",
            "newAcademicYear": "2026",
        }),
    );
    assert_eq!(code, "forbidden");

    let code = sc.request_err(
        "terms.transition",
        json!({ "currentTermId": first, "newTermNumber": 2 }),
    );
    assert_eq!(code, "bad_params");

    assert_eq!(current_term(&mut sc)["id"], first.as_str());
}

#[test]
fn explicit_end_date_and_name_are_kept() {
    let mut sc = Sidecar::start();
    let first = setup_term(&mut sc, 3, "2026", "2026-07-10");
    let resp = sc.request_ok(
        "terms.transition",
        json!({
            "session": admin(),
            "currentTermId": first,
            "newTermName": "Spring",
            "newTermNumber": 4,
            "newStartDate": "2026-10-05",
            "newEndDate": "2026-12-18",
            "newAcademicYear": "2026",
        }),
    );
    let current = current_term(&mut sc);
    assert_eq!(current["id"], resp["newTermId"]);
    assert_eq!(current["name"], "Spring");
    assert_eq!(current["endDate"], "2026-12-18");
    assert_eq!(current["endDateDisplay"], "2026-12-18");
}

#[test]
fn transition_resets_invoicing_for_closing_students() {
    let mut sc = Sidecar::start();
    let first = setup_term(&mut sc, 1, "2026", "2026-01-01");
    let amy = create_student(&mut sc, "Amy", "Grade 1");
    sc.request_ok(
        "terms.markInvoiceSent",
        json!({ "session": admin(), "termId": first, "date": "2026-01-20" }),
    );
    let t = sc.request_ok("terms.get", json!({ "termId": first }));
    assert_eq!(t["term"]["invoiceSent"], true);
    assert_eq!(t["term"]["invoiceSentDate"], "2026-01-20");

    let resp = transition(&mut sc, &first, 2, "2026", "2026-04-20");
    assert_eq!(resp["ok"], true, "{}", resp);
    let s = sc.request_ok("students.get", json!({ "studentId": amy }));
    assert_eq!(s["student"]["paymentStatus"], "pending");
    assert_eq!(s["student"]["invoiceSent"], false);
}
