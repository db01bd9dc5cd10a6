use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_coursebookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn coursebookd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn instructor() -> serde_json::Value {
    json!({ "username": "prof", "role": "instructor" })
}

fn student(username: &str) -> serde_json::Value {
    json!({ "username": username, "role": "student" })
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("coursebook-router-smoke");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());

    // Entity methods refuse to run before a workspace is selected.
    let early = request(
        &mut stdin,
        &mut reader,
        "2",
        "people.list",
        json!({ "actingUser": instructor() }),
    );
    assert_eq!(early.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        early["error"]["code"].as_str(),
        Some("no_workspace"),
        "{early}"
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    for (id, username, role) in [
        ("4", "prof", "instructor"),
        ("5", "alice", "student"),
        ("6", "bob", "student"),
    ] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "people.register",
            json!({
                "username": username,
                "firstName": "Smoke",
                "lastName": "Person",
                "credential": "$2b$12$smokehash",
                "role": role,
            }),
        );
    }

    let people = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "people.list",
        json!({ "role": "student", "actingUser": instructor() }),
    );
    assert_eq!(
        people["people"].as_array().map(|a| a.len()),
        Some(2),
        "{people}"
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "assessments.create",
        json!({
            "type": "assignment",
            "name": "A1",
            "dueDate": "2026-03-01T23:59",
            "weight": 20.0,
            "description": "recursion exercises",
            "handoutLink": "https://example.edu/a1.pdf",
            "actingUser": instructor(),
        }),
    );
    let lab = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "assessments.create",
        json!({
            "type": "lab",
            "name": "L1",
            "description": "shell basics",
            "actingUser": instructor(),
        }),
    );
    assert_eq!(lab["assessment"]["weight"].as_f64(), Some(0.2), "{lab}");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "assessments.create",
        json!({
            "type": "test",
            "name": "Midterm",
            "dueDate": "2026-03-15T09:00",
            "weight": 30.0,
            "location": "Hall B",
            "description": "everything so far",
            "actingUser": instructor(),
        }),
    );

    let assessments = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "assessments.list",
        json!({}),
    );
    assert_eq!(
        assessments["assessments"].as_array().map(|a| a.len()),
        Some(3),
        "{assessments}"
    );
    let labs_only = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "assessments.list",
        json!({ "type": "lab" }),
    );
    assert_eq!(
        labs_only["assessments"].as_array().map(|a| a.len()),
        Some(1),
        "{labs_only}"
    );

    let grade = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "grades.record",
        json!({
            "assessmentName": "A1",
            "studentUsername": "alice",
            "value": 62.5,
            "actingUser": instructor(),
        }),
    );
    assert_eq!(
        grade["grade"]["assessmentKind"].as_str(),
        Some("assignment"),
        "{grade}"
    );

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "grades.studentReport",
        json!({ "studentUsername": "alice", "actingUser": student("alice") }),
    );
    assert_eq!(report["overallMark"].as_f64(), Some(62.5), "{report}");

    let class_report = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "grades.classReport",
        json!({ "actingUser": instructor() }),
    );
    assert_eq!(
        class_report["averages"]["A1"].as_f64(),
        Some(62.5),
        "{class_report}"
    );

    let submitted = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "regrades.submit",
        json!({
            "assessmentName": "A1",
            "studentUsername": "alice",
            "justification": "question 3 deserved part marks",
            "actingUser": student("alice"),
        }),
    );
    let request_id = submitted["request"]["id"]
        .as_str()
        .expect("request id")
        .to_string();

    let queue = request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "regrades.open",
        json!({ "actingUser": instructor() }),
    );
    assert_eq!(
        queue["byAssessment"]["A1"].as_array().map(|a| a.len()),
        Some(1),
        "{queue}"
    );

    let resolved = request_ok(
        &mut stdin,
        &mut reader,
        "18",
        "regrades.resolve",
        json!({
            "requestId": request_id,
            "newGrade": 75.0,
            "actingUser": instructor(),
        }),
    );
    assert_eq!(
        resolved["request"]["status"].as_str(),
        Some("resolved"),
        "{resolved}"
    );

    let view = request_ok(
        &mut stdin,
        &mut reader,
        "19",
        "regrades.studentView",
        json!({ "studentUsername": "alice", "actingUser": student("alice") }),
    );
    assert_eq!(
        view["requests"][0]["currentValue"].as_f64(),
        Some(75.0),
        "{view}"
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "20",
        "feedback.submit",
        json!({
            "instructorUsername": "prof",
            "instructorLike": "clear walkthroughs",
            "instructorImprove": "post slides earlier",
            "labsLike": "pairing",
            "labsImprove": "more TA coverage",
            "actingUser": student("bob"),
        }),
    );
    let entries = request_ok(
        &mut stdin,
        &mut reader,
        "21",
        "feedback.list",
        json!({ "actingUser": instructor() }),
    );
    assert_eq!(
        entries["entries"].as_array().map(|a| a.len()),
        Some(1),
        "{entries}"
    );

    let unknown = request(
        &mut stdin,
        &mut reader,
        "22",
        "grades.erase",
        json!({}),
    );
    assert_eq!(
        unknown["error"]["code"].as_str(),
        Some("not_implemented"),
        "{unknown}"
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
