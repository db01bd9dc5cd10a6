use serde_json::json;

use crate::calc;
use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{acting_user, optional_f64, required_str, store};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, NewGrade};
use crate::store::{EntityStore, Role};

fn handle_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let acting = match acting_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assessment_name = match required_str(req, "assessmentName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_username = match required_str(req, "studentUsername") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let value = match optional_f64(req, "value") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let cmd = NewGrade {
        assessment_name,
        student_username,
        value,
    };
    match roster::record_grade(s, &cmd, &acting) {
        Ok(grade) => ok(&req.id, json!({ "grade": grade })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_student_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let acting = match acting_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_username = match required_str(req, "studentUsername") {
        Ok(v) => v,
        Err(e) => return e,
    };
    // Students see their own marks only; instructors may pull any sheet.
    if acting.role == Role::Student && acting.username != student_username {
        return err(
            &req.id,
            "validation",
            "students may only view their own marks",
            None,
        );
    }
    match s.person(&student_username) {
        Ok(Some(p)) if p.role == Role::Student => {}
        Ok(Some(_)) => {
            return err(
                &req.id,
                "validation",
                "marks are only kept for students",
                None,
            );
        }
        Ok(None) => return err(&req.id, "not_found", "student not found", None),
        Err(e) => return engine_err(&req.id, e.into()),
    }

    match calc::student_mark_report(s, &student_username) {
        Ok(report) => ok(
            &req.id,
            json!({
                "studentUsername": student_username,
                "entries": report.entries,
                "overallMark": report.overall_mark,
            }),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_class_report(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let acting = match acting_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if acting.role != Role::Instructor {
        return err(
            &req.id,
            "validation",
            "the class report may only be viewed by an instructor",
            None,
        );
    }

    match calc::class_grade_report(s) {
        Ok(report) => ok(
            &req.id,
            json!({
                "byAssessment": report.by_assessment,
                "averages": report.averages,
            }),
        ),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.record" => Some(handle_record(state, req)),
        "grades.studentReport" => Some(handle_student_report(state, req)),
        "grades.classReport" => Some(handle_class_report(state, req)),
        _ => None,
    }
}
