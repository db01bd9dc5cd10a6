use serde_json::json;

use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{acting_user, required_f64, required_str, store};
use crate::ipc::types::{AppState, Request};
use crate::regrade::{self, ResolveRegrade, SubmitRegrade};
use crate::store::Role;

fn handle_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    let justification = match required_str(req, "justification") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let cmd = SubmitRegrade {
        assessment_name,
        student_username,
        justification,
    };
    match regrade::submit(s, &cmd, &acting) {
        Ok(request) => ok(&req.id, json!({ "request": request })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_resolve(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let acting = match acting_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let request_id = match required_str(req, "requestId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let new_grade = match required_f64(req, "newGrade") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let cmd = ResolveRegrade {
        request_id,
        new_grade,
    };
    match regrade::resolve(s, &cmd, &acting) {
        Ok(request) => ok(&req.id, json!({ "request": request })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
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
            "the regrade queue may only be viewed by an instructor",
            None,
        );
    }

    match regrade::open_regrade_queue(s) {
        Ok(queue) => ok(&req.id, json!({ "byAssessment": queue })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_student_view(state: &mut AppState, req: &Request) -> serde_json::Value {
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
    if acting.role == Role::Student && acting.username != student_username {
        return err(
            &req.id,
            "validation",
            "students may only view their own regrade requests",
            None,
        );
    }

    match regrade::student_regrade_view(s, &student_username) {
        Ok(requests) => ok(&req.id, json!({ "requests": requests })),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "regrades.submit" => Some(handle_submit(state, req)),
        "regrades.resolve" => Some(handle_resolve(state, req)),
        "regrades.open" => Some(handle_open(state, req)),
        "regrades.studentView" => Some(handle_student_view(state, req)),
        _ => None,
    }
}
