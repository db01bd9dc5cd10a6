use serde_json::json;

use crate::feedback::{self, NewFeedback};
use crate::ipc::error::{engine_err, ok};
use crate::ipc::helpers::{acting_user, required_str, store};
use crate::ipc::types::{AppState, Request};

fn handle_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let acting = match acting_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let instructor_username = match required_str(req, "instructorUsername") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let instructor_like = match required_str(req, "instructorLike") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let instructor_improve = match required_str(req, "instructorImprove") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let labs_like = match required_str(req, "labsLike") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let labs_improve = match required_str(req, "labsImprove") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let cmd = NewFeedback {
        instructor_username,
        instructor_like,
        instructor_improve,
        labs_like,
        labs_improve,
    };
    match feedback::submit_feedback(s, &cmd, &acting) {
        Ok(entry) => ok(&req.id, json!({ "entry": entry })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let acting = match acting_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    match feedback::feedback_for(s, &acting) {
        Ok(entries) => ok(&req.id, json!({ "entries": entries })),
        Err(e) => engine_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "feedback.submit" => Some(handle_submit(state, req)),
        "feedback.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
