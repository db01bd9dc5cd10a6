use serde_json::json;

use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{acting_user, optional_str, required_str, role_from_str, store};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, NewPerson};
use crate::store::{EntityStore, Role};

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let username = match required_str(req, "username") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let first_name = match required_str(req, "firstName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let last_name = match required_str(req, "lastName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let credential = match required_str(req, "credential") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let role_raw = match required_str(req, "role") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(role) = role_from_str(&role_raw) else {
        return err(
            &req.id,
            "bad_params",
            "role must be one of: student, instructor",
            None,
        );
    };

    let cmd = NewPerson {
        username,
        first_name,
        last_name,
        credential,
        role,
    };
    match roster::register_person(s, &cmd) {
        Ok(person) => ok(&req.id, json!({ "person": person })),
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
    if acting.role != Role::Instructor {
        return err(
            &req.id,
            "validation",
            "the roster may only be listed by an instructor",
            None,
        );
    }
    let role = match optional_str(req, "role") {
        Ok(None) => None,
        Ok(Some(raw)) => match role_from_str(&raw) {
            Some(r) => Some(r),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "role must be one of: student, instructor",
                    None,
                );
            }
        },
        Err(e) => return e,
    };

    match s.persons(role) {
        Ok(people) => ok(&req.id, json!({ "people": people })),
        Err(e) => engine_err(&req.id, e.into()),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "people.register" => Some(handle_register(state, req)),
        "people.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
