use serde_json::json;

use crate::ipc::error::{engine_err, err, ok};
use crate::ipc::helpers::{
    acting_user, kind_from_str, optional_f64, optional_str, required_f64, required_str, store,
};
use crate::ipc::types::{AppState, Request};
use crate::registry::{self, NewAssignment, NewLab, NewTest};
use crate::store::EntityStore;

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let acting = match acting_user(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let kind = match required_str(req, "type") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let description = match required_str(req, "description") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let created = match kind.as_str() {
        "assignment" => {
            let due_date = match required_str(req, "dueDate") {
                Ok(v) => v,
                Err(e) => return e,
            };
            let weight = match required_f64(req, "weight") {
                Ok(v) => v,
                Err(e) => return e,
            };
            let handout_link = match optional_str(req, "handoutLink") {
                Ok(v) => v,
                Err(e) => return e,
            };
            let solutions_link = match optional_str(req, "solutionsLink") {
                Ok(v) => v,
                Err(e) => return e,
            };
            registry::create_assignment(
                s,
                &NewAssignment {
                    name,
                    due_date,
                    weight,
                    description,
                    handout_link,
                    solutions_link,
                },
                &acting,
            )
        }
        "lab" => {
            let weight = match optional_f64(req, "weight") {
                Ok(v) => v,
                Err(e) => return e,
            };
            let handout_link = match optional_str(req, "handoutLink") {
                Ok(v) => v,
                Err(e) => return e,
            };
            let solutions_link = match optional_str(req, "solutionsLink") {
                Ok(v) => v,
                Err(e) => return e,
            };
            registry::create_lab(
                s,
                &NewLab {
                    name,
                    description,
                    weight,
                    handout_link,
                    solutions_link,
                },
                &acting,
            )
        }
        "test" => {
            let due_date = match required_str(req, "dueDate") {
                Ok(v) => v,
                Err(e) => return e,
            };
            let weight = match required_f64(req, "weight") {
                Ok(v) => v,
                Err(e) => return e,
            };
            let location = match required_str(req, "location") {
                Ok(v) => v,
                Err(e) => return e,
            };
            registry::create_test(
                s,
                &NewTest {
                    name,
                    due_date,
                    weight,
                    location,
                    description,
                },
                &acting,
            )
        }
        _ => {
            return err(
                &req.id,
                "bad_params",
                "type must be one of: assignment, lab, test",
                None,
            );
        }
    };

    match created {
        Ok(assessment) => ok(&req.id, json!({ "assessment": assessment })),
        Err(e) => engine_err(&req.id, e),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let s = match store(state, req) {
        Ok(s) => s,
        Err(e) => return e,
    };
    let kind = match optional_str(req, "type") {
        Ok(None) => None,
        Ok(Some(raw)) => match kind_from_str(&raw) {
            Some(k) => Some(k),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "type must be one of: assignment, lab, test",
                    None,
                );
            }
        },
        Err(e) => return e,
    };

    match s.assessments(kind) {
        Ok(assessments) => ok(&req.id, json!({ "assessments": assessments })),
        Err(e) => engine_err(&req.id, e.into()),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "assessments.create" => Some(handle_create(state, req)),
        "assessments.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
