use super::error::err;
use super::types::{AppState, Request};
use crate::store::{ActingUser, AssessmentKind, Role, SqliteStore};

pub fn store<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a SqliteStore, serde_json::Value> {
    state
        .store
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let Some(s) = v.as_str() else {
                return Err(err(
                    &req.id,
                    "bad_params",
                    format!("{} must be string or null", key),
                    None,
                ));
            };
            let t = s.trim();
            Ok(if t.is_empty() { None } else { Some(t.to_string()) })
        }
    }
}

pub fn required_f64(req: &Request, key: &str) -> Result<f64, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_f64(req: &Request, key: &str) -> Result<Option<f64>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a number or null", key),
                None,
            )
        }),
    }
}

pub fn role_from_str(raw: &str) -> Option<Role> {
    match raw {
        "student" => Some(Role::Student),
        "instructor" => Some(Role::Instructor),
        _ => None,
    }
}

pub fn kind_from_str(raw: &str) -> Option<AssessmentKind> {
    match raw {
        "assignment" => Some(AssessmentKind::Assignment),
        "lab" => Some(AssessmentKind::Lab),
        "test" => Some(AssessmentKind::Test),
        _ => None,
    }
}

/// Mutating methods carry the caller's identity in `params.actingUser`; the
/// engine never reads ambient session state.
pub fn acting_user(req: &Request) -> Result<ActingUser, serde_json::Value> {
    let Some(raw) = req.params.get("actingUser") else {
        return Err(err(&req.id, "bad_params", "missing actingUser", None));
    };
    let mut acting: ActingUser = match serde_json::from_value(raw.clone()) {
        Ok(v) => v,
        Err(_) => {
            return Err(err(
                &req.id,
                "bad_params",
                "actingUser must be an object with username and role",
                None,
            ));
        }
    };
    acting.username = acting.username.trim().to_string();
    if acting.username.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            "actingUser.username must not be empty",
            None,
        ));
    }
    Ok(acting)
}
