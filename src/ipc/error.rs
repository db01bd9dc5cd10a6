use serde_json::json;

use crate::error::EngineError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Wire mapping for engine failures. Validation, conflict and not-found
/// messages are written for callers and pass through verbatim; integrity and
/// store failures are logged here and surfaced generically so raw store
/// detail never leaves the process.
pub fn engine_err(id: &str, e: EngineError) -> serde_json::Value {
    match e {
        EngineError::Validation(msg) => err(id, "validation", msg, None),
        EngineError::Conflict(msg) => err(id, "conflict", msg, None),
        EngineError::NotFound(msg) => err(id, "not_found", msg, None),
        EngineError::Integrity(msg) => {
            tracing::error!(error = %msg, "data integrity violation");
            err(
                id,
                "integrity",
                "a data integrity problem was detected; the operation was rolled back",
                None,
            )
        }
        EngineError::Store(inner) => {
            tracing::error!(error = %inner, "store operation failed");
            err(id, "store", "the operation could not be completed", None)
        }
    }
}
