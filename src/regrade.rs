use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::{ActingUser, EntityStore, RegradeFilter, RegradeRequest, RegradeStatus, Role};

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone)]
pub struct SubmitRegrade {
    pub assessment_name: String,
    pub student_username: String,
    pub justification: String,
}

#[derive(Debug, Clone)]
pub struct ResolveRegrade {
    pub request_id: String,
    pub new_grade: f64,
}

/// Opens a regrade request against an existing grade. Students may only file
/// against their own grades, and each (assessment, student) pair carries at
/// most one open request at a time.
pub fn submit(
    store: &dyn EntityStore,
    cmd: &SubmitRegrade,
    acting: &ActingUser,
) -> Result<RegradeRequest, EngineError> {
    let assessment_name = cmd.assessment_name.trim();
    let student_username = cmd.student_username.trim();
    let justification = cmd.justification.trim();
    if assessment_name.is_empty() || student_username.is_empty() || justification.is_empty() {
        return Err(EngineError::validation(
            "assessment, student and justification are all required",
        ));
    }
    if acting.role != Role::Student || acting.username != student_username {
        return Err(EngineError::validation(
            "regrade requests may only be submitted by the student who owns the grade",
        ));
    }
    if store.grade(assessment_name, student_username)?.is_none() {
        return Err(EngineError::not_found(
            "no grade has been recorded for this assessment",
        ));
    }
    if store
        .open_regrade(assessment_name, student_username)?
        .is_some()
    {
        return Err(EngineError::conflict(
            "an active regrade request already exists for this assessment",
        ));
    }

    let request = RegradeRequest {
        id: Uuid::new_v4().to_string(),
        assessment_name: assessment_name.to_string(),
        student_username: student_username.to_string(),
        justification: justification.to_string(),
        status: RegradeStatus::Open,
        created_at: now_stamp(),
        resolved_at: None,
    };
    // Two racing submits both pass the read check; the open-pair uniqueness
    // constraint picks the single winner.
    store.create_regrade(&request).map_err(|e| {
        EngineError::from_create(
            e,
            "an active regrade request already exists for this assessment",
        )
    })?;
    Ok(request)
}

/// Resolves an open request: overwrites the linked grade with the decided
/// value and closes the request, atomically. Resolved requests are terminal.
pub fn resolve(
    store: &dyn EntityStore,
    cmd: &ResolveRegrade,
    acting: &ActingUser,
) -> Result<RegradeRequest, EngineError> {
    let request_id = cmd.request_id.trim();
    if request_id.is_empty() {
        return Err(EngineError::validation("requestId is required"));
    }
    if !cmd.new_grade.is_finite() || !(0.0..=100.0).contains(&cmd.new_grade) {
        return Err(EngineError::validation(
            "new grade must be a number between 0 and 100",
        ));
    }
    if acting.role != Role::Instructor {
        return Err(EngineError::validation(
            "regrade requests may only be resolved by an instructor",
        ));
    }

    let mut resolved: Option<RegradeRequest> = None;
    store.transactionally(&mut |tx| {
        let request = tx
            .regrade_by_id(request_id)?
            .filter(|r| r.status == RegradeStatus::Open)
            .ok_or_else(|| {
                EngineError::not_found("regrade request not found or already resolved")
            })?;

        let touched = tx.overwrite_grade_value(
            &request.assessment_name,
            &request.student_username,
            cmd.new_grade,
        )?;
        if touched == 0 {
            return Err(EngineError::integrity(format!(
                "open regrade request {} has no grade row for {} / {}",
                request.id, request.assessment_name, request.student_username
            )));
        }

        let resolved_at = now_stamp();
        let flipped = tx.mark_regrade_resolved(&request.id, &resolved_at)?;
        if flipped == 0 {
            return Err(EngineError::integrity(format!(
                "regrade request {} could not be marked resolved",
                request.id
            )));
        }

        resolved = Some(RegradeRequest {
            status: RegradeStatus::Resolved,
            resolved_at: Some(resolved_at),
            ..request
        });
        Ok(())
    })?;

    resolved.ok_or_else(|| EngineError::integrity("resolve committed without a result"))
}

/// Open requests grouped under their assessment, for the instructor queue.
pub fn open_regrade_queue(
    store: &dyn EntityStore,
) -> Result<HashMap<String, Vec<RegradeRequest>>, EngineError> {
    let open = store.regrades(&RegradeFilter {
        status: Some(RegradeStatus::Open),
        ..RegradeFilter::default()
    })?;
    let mut by_assessment: HashMap<String, Vec<RegradeRequest>> = HashMap::new();
    for r in open {
        by_assessment
            .entry(r.assessment_name.clone())
            .or_default()
            .push(r);
    }
    Ok(by_assessment)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegradeViewRow {
    pub id: String,
    pub assessment_name: String,
    pub justification: String,
    pub status: RegradeStatus,
    pub created_at: String,
    pub resolved_at: Option<String>,
    pub current_value: Option<f64>,
    pub weight: f64,
}

/// A student's own request history, open and resolved, with the grade value
/// and weight as they stand now.
pub fn student_regrade_view(
    store: &dyn EntityStore,
    student_username: &str,
) -> Result<Vec<RegradeViewRow>, EngineError> {
    let requests = store.regrades(&RegradeFilter {
        student_username: Some(student_username.to_string()),
        ..RegradeFilter::default()
    })?;

    let mut rows = Vec::with_capacity(requests.len());
    for r in requests {
        let assessment = store.assessment(&r.assessment_name)?.ok_or_else(|| {
            EngineError::integrity(format!(
                "regrade request references missing assessment '{}'",
                r.assessment_name
            ))
        })?;
        let current_value = store
            .grade(&r.assessment_name, &r.student_username)?
            .and_then(|g| g.value);
        rows.push(RegradeViewRow {
            id: r.id,
            assessment_name: r.assessment_name,
            justification: r.justification,
            status: r.status,
            created_at: r.created_at,
            resolved_at: r.resolved_at,
            current_value,
            weight: assessment.weight,
        });
    }
    Ok(rows)
}
