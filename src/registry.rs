use chrono::NaiveDateTime;

use crate::error::EngineError;
use crate::store::{ActingUser, Assessment, AssessmentKind, EntityStore, Role};

/// Labs that arrive without an explicit weight count this much toward the
/// overall mark.
pub const LAB_DEFAULT_WEIGHT: f64 = 0.20;

const DUE_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M";

#[derive(Debug, Clone)]
pub struct NewAssignment {
    pub name: String,
    pub due_date: String,
    pub weight: f64,
    pub description: String,
    pub handout_link: Option<String>,
    pub solutions_link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewLab {
    pub name: String,
    pub description: String,
    pub weight: Option<f64>,
    pub handout_link: Option<String>,
    pub solutions_link: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTest {
    pub name: String,
    pub due_date: String,
    pub weight: f64,
    pub location: String,
    pub description: String,
}

fn require_instructor(acting: &ActingUser) -> Result<(), EngineError> {
    if acting.role != Role::Instructor {
        return Err(EngineError::validation(
            "assessments may only be created by an instructor",
        ));
    }
    Ok(())
}

fn required_field(value: &str, what: &str) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation(format!("{what} is required")));
    }
    Ok(trimmed.to_string())
}

fn validate_weight(weight: f64) -> Result<f64, EngineError> {
    if !weight.is_finite() || weight < 0.0 {
        return Err(EngineError::validation(
            "weight must be a non-negative number",
        ));
    }
    Ok(weight)
}

fn validate_due_date(raw: &str) -> Result<String, EngineError> {
    let trimmed = raw.trim();
    if NaiveDateTime::parse_from_str(trimmed, DUE_DATE_FORMAT).is_err() {
        return Err(EngineError::validation(
            "due date must be formatted as YYYY-MM-DDTHH:MM",
        ));
    }
    Ok(trimmed.to_string())
}

fn normalize_link(link: Option<&str>) -> Option<String> {
    link.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn persist(store: &dyn EntityStore, assessment: Assessment) -> Result<Assessment, EngineError> {
    if store.assessment(&assessment.name)?.is_some() {
        return Err(EngineError::conflict(
            "this assessment name is already in use",
        ));
    }
    store
        .create_assessment(&assessment)
        .map_err(|e| EngineError::from_create(e, "this assessment name is already in use"))?;
    Ok(assessment)
}

pub fn create_assignment(
    store: &dyn EntityStore,
    cmd: &NewAssignment,
    acting: &ActingUser,
) -> Result<Assessment, EngineError> {
    require_instructor(acting)?;
    let name = required_field(&cmd.name, "name")?;
    let description = required_field(&cmd.description, "description")?;
    let due_date = validate_due_date(&required_field(&cmd.due_date, "due date")?)?;
    let weight = validate_weight(cmd.weight)?;

    persist(
        store,
        Assessment {
            name,
            kind: AssessmentKind::Assignment,
            due_date: Some(due_date),
            location: None,
            weight,
            handout_link: normalize_link(cmd.handout_link.as_deref()),
            solutions_link: normalize_link(cmd.solutions_link.as_deref()),
            description,
        },
    )
}

/// Labs are lightweight: no due date, no location, and a stock weight unless
/// one is given.
pub fn create_lab(
    store: &dyn EntityStore,
    cmd: &NewLab,
    acting: &ActingUser,
) -> Result<Assessment, EngineError> {
    require_instructor(acting)?;
    let name = required_field(&cmd.name, "name")?;
    let description = required_field(&cmd.description, "description")?;
    let weight = validate_weight(cmd.weight.unwrap_or(LAB_DEFAULT_WEIGHT))?;

    persist(
        store,
        Assessment {
            name,
            kind: AssessmentKind::Lab,
            due_date: None,
            location: None,
            weight,
            handout_link: normalize_link(cmd.handout_link.as_deref()),
            solutions_link: normalize_link(cmd.solutions_link.as_deref()),
            description,
        },
    )
}

pub fn create_test(
    store: &dyn EntityStore,
    cmd: &NewTest,
    acting: &ActingUser,
) -> Result<Assessment, EngineError> {
    require_instructor(acting)?;
    let name = required_field(&cmd.name, "name")?;
    let description = required_field(&cmd.description, "description")?;
    let due_date = validate_due_date(&required_field(&cmd.due_date, "due date")?)?;
    let location = required_field(&cmd.location, "location")?;
    let weight = validate_weight(cmd.weight)?;

    persist(
        store,
        Assessment {
            name,
            kind: AssessmentKind::Test,
            due_date: Some(due_date),
            location: Some(location),
            weight,
            handout_link: None,
            solutions_link: None,
            description,
        },
    )
}
