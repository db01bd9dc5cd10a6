use std::path::Path;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, OptionalExtension, ToSql};
use serde::{Deserialize, Serialize};

use crate::db;
use crate::error::{EngineError, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentKind {
    Assignment,
    Lab,
    Test,
}

impl AssessmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentKind::Assignment => "assignment",
            AssessmentKind::Lab => "lab",
            AssessmentKind::Test => "test",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegradeStatus {
    Open,
    Resolved,
}

impl RegradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegradeStatus::Open => "open",
            RegradeStatus::Resolved => "resolved",
        }
    }
}

impl ToSql for Role {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Role {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "student" => Ok(Role::Student),
            "instructor" => Ok(Role::Instructor),
            other => Err(FromSqlError::Other(format!("unknown role: {other}").into())),
        }
    }
}

impl ToSql for AssessmentKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for AssessmentKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "assignment" => Ok(AssessmentKind::Assignment),
            "lab" => Ok(AssessmentKind::Lab),
            "test" => Ok(AssessmentKind::Test),
            other => Err(FromSqlError::Other(
                format!("unknown assessment kind: {other}").into(),
            )),
        }
    }
}

impl ToSql for RegradeStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for RegradeStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "open" => Ok(RegradeStatus::Open),
            "resolved" => Ok(RegradeStatus::Resolved),
            other => Err(FromSqlError::Other(
                format!("unknown regrade status: {other}").into(),
            )),
        }
    }
}

/// The identity on whose behalf an engine operation runs. The presentation
/// layer owns sessions; the engine only ever sees this explicit context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingUser {
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Opaque pre-hashed secret. Never serialized into responses.
    #[serde(skip_serializing)]
    pub credential: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub name: String,
    pub kind: AssessmentKind,
    pub due_date: Option<String>,
    pub location: Option<String>,
    pub weight: f64,
    pub handout_link: Option<String>,
    pub solutions_link: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    pub assessment_name: String,
    pub student_username: String,
    pub assessment_kind: AssessmentKind,
    /// 0-100 scale; `None` means not yet graded.
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegradeRequest {
    pub id: String,
    pub assessment_name: String,
    pub student_username: String,
    pub justification: String,
    pub status: RegradeStatus,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: String,
    pub instructor_username: String,
    pub instructor_like: String,
    pub instructor_improve: String,
    pub labs_like: String,
    pub labs_improve: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct GradeFilter {
    pub assessment_name: Option<String>,
    pub student_username: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RegradeFilter {
    pub status: Option<RegradeStatus>,
    pub student_username: Option<String>,
}

/// Transactional view handed to a unit of work by
/// [`EntityStore::transactionally`]. Exposes the reads and writes that must
/// commit together during regrade resolution.
pub trait StoreTx {
    fn regrade_by_id(&self, id: &str) -> Result<Option<RegradeRequest>, StoreError>;

    /// Overwrites the grade value for the composite key. Returns the number
    /// of rows touched; zero means the grade row does not exist.
    fn overwrite_grade_value(
        &self,
        assessment_name: &str,
        student_username: &str,
        value: f64,
    ) -> Result<usize, StoreError>;

    /// Flips an open request to resolved. Returns the number of rows touched.
    fn mark_regrade_resolved(&self, id: &str, resolved_at: &str) -> Result<usize, StoreError>;
}

/// The entity-store contract the engine is written against.
///
/// Point lookups return `Ok(None)` for absent rows. Creates rely on the
/// store's uniqueness constraints as the serializing write path: of two
/// racing creates for the same key, exactly one succeeds and the other
/// observes [`StoreError::Conflict`].
pub trait EntityStore {
    fn person(&self, username: &str) -> Result<Option<Person>, StoreError>;
    fn assessment(&self, name: &str) -> Result<Option<Assessment>, StoreError>;
    fn grade(
        &self,
        assessment_name: &str,
        student_username: &str,
    ) -> Result<Option<Grade>, StoreError>;
    fn open_regrade(
        &self,
        assessment_name: &str,
        student_username: &str,
    ) -> Result<Option<RegradeRequest>, StoreError>;
    fn regrade_by_id(&self, id: &str) -> Result<Option<RegradeRequest>, StoreError>;

    fn persons(&self, role: Option<Role>) -> Result<Vec<Person>, StoreError>;
    fn assessments(&self, kind: Option<AssessmentKind>) -> Result<Vec<Assessment>, StoreError>;
    fn grades(&self, filter: &GradeFilter) -> Result<Vec<Grade>, StoreError>;
    fn regrades(&self, filter: &RegradeFilter) -> Result<Vec<RegradeRequest>, StoreError>;
    fn feedback_for(&self, instructor_username: &str) -> Result<Vec<Feedback>, StoreError>;

    fn create_person(&self, person: &Person) -> Result<(), StoreError>;
    fn create_assessment(&self, assessment: &Assessment) -> Result<(), StoreError>;
    fn create_grade(&self, grade: &Grade) -> Result<(), StoreError>;
    fn create_regrade(&self, request: &RegradeRequest) -> Result<(), StoreError>;
    fn create_feedback(&self, feedback: &Feedback) -> Result<(), StoreError>;

    /// Runs the unit of work inside one store transaction: commits when it
    /// returns `Ok`, rolls back every write when it returns `Err`.
    fn transactionally(
        &self,
        work: &mut dyn FnMut(&dyn StoreTx) -> Result<(), EngineError>,
    ) -> Result<(), EngineError>;
}

/// SQLite-backed entity store over a workspace database.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: db::open_db(workspace)?,
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self {
            conn: db::open_in_memory()?,
        })
    }
}

fn person_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        username: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        credential: row.get(3)?,
        role: row.get(4)?,
    })
}

fn assessment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Assessment> {
    Ok(Assessment {
        name: row.get(0)?,
        kind: row.get(1)?,
        due_date: row.get(2)?,
        location: row.get(3)?,
        weight: row.get(4)?,
        handout_link: row.get(5)?,
        solutions_link: row.get(6)?,
        description: row.get(7)?,
    })
}

fn grade_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Grade> {
    Ok(Grade {
        assessment_name: row.get(0)?,
        student_username: row.get(1)?,
        assessment_kind: row.get(2)?,
        value: row.get(3)?,
    })
}

fn regrade_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RegradeRequest> {
    Ok(RegradeRequest {
        id: row.get(0)?,
        assessment_name: row.get(1)?,
        student_username: row.get(2)?,
        justification: row.get(3)?,
        status: row.get(4)?,
        created_at: row.get(5)?,
        resolved_at: row.get(6)?,
    })
}

fn feedback_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Feedback> {
    Ok(Feedback {
        id: row.get(0)?,
        instructor_username: row.get(1)?,
        instructor_like: row.get(2)?,
        instructor_improve: row.get(3)?,
        labs_like: row.get(4)?,
        labs_improve: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const PERSON_COLS: &str = "username, first_name, last_name, credential, role";
const ASSESSMENT_COLS: &str =
    "name, kind, due_date, location, weight, handout_link, solutions_link, description";
const GRADE_COLS: &str = "assessment_name, student_username, assessment_kind, value";
const REGRADE_COLS: &str =
    "id, assessment_name, student_username, justification, status, created_at, resolved_at";
const FEEDBACK_COLS: &str =
    "id, instructor_username, instructor_like, instructor_improve, labs_like, labs_improve, created_at";

fn map_create_err(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict
        }
        other => StoreError::Sqlite(other),
    }
}

fn regrade_row_by_id(conn: &Connection, id: &str) -> Result<Option<RegradeRequest>, StoreError> {
    let sql = format!("SELECT {REGRADE_COLS} FROM regrade_requests WHERE id = ?");
    Ok(conn
        .query_row(&sql, [id], regrade_from_row)
        .optional()
        .map_err(StoreError::Sqlite)?)
}

impl EntityStore for SqliteStore {
    fn person(&self, username: &str) -> Result<Option<Person>, StoreError> {
        let sql = format!("SELECT {PERSON_COLS} FROM persons WHERE username = ?");
        Ok(self
            .conn
            .query_row(&sql, [username], person_from_row)
            .optional()?)
    }

    fn assessment(&self, name: &str) -> Result<Option<Assessment>, StoreError> {
        let sql = format!("SELECT {ASSESSMENT_COLS} FROM assessments WHERE name = ?");
        Ok(self
            .conn
            .query_row(&sql, [name], assessment_from_row)
            .optional()?)
    }

    fn grade(
        &self,
        assessment_name: &str,
        student_username: &str,
    ) -> Result<Option<Grade>, StoreError> {
        let sql = format!(
            "SELECT {GRADE_COLS} FROM grades WHERE assessment_name = ? AND student_username = ?"
        );
        Ok(self
            .conn
            .query_row(&sql, [assessment_name, student_username], grade_from_row)
            .optional()?)
    }

    fn open_regrade(
        &self,
        assessment_name: &str,
        student_username: &str,
    ) -> Result<Option<RegradeRequest>, StoreError> {
        let sql = format!(
            "SELECT {REGRADE_COLS} FROM regrade_requests
             WHERE assessment_name = ? AND student_username = ? AND status = 'open'"
        );
        Ok(self
            .conn
            .query_row(&sql, [assessment_name, student_username], regrade_from_row)
            .optional()?)
    }

    fn regrade_by_id(&self, id: &str) -> Result<Option<RegradeRequest>, StoreError> {
        regrade_row_by_id(&self.conn, id)
    }

    fn persons(&self, role: Option<Role>) -> Result<Vec<Person>, StoreError> {
        let mut sql = format!("SELECT {PERSON_COLS} FROM persons");
        let mut binds: Vec<Value> = Vec::new();
        if let Some(role) = role {
            sql.push_str(" WHERE role = ?");
            binds.push(Value::Text(role.as_str().to_string()));
        }
        sql.push_str(" ORDER BY username");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(binds), person_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows)
    }

    fn assessments(&self, kind: Option<AssessmentKind>) -> Result<Vec<Assessment>, StoreError> {
        let mut sql = format!("SELECT {ASSESSMENT_COLS} FROM assessments");
        let mut binds: Vec<Value> = Vec::new();
        if let Some(kind) = kind {
            sql.push_str(" WHERE kind = ?");
            binds.push(Value::Text(kind.as_str().to_string()));
        }
        sql.push_str(" ORDER BY name");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(binds), assessment_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows)
    }

    fn grades(&self, filter: &GradeFilter) -> Result<Vec<Grade>, StoreError> {
        let mut sql = format!("SELECT {GRADE_COLS} FROM grades");
        let mut clauses: Vec<&str> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        if let Some(assessment) = &filter.assessment_name {
            clauses.push("assessment_name = ?");
            binds.push(Value::Text(assessment.clone()));
        }
        if let Some(student) = &filter.student_username {
            clauses.push("student_username = ?");
            binds.push(Value::Text(student.clone()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY assessment_name, student_username");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(binds), grade_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows)
    }

    fn regrades(&self, filter: &RegradeFilter) -> Result<Vec<RegradeRequest>, StoreError> {
        let mut sql = format!("SELECT {REGRADE_COLS} FROM regrade_requests");
        let mut clauses: Vec<&str> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            binds.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(student) = &filter.student_username {
            clauses.push("student_username = ?");
            binds.push(Value::Text(student.clone()));
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at, id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(binds), regrade_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows)
    }

    fn feedback_for(&self, instructor_username: &str) -> Result<Vec<Feedback>, StoreError> {
        let sql = format!(
            "SELECT {FEEDBACK_COLS} FROM feedback
             WHERE instructor_username = ?
             ORDER BY created_at DESC, id DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([instructor_username], feedback_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
        Ok(rows)
    }

    fn create_person(&self, person: &Person) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO persons(username, first_name, last_name, credential, role)
                 VALUES(?, ?, ?, ?, ?)",
                (
                    &person.username,
                    &person.first_name,
                    &person.last_name,
                    &person.credential,
                    person.role,
                ),
            )
            .map_err(map_create_err)?;
        Ok(())
    }

    fn create_assessment(&self, assessment: &Assessment) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO assessments(
                   name, kind, due_date, location, weight, handout_link, solutions_link, description
                 ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
                (
                    &assessment.name,
                    assessment.kind,
                    assessment.due_date.as_deref(),
                    assessment.location.as_deref(),
                    assessment.weight,
                    assessment.handout_link.as_deref(),
                    assessment.solutions_link.as_deref(),
                    &assessment.description,
                ),
            )
            .map_err(map_create_err)?;
        Ok(())
    }

    fn create_grade(&self, grade: &Grade) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO grades(assessment_name, student_username, assessment_kind, value)
                 VALUES(?, ?, ?, ?)",
                (
                    &grade.assessment_name,
                    &grade.student_username,
                    grade.assessment_kind,
                    grade.value,
                ),
            )
            .map_err(map_create_err)?;
        Ok(())
    }

    fn create_regrade(&self, request: &RegradeRequest) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO regrade_requests(
                   id, assessment_name, student_username, justification, status, created_at, resolved_at
                 ) VALUES(?, ?, ?, ?, ?, ?, ?)",
                (
                    &request.id,
                    &request.assessment_name,
                    &request.student_username,
                    &request.justification,
                    request.status,
                    &request.created_at,
                    request.resolved_at.as_deref(),
                ),
            )
            .map_err(map_create_err)?;
        Ok(())
    }

    fn create_feedback(&self, feedback: &Feedback) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO feedback(
                   id, instructor_username, instructor_like, instructor_improve, labs_like, labs_improve, created_at
                 ) VALUES(?, ?, ?, ?, ?, ?, ?)",
                (
                    &feedback.id,
                    &feedback.instructor_username,
                    &feedback.instructor_like,
                    &feedback.instructor_improve,
                    &feedback.labs_like,
                    &feedback.labs_improve,
                    &feedback.created_at,
                ),
            )
            .map_err(map_create_err)?;
        Ok(())
    }

    fn transactionally(
        &self,
        work: &mut dyn FnMut(&dyn StoreTx) -> Result<(), EngineError>,
    ) -> Result<(), EngineError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| EngineError::Store(StoreError::Sqlite(e)))?;
        let outcome = {
            let view = SqliteTx { conn: &tx };
            work(&view)
        };
        match outcome {
            Ok(()) => tx
                .commit()
                .map_err(|e| EngineError::Store(StoreError::Sqlite(e))),
            Err(e) => {
                if let Err(rb) = tx.rollback() {
                    tracing::error!(error = %rb, "transaction rollback failed");
                }
                Err(e)
            }
        }
    }
}

struct SqliteTx<'a> {
    conn: &'a Connection,
}

impl StoreTx for SqliteTx<'_> {
    fn regrade_by_id(&self, id: &str) -> Result<Option<RegradeRequest>, StoreError> {
        regrade_row_by_id(self.conn, id)
    }

    fn overwrite_grade_value(
        &self,
        assessment_name: &str,
        student_username: &str,
        value: f64,
    ) -> Result<usize, StoreError> {
        Ok(self.conn.execute(
            "UPDATE grades SET value = ? WHERE assessment_name = ? AND student_username = ?",
            (value, assessment_name, student_username),
        )?)
    }

    fn mark_regrade_resolved(&self, id: &str, resolved_at: &str) -> Result<usize, StoreError> {
        Ok(self.conn.execute(
            "UPDATE regrade_requests SET status = 'resolved', resolved_at = ? WHERE id = ? AND status = 'open'",
            (resolved_at, id),
        )?)
    }
}
