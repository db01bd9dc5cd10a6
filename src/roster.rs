use crate::error::EngineError;
use crate::store::{ActingUser, EntityStore, Grade, Person, Role};

#[derive(Debug, Clone)]
pub struct NewPerson {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Already hashed by the caller; stored opaquely.
    pub credential: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct NewGrade {
    pub assessment_name: String,
    pub student_username: String,
    pub value: Option<f64>,
}

fn required(value: &str, what: &str) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation(format!("{what} is required")));
    }
    Ok(trimmed.to_string())
}

/// Self-service registration; there is no acting user yet.
pub fn register_person(store: &dyn EntityStore, cmd: &NewPerson) -> Result<Person, EngineError> {
    let username = required(&cmd.username, "username")?;
    let first_name = required(&cmd.first_name, "first name")?;
    let last_name = required(&cmd.last_name, "last name")?;
    let credential = required(&cmd.credential, "credential")?;

    if store.person(&username)?.is_some() {
        return Err(EngineError::conflict("this username is already in use"));
    }

    let person = Person {
        username,
        first_name,
        last_name,
        credential,
        role: cmd.role,
    };
    store
        .create_person(&person)
        .map_err(|e| EngineError::from_create(e, "this username is already in use"))?;
    Ok(person)
}

/// Records the one grade row a (assessment, student) pair ever gets. Changing
/// a recorded value afterwards goes through the regrade workflow, never
/// through this door again.
pub fn record_grade(
    store: &dyn EntityStore,
    cmd: &NewGrade,
    acting: &ActingUser,
) -> Result<Grade, EngineError> {
    if acting.role != Role::Instructor {
        return Err(EngineError::validation(
            "grades may only be recorded by an instructor",
        ));
    }
    let assessment_name = required(&cmd.assessment_name, "assessment")?;
    let student_username = required(&cmd.student_username, "student")?;
    if let Some(value) = cmd.value {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return Err(EngineError::validation(
                "grade value must be a number between 0 and 100",
            ));
        }
    }

    let Some(assessment) = store.assessment(&assessment_name)? else {
        return Err(EngineError::not_found("assessment not found"));
    };
    let Some(person) = store.person(&student_username)? else {
        return Err(EngineError::not_found("student not found"));
    };
    if person.role != Role::Student {
        return Err(EngineError::validation(
            "grades may only be recorded for students",
        ));
    }
    if store.grade(&assessment_name, &student_username)?.is_some() {
        return Err(EngineError::conflict(
            "a grade already exists for this student; use a regrade request to change it",
        ));
    }

    let grade = Grade {
        assessment_name,
        student_username,
        assessment_kind: assessment.kind,
        value: cmd.value,
    };
    store.create_grade(&grade).map_err(|e| {
        EngineError::from_create(
            e,
            "a grade already exists for this student; use a regrade request to change it",
        )
    })?;
    Ok(grade)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Assessment, AssessmentKind, SqliteStore};

    fn instructor() -> ActingUser {
        ActingUser {
            username: "prof".to_string(),
            role: Role::Instructor,
        }
    }

    fn new_person(username: &str, role: Role) -> NewPerson {
        NewPerson {
            username: username.to_string(),
            first_name: "Test".to_string(),
            last_name: "Person".to_string(),
            credential: "$2b$12$hash".to_string(),
            role,
        }
    }

    fn seed(store: &SqliteStore) {
        register_person(store, &new_person("alice", Role::Student)).unwrap();
        register_person(store, &new_person("prof", Role::Instructor)).unwrap();
        store
            .create_assessment(&Assessment {
                name: "A1".to_string(),
                kind: AssessmentKind::Assignment,
                due_date: Some("2026-03-01T23:59".to_string()),
                location: None,
                weight: 20.0,
                handout_link: None,
                solutions_link: None,
                description: "work".to_string(),
            })
            .unwrap();
    }

    #[test]
    fn registration_round_trips_and_usernames_are_unique() {
        let s = SqliteStore::open_in_memory().unwrap();
        seed(&s);

        assert_eq!(s.persons(None).unwrap().len(), 2);
        assert_eq!(s.persons(Some(Role::Student)).unwrap().len(), 1);

        let err = register_person(&s, &new_person("alice", Role::Instructor)).unwrap_err();
        match err {
            EngineError::Conflict(msg) => assert_eq!(msg, "this username is already in use"),
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn registration_requires_every_field() {
        let s = SqliteStore::open_in_memory().unwrap();
        let mut cmd = new_person("dana", Role::Student);
        cmd.last_name = " ".to_string();
        let err = register_person(&s, &cmd).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn grades_are_born_once_per_pair() {
        let s = SqliteStore::open_in_memory().unwrap();
        seed(&s);

        let grade = record_grade(
            &s,
            &NewGrade {
                assessment_name: "A1".to_string(),
                student_username: "alice".to_string(),
                value: Some(62.5),
            },
            &instructor(),
        )
        .unwrap();
        assert_eq!(grade.assessment_kind, AssessmentKind::Assignment);
        assert_eq!(s.grade("A1", "alice").unwrap().unwrap().value, Some(62.5));

        let err = record_grade(
            &s,
            &NewGrade {
                assessment_name: "A1".to_string(),
                student_username: "alice".to_string(),
                value: Some(70.0),
            },
            &instructor(),
        )
        .unwrap_err();
        match err {
            EngineError::Conflict(msg) => {
                assert_eq!(
                    msg,
                    "a grade already exists for this student; use a regrade request to change it"
                );
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn ungraded_rows_are_allowed() {
        let s = SqliteStore::open_in_memory().unwrap();
        seed(&s);
        let grade = record_grade(
            &s,
            &NewGrade {
                assessment_name: "A1".to_string(),
                student_username: "alice".to_string(),
                value: None,
            },
            &instructor(),
        )
        .unwrap();
        assert_eq!(grade.value, None);
    }

    #[test]
    fn grade_targets_must_exist_and_be_students() {
        let s = SqliteStore::open_in_memory().unwrap();
        seed(&s);

        let err = record_grade(
            &s,
            &NewGrade {
                assessment_name: "A9".to_string(),
                student_username: "alice".to_string(),
                value: Some(50.0),
            },
            &instructor(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        let err = record_grade(
            &s,
            &NewGrade {
                assessment_name: "A1".to_string(),
                student_username: "ghost".to_string(),
                value: Some(50.0),
            },
            &instructor(),
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        let err = record_grade(
            &s,
            &NewGrade {
                assessment_name: "A1".to_string(),
                student_username: "prof".to_string(),
                value: Some(50.0),
            },
            &instructor(),
        )
        .unwrap_err();
        match err {
            EngineError::Validation(msg) => {
                assert_eq!(msg, "grades may only be recorded for students");
            }
            other => panic!("expected validation, got {other:?}"),
        }
    }

    #[test]
    fn grade_values_are_bounded_and_instructor_only() {
        let s = SqliteStore::open_in_memory().unwrap();
        seed(&s);

        for bad in [-5.0, 100.01, f64::NAN] {
            let err = record_grade(
                &s,
                &NewGrade {
                    assessment_name: "A1".to_string(),
                    student_username: "alice".to_string(),
                    value: Some(bad),
                },
                &instructor(),
            )
            .unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "value {bad}");
        }

        let err = record_grade(
            &s,
            &NewGrade {
                assessment_name: "A1".to_string(),
                student_username: "alice".to_string(),
                value: Some(90.0),
            },
            &ActingUser {
                username: "alice".to_string(),
                role: Role::Student,
            },
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
