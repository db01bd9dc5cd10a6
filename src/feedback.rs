use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

use crate::error::EngineError;
use crate::store::{ActingUser, EntityStore, Feedback, Role};

fn now_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub instructor_username: String,
    pub instructor_like: String,
    pub instructor_improve: String,
    pub labs_like: String,
    pub labs_improve: String,
}

fn required(value: &str, what: &str) -> Result<String, EngineError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation(format!("{what} is required")));
    }
    Ok(trimmed.to_string())
}

/// Appends one anonymous feedback entry addressed to an instructor. The
/// submitting student is deliberately not recorded.
pub fn submit_feedback(
    store: &dyn EntityStore,
    cmd: &NewFeedback,
    acting: &ActingUser,
) -> Result<Feedback, EngineError> {
    if acting.role != Role::Student {
        return Err(EngineError::validation(
            "feedback may only be submitted by students",
        ));
    }
    let instructor_username = required(&cmd.instructor_username, "instructor")?;
    let instructor_like = required(&cmd.instructor_like, "what the instructor does well")?;
    let instructor_improve = required(&cmd.instructor_improve, "what the instructor can improve")?;
    let labs_like = required(&cmd.labs_like, "what works well in labs")?;
    let labs_improve = required(&cmd.labs_improve, "what labs can improve")?;

    let Some(person) = store.person(&instructor_username)? else {
        return Err(EngineError::not_found("instructor not found"));
    };
    if person.role != Role::Instructor {
        return Err(EngineError::validation(
            "feedback may only be addressed to an instructor",
        ));
    }

    let entry = Feedback {
        id: Uuid::new_v4().to_string(),
        instructor_username,
        instructor_like,
        instructor_improve,
        labs_like,
        labs_improve,
        created_at: now_stamp(),
    };
    store.create_feedback(&entry)?;
    Ok(entry)
}

/// The acting instructor's own feedback, newest first. Entries addressed to
/// other instructors stay out of sight.
pub fn feedback_for(
    store: &dyn EntityStore,
    acting: &ActingUser,
) -> Result<Vec<Feedback>, EngineError> {
    if acting.role != Role::Instructor {
        return Err(EngineError::validation(
            "feedback may only be viewed by an instructor",
        ));
    }
    Ok(store.feedback_for(&acting.username)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Person, SqliteStore};

    fn student() -> ActingUser {
        ActingUser {
            username: "alice".to_string(),
            role: Role::Student,
        }
    }

    fn instructor(username: &str) -> ActingUser {
        ActingUser {
            username: username.to_string(),
            role: Role::Instructor,
        }
    }

    fn seed(store: &SqliteStore) {
        for (username, role) in [
            ("alice", Role::Student),
            ("prof", Role::Instructor),
            ("adjunct", Role::Instructor),
        ] {
            store
                .create_person(&Person {
                    username: username.to_string(),
                    first_name: "Test".to_string(),
                    last_name: "Person".to_string(),
                    credential: "$2b$12$hash".to_string(),
                    role,
                })
                .unwrap();
        }
    }

    fn entry_for(instructor: &str) -> NewFeedback {
        NewFeedback {
            instructor_username: instructor.to_string(),
            instructor_like: "clear walkthroughs".to_string(),
            instructor_improve: "post slides earlier".to_string(),
            labs_like: "pairing".to_string(),
            labs_improve: "more TA coverage".to_string(),
        }
    }

    #[test]
    fn submitted_feedback_reaches_only_its_addressee() {
        let s = SqliteStore::open_in_memory().unwrap();
        seed(&s);

        submit_feedback(&s, &entry_for("prof"), &student()).unwrap();
        submit_feedback(&s, &entry_for("prof"), &student()).unwrap();

        let own = feedback_for(&s, &instructor("prof")).unwrap();
        assert_eq!(own.len(), 2);
        assert!(own.iter().all(|f| f.instructor_username == "prof"));
        assert!(own.iter().all(|f| !f.created_at.is_empty()));

        let other = feedback_for(&s, &instructor("adjunct")).unwrap();
        assert!(other.is_empty());
    }

    #[test]
    fn submission_is_student_only_and_complete() {
        let s = SqliteStore::open_in_memory().unwrap();
        seed(&s);

        let err = submit_feedback(&s, &entry_for("prof"), &instructor("adjunct")).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let mut cmd = entry_for("prof");
        cmd.labs_improve = "".to_string();
        let err = submit_feedback(&s, &cmd, &student()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn addressee_must_be_a_known_instructor() {
        let s = SqliteStore::open_in_memory().unwrap();
        seed(&s);

        let err = submit_feedback(&s, &entry_for("ghost"), &student()).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));

        let err = submit_feedback(&s, &entry_for("alice"), &student()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn listing_is_instructor_only() {
        let s = SqliteStore::open_in_memory().unwrap();
        seed(&s);
        let err = feedback_for(&s, &student()).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
}
