use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("coursebook.sqlite3");
    let conn = Connection::open(db_path)?;
    init_connection(&conn)?;
    Ok(conn)
}

#[cfg(test)]
pub fn open_in_memory() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_connection(&conn)?;
    Ok(conn)
}

fn init_connection(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    // Writers from concurrent processes wait instead of failing immediately.
    conn.busy_timeout(Duration::from_secs(5))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS persons(
            username TEXT PRIMARY KEY,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            credential TEXT NOT NULL,
            role TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessments(
            name TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            due_date TEXT,
            location TEXT,
            weight REAL NOT NULL,
            handout_link TEXT,
            solutions_link TEXT,
            description TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            assessment_name TEXT NOT NULL,
            student_username TEXT NOT NULL,
            assessment_kind TEXT NOT NULL,
            value REAL,
            PRIMARY KEY(assessment_name, student_username),
            FOREIGN KEY(assessment_name) REFERENCES assessments(name),
            FOREIGN KEY(student_username) REFERENCES persons(username)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_username)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS regrade_requests(
            id TEXT PRIMARY KEY,
            assessment_name TEXT NOT NULL,
            student_username TEXT NOT NULL,
            justification TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            resolved_at TEXT,
            FOREIGN KEY(assessment_name) REFERENCES assessments(name),
            FOREIGN KEY(student_username) REFERENCES persons(username)
        )",
        [],
    )?;
    // At most one open request per (assessment, student); resolved rows are
    // history and never collide.
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_regrade_requests_open_pair
         ON regrade_requests(assessment_name, student_username) WHERE status = 'open'",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_regrade_requests_student ON regrade_requests(student_username)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_regrade_requests_status ON regrade_requests(status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS feedback(
            id TEXT PRIMARY KEY,
            instructor_username TEXT NOT NULL,
            instructor_like TEXT NOT NULL,
            instructor_improve TEXT NOT NULL,
            labs_like TEXT NOT NULL,
            labs_improve TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(instructor_username) REFERENCES persons(username)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_feedback_instructor ON feedback(instructor_username)",
        [],
    )?;

    Ok(())
}
