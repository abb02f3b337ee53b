use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("roster.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Schema application is separate from `open_db` so tests can run against
/// `Connection::open_in_memory()`.
pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS programs(
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            name TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_programs_org ON programs(organization_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            program_id TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            external_id TEXT,
            instrument TEXT,
            instrument_size TEXT,
            current_grade TEXT,
            age INTEGER,
            orchestra_position TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT,
            updated_at TEXT,
            FOREIGN KEY(program_id) REFERENCES programs(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_program ON students(program_id, organization_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS parents(
            id TEXT PRIMARY KEY,
            program_id TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            full_name TEXT NOT NULL,
            phone_number TEXT,
            email TEXT,
            preferred_contact_method TEXT,
            created_at TEXT,
            updated_at TEXT,
            FOREIGN KEY(program_id) REFERENCES programs(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_parents_program ON parents(program_id, organization_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_parents(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            parent_id TEXT NOT NULL,
            relationship_type TEXT NOT NULL,
            is_primary_contact INTEGER NOT NULL DEFAULT 1,
            UNIQUE(student_id, parent_id),
            FOREIGN KEY(student_id) REFERENCES students(id),
            FOREIGN KEY(parent_id) REFERENCES parents(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_parents_student ON student_parents(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_parents_parent ON student_parents(parent_id)",
        [],
    )?;

    Ok(())
}
