use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

/// Ownership scope every roster query is restricted to. The import engine
/// and the CRUD handlers never touch rows outside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub organization_id: String,
    pub program_id: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Student {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub external_id: Option<String>,
    pub instrument: Option<String>,
    pub instrument_size: Option<String>,
    pub current_grade: Option<String>,
    pub age: Option<i64>,
    pub orchestra_position: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parent {
    pub id: String,
    pub full_name: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub preferred_contact_method: Option<String>,
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

/// Programs carry the organization they belong to; handlers accept a
/// program id and derive the full scope from it.
pub fn resolve_scope(conn: &Connection, program_id: &str) -> rusqlite::Result<Option<Scope>> {
    conn.query_row(
        "SELECT organization_id FROM programs WHERE id = ?",
        [program_id],
        |r| r.get::<_, String>(0),
    )
    .optional()
    .map(|org| {
        org.map(|organization_id| Scope {
            organization_id,
            program_id: program_id.to_string(),
        })
    })
}

fn student_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        first_name: r.get(1)?,
        last_name: r.get(2)?,
        external_id: r.get(3)?,
        instrument: r.get(4)?,
        instrument_size: r.get(5)?,
        current_grade: r.get(6)?,
        age: r.get(7)?,
        orchestra_position: r.get(8)?,
        is_active: r.get::<_, i64>(9)? != 0,
    })
}

const STUDENT_COLS: &str = "id, first_name, last_name, external_id, instrument, instrument_size,
     current_grade, age, orchestra_position, is_active";

pub fn list_students(conn: &Connection, scope: &Scope) -> rusqlite::Result<Vec<Student>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {STUDENT_COLS}
         FROM students
         WHERE program_id = ? AND organization_id = ?
         ORDER BY created_at, id"
    ))?;
    stmt.query_map([&scope.program_id, &scope.organization_id], |r| {
        student_from_row(r)
    })
    .and_then(|it| it.collect())
}

pub fn get_student(
    conn: &Connection,
    scope: &Scope,
    student_id: &str,
) -> rusqlite::Result<Option<Student>> {
    conn.query_row(
        &format!(
            "SELECT {STUDENT_COLS}
             FROM students
             WHERE id = ? AND program_id = ? AND organization_id = ?"
        ),
        [student_id, scope.program_id.as_str(), scope.organization_id.as_str()],
        student_from_row,
    )
    .optional()
}

pub fn insert_student(conn: &Connection, scope: &Scope, s: &Student) -> rusqlite::Result<()> {
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO students(id, program_id, organization_id, first_name, last_name,
            external_id, instrument, instrument_size, current_grade, age,
            orchestra_position, is_active, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &s.id,
            &scope.program_id,
            &scope.organization_id,
            &s.first_name,
            &s.last_name,
            &s.external_id,
            &s.instrument,
            &s.instrument_size,
            &s.current_grade,
            &s.age,
            &s.orchestra_position,
            if s.is_active { 1 } else { 0 },
            &now,
            &now,
        ),
    )?;
    Ok(())
}

/// Writes the full column set from an already-merged in-memory record.
/// Callers own the read-then-overlay step.
pub fn update_student(conn: &Connection, scope: &Scope, s: &Student) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE students
         SET first_name = ?, last_name = ?, external_id = ?, instrument = ?,
             instrument_size = ?, current_grade = ?, age = ?, orchestra_position = ?,
             is_active = ?, updated_at = ?
         WHERE id = ? AND program_id = ? AND organization_id = ?",
        (
            &s.first_name,
            &s.last_name,
            &s.external_id,
            &s.instrument,
            &s.instrument_size,
            &s.current_grade,
            &s.age,
            &s.orchestra_position,
            if s.is_active { 1 } else { 0 },
            &now_rfc3339(),
            &s.id,
            &scope.program_id,
            &scope.organization_id,
        ),
    )?;
    Ok(())
}

fn parent_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Parent> {
    Ok(Parent {
        id: r.get(0)?,
        full_name: r.get(1)?,
        phone_number: r.get(2)?,
        email: r.get(3)?,
        preferred_contact_method: r.get(4)?,
    })
}

const PARENT_COLS: &str = "id, full_name, phone_number, email, preferred_contact_method";

pub fn list_parents(conn: &Connection, scope: &Scope) -> rusqlite::Result<Vec<Parent>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PARENT_COLS}
         FROM parents
         WHERE program_id = ? AND organization_id = ?
         ORDER BY created_at, id"
    ))?;
    stmt.query_map([&scope.program_id, &scope.organization_id], |r| {
        parent_from_row(r)
    })
    .and_then(|it| it.collect())
}

pub fn insert_parent(conn: &Connection, scope: &Scope, p: &Parent) -> rusqlite::Result<()> {
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO parents(id, program_id, organization_id, full_name, phone_number,
            email, preferred_contact_method, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &p.id,
            &scope.program_id,
            &scope.organization_id,
            &p.full_name,
            &p.phone_number,
            &p.email,
            &p.preferred_contact_method,
            &now,
            &now,
        ),
    )?;
    Ok(())
}

pub fn update_parent(conn: &Connection, scope: &Scope, p: &Parent) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE parents
         SET full_name = ?, phone_number = ?, email = ?, preferred_contact_method = ?,
             updated_at = ?
         WHERE id = ? AND program_id = ? AND organization_id = ?",
        (
            &p.full_name,
            &p.phone_number,
            &p.email,
            &p.preferred_contact_method,
            &now_rfc3339(),
            &p.id,
            &scope.program_id,
            &scope.organization_id,
        ),
    )?;
    Ok(())
}

pub fn relationship_exists(
    conn: &Connection,
    student_id: &str,
    parent_id: &str,
) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM student_parents WHERE student_id = ? AND parent_id = ?",
        [student_id, parent_id],
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
}

pub fn insert_relationship(
    conn: &Connection,
    student_id: &str,
    parent_id: &str,
    relationship_type: &str,
    is_primary_contact: bool,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO student_parents(id, student_id, parent_id, relationship_type, is_primary_contact)
         VALUES(?, ?, ?, ?, ?)",
        (
            uuid::Uuid::new_v4().to_string(),
            student_id,
            parent_id,
            relationship_type,
            if is_primary_contact { 1 } else { 0 },
        ),
    )?;
    Ok(())
}

pub fn list_parents_for_student(
    conn: &Connection,
    scope: &Scope,
    student_id: &str,
) -> rusqlite::Result<Vec<(Parent, String, bool)>> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.full_name, p.phone_number, p.email, p.preferred_contact_method,
                sp.relationship_type, sp.is_primary_contact
         FROM parents p
         JOIN student_parents sp ON sp.parent_id = p.id
         WHERE sp.student_id = ? AND p.program_id = ? AND p.organization_id = ?
         ORDER BY p.created_at, p.id",
    )?;
    stmt.query_map(
        [student_id, scope.program_id.as_str(), scope.organization_id.as_str()],
        |r| {
            Ok((
                parent_from_row(r)?,
                r.get::<_, String>(5)?,
                r.get::<_, i64>(6)? != 0,
            ))
        },
    )
    .and_then(|it| it.collect())
}
