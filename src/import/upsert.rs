use rusqlite::Connection;
use uuid::Uuid;

use crate::import::matching::find_parent_match;
use crate::import::ImportRow;
use crate::store::{self, Parent, Scope, Student};

/// How a row lands on the student table: a fresh record or a merge into an
/// existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentAction {
    Create,
    Merge(String),
}

fn synthesize_external_id() -> String {
    format!("stu-{}", Uuid::new_v4().simple())
}

/// Creates or merges the row's student and returns its id. Merge is
/// additive-only: a present, non-empty row value overwrites the stored
/// field; an absent value never erases data.
pub fn upsert_student(
    conn: &Connection,
    scope: &Scope,
    row: &ImportRow,
    action: &StudentAction,
) -> Result<String, String> {
    match action {
        StudentAction::Create => {
            let student = Student {
                id: Uuid::new_v4().to_string(),
                first_name: row.first_name.trim().to_string(),
                last_name: row.last_name.trim().to_string(),
                external_id: Some(
                    row.student_external_id
                        .clone()
                        .unwrap_or_else(synthesize_external_id),
                ),
                instrument: row.instrument.clone(),
                instrument_size: row.instrument_size.clone(),
                current_grade: row.current_grade.clone(),
                age: row.age,
                orchestra_position: row.orchestra_position.clone(),
                is_active: row.active.unwrap_or(true),
            };
            store::insert_student(conn, scope, &student).map_err(|e| e.to_string())?;
            Ok(student.id)
        }
        StudentAction::Merge(student_id) => {
            let mut student = store::get_student(conn, scope, student_id)
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("student {} not found in scope", student_id))?;

            if row.has_required_names() {
                student.first_name = row.first_name.trim().to_string();
                student.last_name = row.last_name.trim().to_string();
            }
            if let Some(v) = &row.student_external_id {
                student.external_id = Some(v.clone());
            }
            if let Some(v) = &row.instrument {
                student.instrument = Some(v.clone());
            }
            if let Some(v) = &row.instrument_size {
                student.instrument_size = Some(v.clone());
            }
            if let Some(v) = &row.current_grade {
                student.current_grade = Some(v.clone());
            }
            if let Some(v) = row.age {
                student.age = Some(v);
            }
            if let Some(v) = &row.orchestra_position {
                student.orchestra_position = Some(v.clone());
            }
            if let Some(v) = row.active {
                student.is_active = v;
            }

            store::update_student(conn, scope, &student).map_err(|e| e.to_string())?;
            Ok(student.id)
        }
    }
}

/// Matches the row's parent through the strict tiers and creates or merges
/// accordingly. Returns the parent id.
pub fn upsert_parent(conn: &Connection, scope: &Scope, row: &ImportRow) -> Result<String, String> {
    let matched = find_parent_match(conn, scope, row).map_err(|e| e.to_string())?;

    match matched {
        Some(mut parent) => {
            let full_name = row.parent_full_name();
            if !full_name.is_empty() {
                parent.full_name = full_name;
            }
            if let Some(v) = &row.parent_phone_number {
                parent.phone_number = Some(v.clone());
            }
            if let Some(v) = &row.parent_email {
                parent.email = Some(v.clone());
            }
            if let Some(v) = &row.parent_preferred_contact_method {
                parent.preferred_contact_method = Some(v.clone());
            }
            store::update_parent(conn, scope, &parent).map_err(|e| e.to_string())?;
            Ok(parent.id)
        }
        None => {
            let parent = Parent {
                id: Uuid::new_v4().to_string(),
                full_name: row.parent_full_name(),
                phone_number: row.parent_phone_number.clone(),
                email: row.parent_email.clone(),
                preferred_contact_method: row.parent_preferred_contact_method.clone(),
            };
            store::insert_parent(conn, scope, &parent).map_err(|e| e.to_string())?;
            Ok(parent.id)
        }
    }
}

/// A relationship is presence-only, keyed by (student, parent). Re-importing
/// an existing pair is a no-op.
pub fn ensure_relationship(
    conn: &Connection,
    student_id: &str,
    parent_id: &str,
    row: &ImportRow,
) -> Result<(), String> {
    let exists =
        store::relationship_exists(conn, student_id, parent_id).map_err(|e| e.to_string())?;
    if exists {
        return Ok(());
    }
    let relationship_type = row
        .relationship_type
        .clone()
        .unwrap_or_else(|| "parent".to_string());
    store::insert_relationship(conn, student_id, parent_id, &relationship_type, true)
        .map_err(|e| e.to_string())
}
