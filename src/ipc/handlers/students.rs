use crate::import::{non_empty_trimmed, parse_boolish};
use crate::ipc::error::{err, get_required_str, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, Scope, Student};
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

fn resolve_scope(conn: &Connection, params: &Value) -> Result<Scope, HandlerErr> {
    let program_id = get_required_str(params, "programId")?;
    store::resolve_scope(conn, &program_id)
        .map_err(HandlerErr::db)?
        .ok_or_else(|| HandlerErr::new("not_found", "program not found"))
}

pub fn student_json(s: &Student) -> Value {
    json!({
        "id": s.id,
        "firstName": s.first_name,
        "lastName": s.last_name,
        "displayName": format!("{}, {}", s.last_name, s.first_name),
        "externalId": s.external_id,
        "instrument": s.instrument,
        "instrumentSize": s.instrument_size,
        "currentGrade": s.current_grade,
        "age": s.age,
        "orchestraPosition": s.orchestra_position,
        "isActive": s.is_active
    })
}

fn opt_field(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(non_empty_trimmed)
}

fn students_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let scope = resolve_scope(conn, params)?;
    let students = store::list_students(conn, &scope).map_err(HandlerErr::db)?;
    Ok(json!({
        "students": students.iter().map(student_json).collect::<Vec<_>>()
    }))
}

fn students_create(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let scope = resolve_scope(conn, params)?;
    let first_name = get_required_str(params, "firstName")?;
    let last_name = get_required_str(params, "lastName")?;

    let student = Student {
        id: Uuid::new_v4().to_string(),
        first_name,
        last_name,
        external_id: Some(
            opt_field(params, "externalId")
                .unwrap_or_else(|| format!("stu-{}", Uuid::new_v4().simple())),
        ),
        instrument: opt_field(params, "instrument"),
        instrument_size: opt_field(params, "instrumentSize"),
        current_grade: opt_field(params, "currentGrade"),
        age: params.get("age").and_then(|v| v.as_i64()),
        orchestra_position: opt_field(params, "orchestraPosition"),
        is_active: match params.get("active") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => parse_boolish(s).unwrap_or(true),
            _ => true,
        },
    };
    store::insert_student(conn, &scope, &student)
        .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    Ok(json!({ "student": student_json(&student) }))
}

fn students_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let scope = resolve_scope(conn, params)?;
    let student_id = get_required_str(params, "studentId")?;
    let mut student = store::get_student(conn, &scope, &student_id)
        .map_err(HandlerErr::db)?
        .ok_or_else(|| HandlerErr::new("not_found", "student not found"))?;

    if let Some(v) = opt_field(params, "firstName") {
        student.first_name = v;
    }
    if let Some(v) = opt_field(params, "lastName") {
        student.last_name = v;
    }
    if let Some(v) = opt_field(params, "externalId") {
        student.external_id = Some(v);
    }
    if let Some(v) = opt_field(params, "instrument") {
        student.instrument = Some(v);
    }
    if let Some(v) = opt_field(params, "instrumentSize") {
        student.instrument_size = Some(v);
    }
    if let Some(v) = opt_field(params, "currentGrade") {
        student.current_grade = Some(v);
    }
    if let Some(v) = params.get("age").and_then(|v| v.as_i64()) {
        student.age = Some(v);
    }
    if let Some(v) = opt_field(params, "orchestraPosition") {
        student.orchestra_position = Some(v);
    }
    match params.get("active") {
        Some(Value::Bool(b)) => student.is_active = *b,
        Some(Value::String(s)) => {
            if let Some(b) = parse_boolish(s) {
                student.is_active = b;
            }
        }
        _ => {}
    }

    store::update_student(conn, &scope, &student)
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    Ok(json!({ "student": student_json(&student) }))
}

fn students_parents(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let scope = resolve_scope(conn, params)?;
    let student_id = get_required_str(params, "studentId")?;
    let links =
        store::list_parents_for_student(conn, &scope, &student_id).map_err(HandlerErr::db)?;
    Ok(json!({
        "parents": links
            .iter()
            .map(|(p, relationship_type, is_primary)| {
                json!({
                    "id": p.id,
                    "fullName": p.full_name,
                    "phoneNumber": p.phone_number,
                    "email": p.email,
                    "preferredContactMethod": p.preferred_contact_method,
                    "relationshipType": relationship_type,
                    "isPrimaryContact": is_primary
                })
            })
            .collect::<Vec<_>>()
    }))
}

fn with_conn(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &Value) -> Result<Value, HandlerErr>,
) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_conn(state, req, students_list)),
        "students.create" => Some(with_conn(state, req, students_create)),
        "students.update" => Some(with_conn(state, req, students_update)),
        "students.parents" => Some(with_conn(state, req, students_parents)),
        _ => None,
    }
}
