use crate::import::session::{classify_rows, Decision, ImportSession, ResolveError, RowClass};
use crate::import::ImportRow;
use crate::ipc::error::{err, get_required_str, ok, HandlerErr};
use crate::ipc::handlers::students::student_json;
use crate::ipc::types::{AppState, Request};
use crate::store::{self, Scope};
use rusqlite::Connection;
use serde_json::{json, Value};

fn resolve_scope(conn: &Connection, params: &Value) -> Result<Scope, HandlerErr> {
    let program_id = get_required_str(params, "programId")?;
    store::resolve_scope(conn, &program_id)
        .map_err(HandlerErr::db)?
        .ok_or_else(|| HandlerErr::new("not_found", "program not found"))
}

fn parse_rows(params: &Value) -> Result<Vec<ImportRow>, HandlerErr> {
    let Some(raw) = params.get("rows").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::new("bad_params", "missing rows array"));
    };
    Ok(raw.iter().map(ImportRow::from_value).collect())
}

fn row_json(row: &ImportRow, row_index: usize) -> Value {
    json!({
        "rowNumber": row_index + 2,
        "firstName": row.first_name,
        "lastName": row.last_name,
        "displayName": format!("{}, {}", row.last_name, row.first_name),
        "studentExternalId": row.student_external_id,
        "instrument": row.instrument,
        "instrumentSize": row.instrument_size,
        "currentGrade": row.current_grade,
        "age": row.age,
        "orchestraPosition": row.orchestra_position,
        "active": row.active,
        "parentFirstName": row.parent_first_name,
        "parentLastName": row.parent_last_name,
        "parentPhoneNumber": row.parent_phone_number,
        "parentEmail": row.parent_email
    })
}

fn session_response(session: &ImportSession) -> Value {
    match &session.pending {
        None => json!({
            "status": "complete",
            "result": session.result.to_json()
        }),
        Some(p) => {
            let row = &session.rows[p.row_index];
            json!({
                "status": "awaitingDecision",
                "pending": {
                    "token": p.token,
                    "rowNumber": p.row_index + 2,
                    "row": row_json(row, p.row_index),
                    "candidate": student_json(&p.candidate.student),
                    "similarity": p.candidate.similarity,
                    "candidateCount": p.candidate_count
                }
            })
        }
    }
}

fn handle_import_preview(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let scope = match resolve_scope(conn, &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let rows = match parse_rows(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let classes = match classify_rows(conn, &scope, &rows) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut exact = 0usize;
    let mut fuzzy = 0usize;
    let mut new_count = 0usize;
    let mut invalid = 0usize;
    let preview_rows: Vec<Value> = rows
        .iter()
        .zip(classes.iter())
        .enumerate()
        .map(|(i, (row, class))| {
            let mut v = row_json(row, i);
            match class {
                RowClass::Invalid => {
                    invalid += 1;
                    v["status"] = json!("invalid");
                }
                RowClass::Exact { student_id } => {
                    exact += 1;
                    v["status"] = json!("exact");
                    v["matchedStudentId"] = json!(student_id);
                }
                RowClass::New => {
                    new_count += 1;
                    v["status"] = json!("new");
                }
                RowClass::Fuzzy { candidates } => {
                    fuzzy += 1;
                    v["status"] = json!("fuzzy");
                    v["candidates"] = json!(candidates
                        .iter()
                        .map(|c| {
                            json!({
                                "studentId": c.student.id,
                                "displayName": format!(
                                    "{}, {}",
                                    c.student.last_name, c.student.first_name
                                ),
                                "similarity": c.similarity
                            })
                        })
                        .collect::<Vec<_>>());
                }
            }
            v
        })
        .collect();

    ok(
        &req.id,
        json!({
            "rowsTotal": rows.len(),
            "exact": exact,
            "fuzzy": fuzzy,
            "new": new_count,
            "invalid": invalid,
            "previewRows": preview_rows
        }),
    )
}

fn handle_import_begin(state: &mut AppState, req: &Request) -> Value {
    if state.import_session.is_some() {
        return err(
            &req.id,
            "import_in_progress",
            "an import session is already awaiting a decision",
            None,
        );
    }
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let scope = match resolve_scope(conn, &req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let rows = match parse_rows(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let mut session = ImportSession::new(scope, rows);
    session.run_until_pause(conn);
    let resp = ok(&req.id, session_response(&session));
    if !session.is_complete() {
        state.import_session = Some(session);
    }
    resp
}

fn handle_import_resolve(state: &mut AppState, req: &Request) -> Value {
    let token = match get_required_str(&req.params, "token") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let decision_raw = match get_required_str(&req.params, "decision") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(decision) = Decision::parse(&decision_raw) else {
        return err(
            &req.id,
            "bad_params",
            "decision must be one of: update, create, cancel",
            None,
        );
    };

    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(mut session) = state.import_session.take() else {
        return err(&req.id, "no_import_session", "no import is awaiting a decision", None);
    };

    match session.resolve(conn, &token, decision) {
        Ok(()) => {
            let resp = ok(&req.id, session_response(&session));
            if !session.is_complete() {
                state.import_session = Some(session);
            }
            resp
        }
        Err(e) => {
            let resp = match e {
                ResolveError::NoPendingDecision => err(
                    &req.id,
                    "no_import_session",
                    "no row is awaiting a decision",
                    None,
                ),
                ResolveError::BadToken => {
                    err(&req.id, "bad_token", "decision token does not match", None)
                }
            };
            state.import_session = Some(session);
            resp
        }
    }
}

fn handle_import_status(state: &mut AppState, req: &Request) -> Value {
    match state.import_session.as_ref() {
        None => ok(&req.id, json!({ "active": false })),
        Some(session) => ok(
            &req.id,
            json!({
                "active": true,
                "rowsTotal": session.rows.len(),
                "processed": session.cursor(),
                "result": session.result.to_json(),
                "pending": session_response(session)["pending"].clone()
            }),
        ),
    }
}

fn handle_import_abort(state: &mut AppState, req: &Request) -> Value {
    match state.import_session.take() {
        None => err(&req.id, "no_import_session", "no active import", None),
        Some(session) => {
            // Rows already committed stay committed; the tally reflects them.
            ok(
                &req.id,
                json!({ "aborted": true, "result": session.result.to_json() }),
            )
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "import.preview" => Some(handle_import_preview(state, req)),
        "import.begin" => Some(handle_import_begin(state, req)),
        "import.resolve" => Some(handle_import_resolve(state, req)),
        "import.status" => Some(handle_import_status(state, req)),
        "import.abort" => Some(handle_import_abort(state, req)),
        _ => None,
    }
}
