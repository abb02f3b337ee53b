use crate::ipc::error::{err, get_required_str, ok, HandlerErr};
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

fn parents_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let scope = resolve_scope(conn, params)?;
    let parents = store::list_parents(conn, &scope).map_err(HandlerErr::db)?;
    Ok(json!({
        "parents": parents
            .iter()
            .map(|p| {
                json!({
                    "id": p.id,
                    "fullName": p.full_name,
                    "phoneNumber": p.phone_number,
                    "email": p.email,
                    "preferredContactMethod": p.preferred_contact_method
                })
            })
            .collect::<Vec<_>>()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "parents.list" => {
            let Some(conn) = state.db.as_ref() else {
                return Some(err(&req.id, "no_workspace", "select a workspace first", None));
            };
            Some(match parents_list(conn, &req.params) {
                Ok(result) => ok(&req.id, result),
                Err(error) => error.response(&req.id),
            })
        }
        _ => None,
    }
}
