use crate::ipc::error::{err, get_required_str, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_programs_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "programs": [] }));
    };

    // Counts let the UI render a dashboard without extra round-trips.
    let mut stmt = match conn.prepare(
        "SELECT
           p.id,
           p.organization_id,
           p.name,
           (SELECT COUNT(*) FROM students s WHERE s.program_id = p.id) AS student_count,
           (SELECT COUNT(*) FROM parents pa WHERE pa.program_id = p.id) AS parent_count
         FROM programs p
         ORDER BY p.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let organization_id: String = row.get(1)?;
            let name: String = row.get(2)?;
            let student_count: i64 = row.get(3)?;
            let parent_count: i64 = row.get(4)?;
            Ok(json!({
                "id": id,
                "organizationId": organization_id,
                "name": name,
                "studentCount": student_count,
                "parentCount": parent_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(programs) => ok(&req.id, json!({ "programs": programs })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_programs_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let organization_id = match get_required_str(&req.params, "organizationId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let name = match get_required_str(&req.params, "name") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let program_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO programs(id, organization_id, name) VALUES(?, ?, ?)",
        (&program_id, &organization_id, &name),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "programs" })),
        );
    }

    ok(
        &req.id,
        json!({ "programId": program_id, "organizationId": organization_id, "name": name }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "programs.list" => Some(handle_programs_list(state, req)),
        "programs.create" => Some(handle_programs_create(state, req)),
        _ => None,
    }
}
