
use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir};

#[test]
fn parent_rows_dedupe_across_tiers_and_relationships_stay_unique() {
    let workspace = temp_dir("rosterd-import-parents");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let program = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "programs.create",
        json!({ "organizationId": "org-1", "name": "Youth Orchestra" }),
    );
    let program_id = program["programId"].as_str().expect("program id").to_string();

    // Two siblings sharing one parent, identified by email on the first row
    // and by a differently-formatted phone number on the second.
    let rows = json!([
        {
            "first_name": "Ana", "last_name": "Ruiz",
            "parent_first_name": "Rosa", "parent_last_name": "Ruiz",
            "parent_email": "Rosa@Example.com",
            "parent_phone_number": "(555) 123-4567"
        },
        {
            "first_name": "Marco", "last_name": "Ruiz",
            "parent_first_name": "Rosa", "parent_last_name": "Ruiz",
            "parent_email": "rosa@example.com",
            "relationship_type": "mother"
        }
    ]);
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "import.begin",
        json!({ "programId": program_id, "rows": rows }),
    );
    assert_eq!(result["status"], json!("complete"), "{}", result);
    assert_eq!(result["result"]["added"], json!(2));

    let parents = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "parents.list",
        json!({ "programId": program_id }),
    );
    let listed = parents["parents"].as_array().expect("parents");
    assert_eq!(listed.len(), 1, "{}", parents);
    assert_eq!(listed[0]["fullName"], json!("Rosa Ruiz"));

    let students = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.list",
        json!({ "programId": program_id }),
    );
    let ana = students["students"]
        .as_array()
        .expect("students")
        .iter()
        .find(|s| s["firstName"] == json!("Ana"))
        .expect("Ana in roster")
        .clone();
    let ana_id = ana["id"].as_str().expect("id").to_string();

    // Re-importing Ana's row must not duplicate the relationship.
    let rows = json!([
        {
            "first_name": "Ana", "last_name": "Ruiz",
            "parent_first_name": "Rosa", "parent_last_name": "Ruiz",
            "parent_email": "rosa@example.com"
        }
    ]);
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "import.begin",
        json!({ "programId": program_id, "rows": rows }),
    );
    assert_eq!(again["result"]["updated"], json!(1), "{}", again);

    let links = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "students.parents",
        json!({ "programId": program_id, "studentId": ana_id }),
    );
    let linked = links["parents"].as_array().expect("links");
    assert_eq!(linked.len(), 1);
    assert_eq!(linked[0]["relationshipType"], json!("parent"));
    assert_eq!(linked[0]["isPrimaryContact"], json!(true));
}
