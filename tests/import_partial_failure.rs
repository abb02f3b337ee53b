
use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir};

#[test]
fn bad_row_is_recorded_and_the_batch_continues() {
    let workspace = temp_dir("rosterd-partial-failure");
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

    let rows = json!([
        { "first_name": "Ana", "last_name": "Ruiz" },
        { "first_name": "Luis", "last_name": "   " },
        { "first_name": "Marco", "last_name": "Vega" }
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
    assert_eq!(result["result"]["errors"], json!(1));
    let messages = result["result"]["errorMessages"]
        .as_array()
        .expect("error messages");
    assert_eq!(messages.len(), 1);
    // Spreadsheet numbering: 1-based rows plus the header row.
    assert_eq!(
        messages[0],
        json!("Error in row 3: first_name and last_name are required")
    );

    let students = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.list",
        json!({ "programId": program_id }),
    );
    assert_eq!(students["students"].as_array().expect("students").len(), 2);
}
