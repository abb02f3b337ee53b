
use serde_json::json;
use test_support::{request_ok, spawn_sidecar, temp_dir};

#[test]
fn import_creates_then_merges_on_reimport() {
    let workspace = temp_dir("rosterd-import-roundtrip");
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

    let rows = json!([{ "first_name": "Ana", "last_name": "Ruiz", "instrument": "Cello" }]);
    let first = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "import.begin",
        json!({ "programId": program_id, "rows": rows }),
    );
    assert_eq!(first["status"], json!("complete"), "{}", first);
    assert_eq!(first["result"]["added"], json!(1));
    assert_eq!(first["result"]["updated"], json!(0));
    assert_eq!(first["result"]["errors"], json!(0));

    let students = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.list",
        json!({ "programId": program_id }),
    );
    let listed = students["students"].as_array().expect("students array");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["instrument"], json!("Cello"));
    let student_id = listed[0]["id"].as_str().expect("student id").to_string();

    // Re-importing the identical row merges into the same student.
    let rows = json!([{ "first_name": "Ana", "last_name": "Ruiz", "age": 12 }]);
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "import.begin",
        json!({ "programId": program_id, "rows": rows }),
    );
    assert_eq!(second["status"], json!("complete"), "{}", second);
    assert_eq!(second["result"]["added"], json!(0));
    assert_eq!(second["result"]["updated"], json!(1));

    let students = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "students.list",
        json!({ "programId": program_id }),
    );
    let listed = students["students"].as_array().expect("students array");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], json!(student_id));
    // The merge kept the instrument the second row omitted.
    assert_eq!(listed[0]["instrument"], json!("Cello"));
    assert_eq!(listed[0]["age"], json!(12));
}
