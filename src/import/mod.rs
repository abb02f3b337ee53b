pub mod matching;
pub mod session;
pub mod upsert;

use serde_json::Value;

/// One parsed spreadsheet record. The UI side owns file parsing; rows reach
/// the daemon as flat key/value objects with spreadsheet column names.
#[derive(Debug, Clone, Default)]
pub struct ImportRow {
    pub first_name: String,
    pub last_name: String,
    pub student_external_id: Option<String>,
    pub instrument: Option<String>,
    pub instrument_size: Option<String>,
    pub current_grade: Option<String>,
    pub age: Option<i64>,
    pub orchestra_position: Option<String>,
    pub active: Option<bool>,
    pub relationship_type: Option<String>,
    pub parent_first_name: Option<String>,
    pub parent_last_name: Option<String>,
    pub parent_phone_number: Option<String>,
    pub parent_email: Option<String>,
    pub parent_preferred_contact_method: Option<String>,
}

fn field_str(v: &Value, key: &str) -> Option<String> {
    match v.get(key) {
        Some(Value::String(s)) => non_empty_trimmed(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn field_i64(v: &Value, key: &str) -> Option<i64> {
    match v.get(key) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn field_bool(v: &Value, key: &str) -> Option<bool> {
    match v.get(key) {
        Some(Value::Bool(b)) => Some(*b),
        Some(Value::String(s)) => parse_boolish(s),
        Some(Value::Number(n)) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

pub fn non_empty_trimmed(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

pub fn parse_boolish(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Some(true),
        "0" | "false" | "no" | "n" => Some(false),
        _ => None,
    }
}

impl ImportRow {
    pub fn from_value(v: &Value) -> ImportRow {
        ImportRow {
            first_name: field_str(v, "first_name").unwrap_or_default(),
            last_name: field_str(v, "last_name").unwrap_or_default(),
            student_external_id: field_str(v, "student_external_id"),
            instrument: field_str(v, "instrument"),
            instrument_size: field_str(v, "instrument_size"),
            current_grade: field_str(v, "current_grade"),
            age: field_i64(v, "age"),
            orchestra_position: field_str(v, "orchestra_position"),
            active: field_bool(v, "active"),
            relationship_type: field_str(v, "relationship_type"),
            parent_first_name: field_str(v, "parent_first_name"),
            parent_last_name: field_str(v, "parent_last_name"),
            parent_phone_number: field_str(v, "parent_phone_number"),
            parent_email: field_str(v, "parent_email"),
            parent_preferred_contact_method: field_str(v, "parent_preferred_contact_method"),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    pub fn parent_full_name(&self) -> String {
        [&self.parent_first_name, &self.parent_last_name]
            .iter()
            .filter_map(|p| p.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn has_parent_fields(&self) -> bool {
        self.parent_first_name.is_some()
            || self.parent_last_name.is_some()
            || self.parent_phone_number.is_some()
            || self.parent_email.is_some()
    }

    pub fn has_required_names(&self) -> bool {
        !self.first_name.trim().is_empty() && !self.last_name.trim().is_empty()
    }
}

/// One batch's tally. Error messages carry spreadsheet row numbers: rows are
/// 1-based and the sheet has a header row, so row index n reports as n + 2.
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub added: usize,
    pub updated: usize,
    pub errors: usize,
    pub error_messages: Vec<String>,
}

impl ImportResult {
    pub fn record_error(&mut self, row_index: usize, message: &str) {
        self.errors += 1;
        self.error_messages
            .push(format!("Error in row {}: {}", row_index + 2, message));
    }

    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "added": self.added,
            "updated": self.updated,
            "errors": self.errors,
            "errorMessages": self.error_messages,
        })
    }
}

/// An existing student paired with its similarity to an incoming row.
/// Lives only while one row is in the matching phase.
#[derive(Debug, Clone)]
pub struct DuplicateCandidate {
    pub student: crate::store::Student,
    pub similarity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_parsing_trims_and_coerces() {
        let row = ImportRow::from_value(&json!({
            "first_name": "  Ana ",
            "last_name": "Ruiz",
            "age": "12",
            "active": "yes",
            "instrument": "",
            "parent_email": "mom@example.com"
        }));
        assert_eq!(row.first_name, "Ana");
        assert_eq!(row.last_name, "Ruiz");
        assert_eq!(row.age, Some(12));
        assert_eq!(row.active, Some(true));
        assert_eq!(row.instrument, None);
        assert!(row.has_parent_fields());
        assert_eq!(row.full_name(), "Ana Ruiz");
    }

    #[test]
    fn error_messages_use_spreadsheet_row_numbers() {
        let mut result = ImportResult::default();
        result.record_error(0, "boom");
        assert_eq!(result.errors, 1);
        assert_eq!(result.error_messages[0], "Error in row 2: boom");
    }
}
