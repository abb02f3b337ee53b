use rusqlite::Connection;

use crate::import::{DuplicateCandidate, ImportRow};
use crate::names::{normalize, similarity};
use crate::store::{self, Parent, Scope, Student};

/// Candidates below this never reach the confirmation prompt.
pub const CANDIDATE_THRESHOLD: f64 = 0.6;
/// At most this many candidates are surfaced per row.
pub const CANDIDATE_CAP: usize = 5;

/// Finds the student in scope whose normalized (first, last) pair equals the
/// input pair. Several persisted students sharing one key is a pre-existing
/// data-quality condition: the first by stable store ordering wins and the
/// collision is logged.
pub fn find_exact_student(
    conn: &Connection,
    scope: &Scope,
    first_name: &str,
    last_name: &str,
) -> rusqlite::Result<Option<Student>> {
    let key = (normalize(first_name).joined, normalize(last_name).joined);
    if key.0.is_empty() && key.1.is_empty() {
        return Ok(None);
    }

    let matches: Vec<Student> = store::list_students(conn, scope)?
        .into_iter()
        .filter(|s| {
            normalize(&s.first_name).joined == key.0 && normalize(&s.last_name).joined == key.1
        })
        .collect();

    if matches.len() > 1 {
        tracing::warn!(
            first = %key.0,
            last = %key.1,
            ids = ?matches.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            "multiple students share one normalized name key"
        );
    }
    Ok(matches.into_iter().next())
}

/// Scores every student in scope against the row's full name, keeps the
/// fuzzy band (threshold inclusive, 1.0 exclusive: exact hits are the exact
/// matcher's job), sorts descending and caps the list. The sort is stable so
/// equal scores keep store ordering.
pub fn rank_candidates(
    conn: &Connection,
    scope: &Scope,
    row: &ImportRow,
) -> rusqlite::Result<Vec<DuplicateCandidate>> {
    let full_name = row.full_name();
    let mut candidates: Vec<DuplicateCandidate> = store::list_students(conn, scope)?
        .into_iter()
        .filter_map(|student| {
            let score = similarity(&full_name, &format!("{} {}", student.first_name, student.last_name));
            if (CANDIDATE_THRESHOLD..1.0).contains(&score) {
                Some(DuplicateCandidate {
                    student,
                    similarity: score,
                })
            } else {
                None
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(CANDIDATE_CAP);
    Ok(candidates)
}

pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Strict three-tier parent lookup, first match wins, no fuzzy tier:
/// exact email, then exact digits-only phone, then exact normalized name.
pub fn find_parent_match(
    conn: &Connection,
    scope: &Scope,
    row: &ImportRow,
) -> rusqlite::Result<Option<Parent>> {
    let parents = store::list_parents(conn, scope)?;

    if let Some(email) = row.parent_email.as_deref().map(normalize_email) {
        if !email.is_empty() {
            if let Some(p) = parents
                .iter()
                .find(|p| p.email.as_deref().map(normalize_email) == Some(email.clone()))
            {
                return Ok(Some(p.clone()));
            }
        }
    }

    if let Some(phone) = row.parent_phone_number.as_deref().map(normalize_phone) {
        if !phone.is_empty() {
            if let Some(p) = parents.iter().find(|p| {
                p.phone_number
                    .as_deref()
                    .map(normalize_phone)
                    .map(|stored| !stored.is_empty() && stored == phone)
                    .unwrap_or(false)
            }) {
                return Ok(Some(p.clone()));
            }
        }
    }

    let name_key = normalize(&row.parent_full_name()).joined;
    if !name_key.is_empty() {
        if let Some(p) = parents
            .iter()
            .find(|p| normalize(&p.full_name).joined == name_key)
        {
            return Ok(Some(p.clone()));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::store::{insert_parent, insert_student};
    use rusqlite::Connection;
    use uuid::Uuid;

    fn scoped_conn() -> (Connection, Scope) {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        db::init_schema(&conn).expect("schema");
        let scope = Scope {
            organization_id: "org-1".to_string(),
            program_id: "prog-1".to_string(),
        };
        conn.execute(
            "INSERT INTO programs(id, organization_id, name) VALUES(?, ?, ?)",
            (&scope.program_id, &scope.organization_id, "Youth Orchestra"),
        )
        .expect("insert program");
        (conn, scope)
    }

    fn seed_student(conn: &Connection, scope: &Scope, first: &str, last: &str) -> Student {
        let s = Student {
            id: Uuid::new_v4().to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            is_active: true,
            ..Default::default()
        };
        insert_student(conn, scope, &s).expect("insert student");
        s
    }

    fn row(first: &str, last: &str) -> ImportRow {
        ImportRow {
            first_name: first.to_string(),
            last_name: last.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn exact_match_ignores_accents_and_case() {
        let (conn, scope) = scoped_conn();
        let seeded = seed_student(&conn, &scope, "Mar\u{00ed}a", "L\u{00f3}pez");
        let hit = find_exact_student(&conn, &scope, "maria", "LOPEZ").expect("query");
        assert_eq!(hit.map(|s| s.id), Some(seeded.id));
    }

    #[test]
    fn exact_match_prefers_first_by_stable_ordering() {
        let (conn, scope) = scoped_conn();
        seed_student(&conn, &scope, "Ana", "Ruiz");
        seed_student(&conn, &scope, "ana", "ruiz");
        let hit = find_exact_student(&conn, &scope, "Ana", "Ruiz")
            .expect("query")
            .expect("match");
        let listed = store::list_students(&conn, &scope).expect("list");
        assert_eq!(hit.id, listed[0].id);
    }

    #[test]
    fn ranker_drops_below_threshold_and_caps_at_five() {
        let (conn, scope) = scoped_conn();
        seed_student(&conn, &scope, "Maria", "Smith"); // one shared token: 0.0
        for i in 0..7 {
            seed_student(&conn, &scope, "Jesus Anthony", &format!("Delgado{i} Delgado"));
        }
        let candidates =
            rank_candidates(&conn, &scope, &row("Jesus", "Delgado")).expect("rank");
        assert_eq!(candidates.len(), CANDIDATE_CAP);
        assert!(candidates
            .iter()
            .all(|c| c.similarity >= CANDIDATE_THRESHOLD && c.similarity < 1.0));
        assert!(candidates
            .windows(2)
            .all(|w| w[0].similarity >= w[1].similarity));
    }

    #[test]
    fn ranker_excludes_exact_hits() {
        let (conn, scope) = scoped_conn();
        seed_student(&conn, &scope, "Ana", "Ruiz");
        let candidates = rank_candidates(&conn, &scope, &row("Ana", "Ruiz")).expect("rank");
        assert!(candidates.is_empty());
    }

    #[test]
    fn parent_tiers_prefer_email_then_phone_then_name() {
        let (conn, scope) = scoped_conn();
        let by_email = Parent {
            id: Uuid::new_v4().to_string(),
            full_name: "Rosa Delgado".to_string(),
            email: Some("Rosa@Example.com".to_string()),
            ..Default::default()
        };
        let by_phone = Parent {
            id: Uuid::new_v4().to_string(),
            full_name: "R. Delgado".to_string(),
            phone_number: Some("(555) 123-4567".to_string()),
            ..Default::default()
        };
        let by_name = Parent {
            id: Uuid::new_v4().to_string(),
            full_name: "Mar\u{00ed}a Delgado".to_string(),
            ..Default::default()
        };
        for p in [&by_email, &by_phone, &by_name] {
            insert_parent(&conn, &scope, p).expect("insert parent");
        }

        let mut r = ImportRow {
            parent_first_name: Some("Maria".to_string()),
            parent_last_name: Some("Delgado".to_string()),
            parent_phone_number: Some("555.123.4567".to_string()),
            parent_email: Some("rosa@example.com".to_string()),
            ..Default::default()
        };
        let hit = find_parent_match(&conn, &scope, &r).expect("query").expect("match");
        assert_eq!(hit.id, by_email.id);

        r.parent_email = None;
        let hit = find_parent_match(&conn, &scope, &r).expect("query").expect("match");
        assert_eq!(hit.id, by_phone.id);

        r.parent_phone_number = None;
        let hit = find_parent_match(&conn, &scope, &r).expect("query").expect("match");
        assert_eq!(hit.id, by_name.id);

        r.parent_first_name = Some("Nobody".to_string());
        r.parent_last_name = Some("Here".to_string());
        assert!(find_parent_match(&conn, &scope, &r).expect("query").is_none());
    }
}
