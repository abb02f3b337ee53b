use rusqlite::Connection;
use uuid::Uuid;

use crate::import::matching::{find_exact_student, rank_candidates};
use crate::import::upsert::{ensure_relationship, upsert_parent, upsert_student, StudentAction};
use crate::import::{DuplicateCandidate, ImportResult, ImportRow};
use crate::store::Scope;

const MISSING_NAMES: &str = "first_name and last_name are required";

/// A row suspended on a human decision. The token must be echoed back by
/// the resolver; it guards against stale prompts after an abort/restart.
#[derive(Debug, Clone)]
pub struct PendingDecision {
    pub token: String,
    pub row_index: usize,
    pub candidate: DuplicateCandidate,
    pub candidate_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Update,
    Create,
    Cancel,
}

impl Decision {
    pub fn parse(raw: &str) -> Option<Decision> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "update" => Some(Decision::Update),
            "create" => Some(Decision::Create),
            "cancel" => Some(Decision::Cancel),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ResolveError {
    NoPendingDecision,
    BadToken,
}

enum RowOutcome {
    Added,
    Updated,
    Paused,
}

/// One batch run. Rows are processed strictly in file order; the session
/// suspends as a value while a row waits on the duplicate-confirmation
/// prompt, and nothing later commits until that row resolves.
pub struct ImportSession {
    pub scope: Scope,
    pub rows: Vec<ImportRow>,
    pub result: ImportResult,
    pub pending: Option<PendingDecision>,
    cursor: usize,
}

impl ImportSession {
    pub fn new(scope: Scope, rows: Vec<ImportRow>) -> ImportSession {
        ImportSession {
            scope,
            rows,
            result: ImportResult::default(),
            pending: None,
            cursor: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_none() && self.cursor >= self.rows.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Drives rows until the batch finishes or a row suspends on a decision.
    /// Per-row failures are recorded and never abort the batch.
    pub fn run_until_pause(&mut self, conn: &Connection) {
        while self.pending.is_none() && self.cursor < self.rows.len() {
            let row = self.rows[self.cursor].clone();
            match self.process_row(conn, &row) {
                Ok(RowOutcome::Paused) => return,
                Ok(RowOutcome::Added) => {
                    self.result.added += 1;
                    self.cursor += 1;
                }
                Ok(RowOutcome::Updated) => {
                    self.result.updated += 1;
                    self.cursor += 1;
                }
                Err(message) => {
                    self.result.record_error(self.cursor, &message);
                    self.cursor += 1;
                }
            }
        }
    }

    fn process_row(&mut self, conn: &Connection, row: &ImportRow) -> Result<RowOutcome, String> {
        if !row.has_required_names() {
            return Err(MISSING_NAMES.to_string());
        }

        if let Some(existing) =
            find_exact_student(conn, &self.scope, &row.first_name, &row.last_name)
                .map_err(|e| e.to_string())?
        {
            self.apply_row(conn, row, &StudentAction::Merge(existing.id))?;
            return Ok(RowOutcome::Updated);
        }

        let candidates = rank_candidates(conn, &self.scope, row).map_err(|e| e.to_string())?;
        let candidate_count = candidates.len();
        match candidates.into_iter().next() {
            None => {
                self.apply_row(conn, row, &StudentAction::Create)?;
                Ok(RowOutcome::Added)
            }
            Some(best) => {
                self.pending = Some(PendingDecision {
                    token: Uuid::new_v4().to_string(),
                    row_index: self.cursor,
                    candidate: best,
                    candidate_count,
                });
                Ok(RowOutcome::Paused)
            }
        }
    }

    /// Finishes the suspended row with the prompt's decision and continues
    /// the batch. Cancel is a terminal non-error outcome for the row: no
    /// counter moves.
    pub fn resolve(
        &mut self,
        conn: &Connection,
        token: &str,
        decision: Decision,
    ) -> Result<(), ResolveError> {
        let pending = match self.pending.take() {
            Some(p) if p.token == token => p,
            Some(p) => {
                self.pending = Some(p);
                return Err(ResolveError::BadToken);
            }
            None => return Err(ResolveError::NoPendingDecision),
        };
        let row = self.rows[pending.row_index].clone();

        match decision {
            Decision::Cancel => {}
            Decision::Update => {
                let action = StudentAction::Merge(pending.candidate.student.id.clone());
                match self.apply_row(conn, &row, &action) {
                    Ok(()) => self.result.updated += 1,
                    Err(message) => self.result.record_error(pending.row_index, &message),
                }
            }
            Decision::Create => match self.apply_row(conn, &row, &StudentAction::Create) {
                Ok(()) => self.result.added += 1,
                Err(message) => self.result.record_error(pending.row_index, &message),
            },
        }

        self.cursor = pending.row_index + 1;
        self.run_until_pause(conn);
        Ok(())
    }

    /// Student write, then the independent parent flow, then the join row.
    fn apply_row(
        &self,
        conn: &Connection,
        row: &ImportRow,
        action: &StudentAction,
    ) -> Result<(), String> {
        let student_id = upsert_student(conn, &self.scope, row, action)?;
        if row.has_parent_fields() {
            let parent_id = upsert_parent(conn, &self.scope, row)?;
            ensure_relationship(conn, &student_id, &parent_id, row)?;
        }
        Ok(())
    }
}

/// Per-row dry-run classification backing `import.preview`: the matching
/// phase with no writes.
#[derive(Debug, Clone)]
pub enum RowClass {
    Invalid,
    Exact { student_id: String },
    Fuzzy { candidates: Vec<DuplicateCandidate> },
    New,
}

pub fn classify_rows(
    conn: &Connection,
    scope: &Scope,
    rows: &[ImportRow],
) -> rusqlite::Result<Vec<RowClass>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if !row.has_required_names() {
            out.push(RowClass::Invalid);
            continue;
        }
        if let Some(existing) = find_exact_student(conn, scope, &row.first_name, &row.last_name)? {
            out.push(RowClass::Exact {
                student_id: existing.id,
            });
            continue;
        }
        let candidates = rank_candidates(conn, scope, row)?;
        if candidates.is_empty() {
            out.push(RowClass::New);
        } else {
            out.push(RowClass::Fuzzy { candidates });
        }
    }
    Ok(out)
}
