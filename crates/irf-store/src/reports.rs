//! Report persistence
//!
//! A report row holds identity, the resolved framework snapshot, inputs and
//! references; each section has its own row. [`ReportRepo`] is also the
//! [`ReportSink`] for live sessions: every section transition is one upsert
//! of that section's row.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use irf_core::{
    PersistError, Quarter, Reference, Report, ReportId, ReportSink, SectionState, Ticker,
};
use irf_resolver::ResolvedFramework;
use irf_schema::{SectionId, SectionInputs};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Listing entry for one stored report
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportListing {
    pub id: ReportId,
    pub ticker: String,
    pub quarter: String,
    pub framework_id: String,
    pub created_at: String,
    /// Sections generated, QA-passed or approved
    pub sections_done: usize,
}

#[derive(Clone)]
pub struct ReportRepo {
    db: Database,
}

impl ReportRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Store a new report and all of its section rows in one transaction
    ///
    /// # Errors
    /// [`StoreError::Conflict`] when a report for the same ticker and
    /// quarter exists
    #[instrument(skip(self, report), fields(report = %report.id, ticker = %report.ticker))]
    pub fn create(&self, report: &Report) -> Result<(), StoreError> {
        let resolved = serde_json::to_string(report.framework.as_ref())?;
        let inputs = serde_json::to_string(&report.inputs)?;
        let references = serde_json::to_string(&report.references)?;

        self.db
            .with_tx(|tx| {
                tx.execute(
                    "INSERT INTO reports (id, ticker, quarter, framework_id, resolved, inputs, refs, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        report.id.to_string(),
                        report.ticker.as_str(),
                        report.quarter.as_str(),
                        report.framework_id().as_str(),
                        resolved,
                        inputs,
                        references,
                        report.created_at.to_rfc3339(),
                    ],
                )?;
                for (id, state) in &report.sections {
                    upsert_section(tx, report.id, *id, state)?;
                }
                Ok(())
            })
            .map_err(|e| match e {
                StoreError::Conflict(_) => StoreError::Conflict(format!(
                    "a report for {} {} already exists",
                    report.ticker, report.quarter
                )),
                other => other,
            })?;
        info!(framework = %report.framework_id(), "report stored");
        Ok(())
    }

    /// Load a report with every section
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for an unknown id
    #[instrument(skip(self), fields(report = %id))]
    pub fn load(&self, id: ReportId) -> Result<Report, StoreError> {
        self.db.with_conn(|conn| {
            let report = conn
                .query_row(
                    "SELECT id, ticker, quarter, resolved, inputs, refs, created_at
                     FROM reports WHERE id = ?1",
                    [id.to_string()],
                    |row| Ok(read_report(row)),
                )
                .optional()?
                .ok_or_else(|| StoreError::NotFound(format!("report {id}")))??;
            attach_sections(conn, report)
        })
    }

    /// Find the report for a ticker and quarter
    ///
    /// # Errors
    /// Database failures and undecodable rows
    #[instrument(skip(self), fields(ticker = %ticker, quarter = %quarter))]
    pub fn find(&self, ticker: &Ticker, quarter: &Quarter) -> Result<Option<Report>, StoreError> {
        let id: Option<String> = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id FROM reports WHERE ticker = ?1 AND quarter = ?2",
                    params![ticker.as_str(), quarter.as_str()],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        match id {
            Some(raw) => {
                let id = row_helpers::parse_enum(&raw, "reports", "id")?;
                self.load(id).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Most recent report for a ticker
    ///
    /// # Errors
    /// Database failures and undecodable rows
    pub fn latest_for(&self, ticker: &Ticker) -> Result<Option<Report>, StoreError> {
        let id: Option<String> = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id FROM reports WHERE ticker = ?1 ORDER BY created_at DESC LIMIT 1",
                    [ticker.as_str()],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        match id {
            Some(raw) => {
                let id = row_helpers::parse_enum(&raw, "reports", "id")?;
                self.load(id).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Every report, newest first
    ///
    /// # Errors
    /// Database failures and undecodable rows
    pub fn list(&self) -> Result<Vec<ReportListing>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.ticker, r.quarter, r.framework_id, r.created_at,
                        (SELECT COUNT(*) FROM report_sections s
                          WHERE s.report_id = r.id
                            AND s.status IN ('generated', 'qa_passed', 'approved'))
                 FROM reports r ORDER BY r.created_at DESC",
            )?;
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let raw_id: String = row_helpers::get(row, 0, "reports", "id")?;
                let done: i64 = row_helpers::get(row, 5, "report_sections", "status")?;
                out.push(ReportListing {
                    id: row_helpers::parse_enum(&raw_id, "reports", "id")?,
                    ticker: row_helpers::get(row, 1, "reports", "ticker")?,
                    quarter: row_helpers::get(row, 2, "reports", "quarter")?,
                    framework_id: row_helpers::get(row, 3, "reports", "framework_id")?,
                    created_at: row_helpers::get(row, 4, "reports", "created_at")?,
                    sections_done: usize::try_from(done).unwrap_or(0),
                });
            }
            Ok(out)
        })
    }

    /// Delete a report and its sections
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for an unknown id
    #[instrument(skip(self), fields(report = %id))]
    pub fn delete(&self, id: ReportId) -> Result<(), StoreError> {
        let removed = self.db.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM reports WHERE id = ?1", [id.to_string()])?)
        })?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("report {id}")));
        }
        info!("report deleted");
        Ok(())
    }

    /// Write one section's state
    ///
    /// # Errors
    /// [`StoreError::NotFound`] when the report does not exist
    pub fn save_section(
        &self,
        report: ReportId,
        section: SectionId,
        state: &SectionState,
    ) -> Result<(), StoreError> {
        self.db.with_conn(|conn| upsert_section(conn, report, section, state))
    }
}

impl ReportSink for ReportRepo {
    fn commit_section(
        &self,
        report: ReportId,
        section: SectionId,
        state: &SectionState,
    ) -> Result<(), PersistError> {
        self.save_section(report, section, state).map_err(|e| {
            warn!(report = %report, section = %section, error = %e, "section commit failed");
            PersistError::from(e)
        })?;
        debug!(report = %report, section = %section, status = %state.status, "section committed");
        Ok(())
    }
}

fn upsert_section(
    conn: &Connection,
    report: ReportId,
    section: SectionId,
    state: &SectionState,
) -> Result<(), StoreError> {
    let findings = serde_json::to_string(&state.qa_findings)?;
    let written = conn.execute(
        "INSERT INTO report_sections
             (report_id, section_id, status, content, qa_findings, generated_at,
              retry_count, stale, last_error, updated_at)
         SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
         WHERE EXISTS (SELECT 1 FROM reports WHERE id = ?1)
         ON CONFLICT(report_id, section_id) DO UPDATE SET
             status = excluded.status,
             content = excluded.content,
             qa_findings = excluded.qa_findings,
             generated_at = excluded.generated_at,
             retry_count = excluded.retry_count,
             stale = excluded.stale,
             last_error = excluded.last_error,
             updated_at = excluded.updated_at",
        params![
            report.to_string(),
            section.get(),
            state.status.as_str(),
            state.content,
            findings,
            state.generated_at.map(|t| t.to_rfc3339()),
            state.retry_count,
            state.stale,
            state.last_error,
            state.updated_at.to_rfc3339(),
        ],
    )?;
    if written == 0 {
        return Err(StoreError::NotFound(format!("report {report}")));
    }
    Ok(())
}

fn read_report(row: &Row<'_>) -> Result<Report, StoreError> {
    let raw_id: String = row_helpers::get(row, 0, "reports", "id")?;
    let ticker: String = row_helpers::get(row, 1, "reports", "ticker")?;
    let quarter: String = row_helpers::get(row, 2, "reports", "quarter")?;
    let resolved: String = row_helpers::get(row, 3, "reports", "resolved")?;
    let inputs: String = row_helpers::get(row, 4, "reports", "inputs")?;
    let references: String = row_helpers::get(row, 5, "reports", "refs")?;
    let created_at: String = row_helpers::get(row, 6, "reports", "created_at")?;

    let framework: ResolvedFramework = row_helpers::parse_json(&resolved, "reports", "resolved")?;
    let inputs: SectionInputs = row_helpers::parse_json(&inputs, "reports", "inputs")?;
    let references: Vec<Reference> = row_helpers::parse_json(&references, "reports", "refs")?;

    Ok(Report {
        id: row_helpers::parse_enum(&raw_id, "reports", "id")?,
        ticker: Ticker::parse(&ticker).map_err(|e| corrupt("reports", "ticker", e))?,
        quarter: Quarter::parse(&quarter).map_err(|e| corrupt("reports", "quarter", e))?,
        framework: framework.into(),
        created_at: parse_time(&created_at, "reports", "created_at")?,
        inputs,
        references,
        sections: BTreeMap::new(),
    })
}

fn attach_sections(conn: &Connection, mut report: Report) -> Result<Report, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT section_id, status, content, qa_findings, generated_at,
                retry_count, stale, last_error, updated_at
         FROM report_sections WHERE report_id = ?1 ORDER BY section_id",
    )?;
    let mut rows = stmt.query([report.id.to_string()])?;
    while let Some(row) = rows.next()? {
        let (id, state) = read_section(row)?;
        report.sections.insert(id, state);
    }
    // rows are written together at creation; fill any gap as pending
    for id in SectionId::all() {
        report.sections.entry(id).or_insert_with(SectionState::pending);
    }
    Ok(report)
}

fn read_section(row: &Row<'_>) -> Result<(SectionId, SectionState), StoreError> {
    const T: &str = "report_sections";
    let raw_id: u32 = row_helpers::get(row, 0, T, "section_id")?;
    let status: String = row_helpers::get(row, 1, T, "status")?;
    let findings: String = row_helpers::get(row, 3, T, "qa_findings")?;
    let generated_at: Option<String> = row_helpers::get_opt(row, 4, T, "generated_at")?;
    let updated_at: String = row_helpers::get(row, 8, T, "updated_at")?;

    let id = SectionId::new(raw_id).map_err(|e| corrupt(T, "section_id", e))?;
    let state = SectionState {
        status: row_helpers::parse_enum(&status, T, "status")?,
        content: row_helpers::get_opt(row, 2, T, "content")?,
        qa_findings: row_helpers::parse_json(&findings, T, "qa_findings")?,
        generated_at: generated_at
            .map(|raw| parse_time(&raw, T, "generated_at"))
            .transpose()?,
        retry_count: row_helpers::get(row, 5, T, "retry_count")?,
        stale: row_helpers::get(row, 6, T, "stale")?,
        last_error: row_helpers::get_opt(row, 7, T, "last_error")?,
        updated_at: parse_time(&updated_at, T, "updated_at")?,
    };
    Ok((id, state))
}

fn parse_time(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| corrupt(table, column, e))
}

fn corrupt(table: &'static str, column: &'static str, e: impl std::fmt::Display) -> StoreError {
    StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irf_core::{create_report, SectionStatus};
    use irf_test_utils::{base_framework, nvda_inputs, sid};
    use pretty_assertions::assert_eq;

    fn repo() -> ReportRepo {
        ReportRepo::new(Database::in_memory().unwrap())
    }

    fn report() -> Report {
        create_report("NVDA", base_framework(), "Q3 2025")
            .unwrap()
            .with_inputs(nvda_inputs())
            .with_references(vec![Reference {
                id: 1,
                title: "10-Q".into(),
                source: Some("SEC".into()),
                url: None,
            }])
    }

    #[test]
    fn create_then_load_restores_everything() {
        let repo = repo();
        let report = report();
        repo.create(&report).unwrap();
        let loaded = repo.load(report.id).unwrap();
        assert_eq!(loaded.ticker, report.ticker);
        assert_eq!(loaded.quarter, report.quarter);
        assert_eq!(loaded.inputs, report.inputs);
        assert_eq!(loaded.references, report.references);
        assert_eq!(loaded.framework.as_ref(), report.framework.as_ref());
        assert_eq!(loaded.sections.len(), 11);
        assert!(loaded
            .sections
            .values()
            .all(|s| s.status == SectionStatus::Pending));
    }

    #[test]
    fn duplicate_ticker_and_quarter_conflicts() {
        let repo = repo();
        repo.create(&report()).unwrap();
        let err = repo.create(&report()).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref m) if m.contains("NVDA")), "got {err:?}");
    }

    #[test]
    fn find_by_ticker_and_quarter() {
        let repo = repo();
        let report = report();
        repo.create(&report).unwrap();
        let found = repo.find(&report.ticker, &report.quarter).unwrap().unwrap();
        assert_eq!(found.id, report.id);
        let other = Quarter::parse("Q4 2025").unwrap();
        assert!(repo.find(&report.ticker, &other).unwrap().is_none());
    }

    #[test]
    fn sink_commit_is_visible_on_reload() {
        let repo = repo();
        let report = report();
        repo.create(&report).unwrap();

        let mut state = SectionState::pending();
        state.status = SectionStatus::Generated;
        state.content = Some("Revenue rose [1].".into());
        state.generated_at = Some(Utc::now());
        state.retry_count = 2;
        state.stale = true;
        repo.commit_section(report.id, sid(3), &state).unwrap();

        let loaded = repo.load(report.id).unwrap();
        let section = &loaded.sections[&sid(3)];
        assert_eq!(section.status, SectionStatus::Generated);
        assert_eq!(section.content.as_deref(), Some("Revenue rose [1]."));
        assert_eq!(section.retry_count, 2);
        assert!(section.stale);
    }

    #[test]
    fn commit_for_unknown_report_fails() {
        let repo = repo();
        let result = repo.commit_section(ReportId::new(), sid(1), &SectionState::pending());
        assert!(result.is_err());
    }

    #[test]
    fn list_counts_finished_sections() {
        let repo = repo();
        let report = report();
        repo.create(&report).unwrap();
        let mut state = SectionState::pending();
        state.status = SectionStatus::QaPassed;
        state.content = Some("done".into());
        repo.save_section(report.id, sid(1), &state).unwrap();

        let listing = repo.list().unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].sections_done, 1);
        assert_eq!(listing[0].framework_id, "base");
    }

    #[test]
    fn delete_cascades_to_sections() {
        let repo = repo();
        let report = report();
        repo.create(&report).unwrap();
        repo.delete(report.id).unwrap();
        assert!(matches!(repo.load(report.id), Err(StoreError::NotFound(_))));
        let orphans: u32 = repo
            .db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM report_sections", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(orphans, 0);
    }
}
