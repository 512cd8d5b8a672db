//! Framework store
//!
//! Frameworks are stored as their export document (JSON) plus the
//! fingerprint of their resolution. Nothing is written until the framework
//! resolves, so every stored row is known to produce a valid
//! [`ResolvedFramework`]. The `base` framework is always present and cannot
//! be replaced or deleted.
//!
//! [`FrameworkRepo::resolve_shared`] resolves through a [`ResolutionCache`]
//! shared by every repo handed out by one [`crate::Store`]. Entries are keyed
//! by fingerprint, so an edited framework never hits a stale resolution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use irf_resolver::{DocumentFormat, FrameworkDocument, ResolutionCache, ResolvedFramework};
use irf_schema::{Framework, FrameworkId};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Listing entry for one stored framework
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FrameworkSummary {
    pub id: FrameworkId,
    pub sector: String,
    pub name: String,
    pub description: String,
    pub override_count: usize,
    pub fingerprint: String,
    pub updated_at: String,
}

/// Outcome of [`FrameworkRepo::load_builtin`]
#[derive(Debug, Default)]
pub struct BuiltinLoad {
    /// Frameworks written, in file-name order
    pub loaded: Vec<FrameworkId>,
    /// Files skipped with the reason
    pub rejected: Vec<(PathBuf, String)>,
}

pub struct FrameworkRepo {
    db: Database,
    cache: ResolutionCache,
}

impl FrameworkRepo {
    pub fn new(db: Database) -> Self {
        Self::with_cache(db, ResolutionCache::default())
    }

    pub fn with_cache(db: Database, cache: ResolutionCache) -> Self {
        Self { db, cache }
    }

    /// Insert the base framework if it is missing
    ///
    /// # Errors
    /// Database failures
    pub fn ensure_base(&self) -> Result<(), StoreError> {
        let base = Framework::base();
        let resolved = irf_resolver::resolve(&base)?;
        self.db.with_conn(|conn| {
            if exists(conn, &base.id)? {
                return Ok(());
            }
            write(conn, &base, &resolved)?;
            debug!("base framework stored");
            Ok(())
        })
    }

    /// Every stored framework, base first, then by id
    ///
    /// # Errors
    /// Database failures and undecodable rows
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<FrameworkSummary>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, document, fingerprint, updated_at FROM frameworks
                 ORDER BY CASE WHEN id = 'base' THEN 0 ELSE 1 END, id",
            )?;
            let mut rows = stmt.query([])?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let document: String = row_helpers::get(row, 1, "frameworks", "document")?;
                let framework = decode(&document)?;
                out.push(FrameworkSummary {
                    override_count: framework.override_count(),
                    id: framework.id,
                    sector: framework.sector,
                    name: framework.name,
                    description: framework.description,
                    fingerprint: row_helpers::get(row, 2, "frameworks", "fingerprint")?,
                    updated_at: row_helpers::get(row, 3, "frameworks", "updated_at")?,
                });
            }
            Ok(out)
        })
    }

    /// Load one framework
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for an unknown id
    #[instrument(skip(self), fields(framework = %id))]
    pub fn get(&self, id: &FrameworkId) -> Result<Framework, StoreError> {
        self.db.with_conn(|conn| {
            let document: Option<String> = conn
                .query_row(
                    "SELECT document FROM frameworks WHERE id = ?1",
                    [id.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            match document {
                Some(doc) => decode(&doc),
                None => Err(StoreError::NotFound(format!("framework {id}"))),
            }
        })
    }

    /// Load and resolve one framework
    ///
    /// # Errors
    /// As [`Self::get`], plus resolution failures
    pub fn resolve(&self, id: &FrameworkId) -> Result<ResolvedFramework, StoreError> {
        Ok(irf_resolver::resolve(&self.get(id)?)?)
    }

    /// Load one framework and resolve it through the shared cache
    ///
    /// # Errors
    /// As [`Self::resolve`]
    #[instrument(skip(self), fields(framework = %id))]
    pub async fn resolve_shared(&self, id: &FrameworkId) -> Result<Arc<ResolvedFramework>, StoreError> {
        let framework = self.get(id)?;
        Ok(self.cache.resolve(&framework).await?)
    }

    /// Create a framework; the id must be unused
    ///
    /// # Errors
    /// [`StoreError::Conflict`] when the id exists, [`StoreError::Invalid`]
    /// when the framework does not resolve
    #[instrument(skip(self, framework), fields(framework = %framework.id))]
    pub fn create(&self, framework: &Framework) -> Result<ResolvedFramework, StoreError> {
        guard_base(&framework.id)?;
        let resolved = irf_resolver::resolve(framework)?;
        self.db.with_tx(|tx| {
            if exists(tx, &framework.id)? {
                return Err(StoreError::Conflict(format!(
                    "framework {} already exists",
                    framework.id
                )));
            }
            write(tx, framework, &resolved)
        })?;
        info!(overrides = framework.override_count(), "framework created");
        Ok(resolved)
    }

    /// Create or replace a framework
    ///
    /// # Errors
    /// [`StoreError::Protected`] for `base`, [`StoreError::Invalid`] when
    /// the framework does not resolve
    #[instrument(skip(self, framework), fields(framework = %framework.id))]
    pub fn save(&self, framework: &Framework) -> Result<ResolvedFramework, StoreError> {
        guard_base(&framework.id)?;
        let resolved = irf_resolver::resolve(framework)?;
        self.db.with_conn(|conn| write(conn, framework, &resolved))?;
        info!(overrides = framework.override_count(), "framework saved");
        Ok(resolved)
    }

    /// Delete a framework; reports keep the resolution they were created with
    ///
    /// # Errors
    /// [`StoreError::Protected`] for `base`, [`StoreError::NotFound`] for an
    /// unknown id
    #[instrument(skip(self), fields(framework = %id))]
    pub fn delete(&self, id: &FrameworkId) -> Result<(), StoreError> {
        guard_base(id)?;
        let removed = self.db.with_conn(|conn| {
            Ok(conn.execute("DELETE FROM frameworks WHERE id = ?1", [id.as_str()])?)
        })?;
        if removed == 0 {
            return Err(StoreError::NotFound(format!("framework {id}")));
        }
        info!("framework deleted");
        Ok(())
    }

    /// Copy `source` under `new_id`; the name defaults to `Copy of <name>`
    ///
    /// # Errors
    /// As [`Self::get`] and [`Self::create`]
    pub fn clone_framework(
        &self,
        source: &FrameworkId,
        new_id: FrameworkId,
        new_name: Option<String>,
    ) -> Result<Framework, StoreError> {
        let copy = self.get(source)?.clone_as(new_id, new_name);
        self.create(&copy)?;
        Ok(copy)
    }

    /// Parse, validate and store a framework document in one transaction
    ///
    /// # Errors
    /// Any parse or resolution error; nothing is written on failure
    #[instrument(skip(self, text))]
    pub fn import(&self, text: &str, format: DocumentFormat) -> Result<Framework, StoreError> {
        let (framework, resolved) = irf_resolver::import(text, format)?;
        guard_base(&framework.id)?;
        self.db.with_tx(|tx| write(tx, &framework, &resolved))?;
        info!(framework = %framework.id, "framework imported");
        Ok(framework)
    }

    /// Serialize a stored framework
    ///
    /// # Errors
    /// As [`Self::get`], plus encoding failures
    pub fn export(&self, id: &FrameworkId, format: DocumentFormat) -> Result<String, StoreError> {
        Ok(irf_resolver::export(&self.get(id)?, format)?)
    }

    /// Import every `*.json` / `*.yaml` file in `dir`
    ///
    /// Each file is its own transaction; a bad file is reported in
    /// [`BuiltinLoad::rejected`] and does not stop the others.
    ///
    /// # Errors
    /// Only when the directory itself cannot be read
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub fn load_builtin(&self, dir: &Path) -> Result<BuiltinLoad, StoreError> {
        let mut files: Vec<(PathBuf, DocumentFormat)> = std::fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter_map(|path| match DocumentFormat::from_path(&path) {
                Some(f @ (DocumentFormat::Json | DocumentFormat::Yaml)) => Some((path, f)),
                _ => None,
            })
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut outcome = BuiltinLoad::default();
        for (path, format) in files {
            let result = std::fs::read_to_string(&path)
                .map_err(StoreError::from)
                .and_then(|text| self.import(&text, format));
            match result {
                Ok(framework) => outcome.loaded.push(framework.id),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping framework file");
                    outcome.rejected.push((path, e.to_string()));
                }
            }
        }
        info!(
            loaded = outcome.loaded.len(),
            rejected = outcome.rejected.len(),
            "builtin frameworks loaded"
        );
        Ok(outcome)
    }
}

fn guard_base(id: &FrameworkId) -> Result<(), StoreError> {
    if id.as_str() == FrameworkId::BASE {
        return Err(StoreError::Protected(
            "the base framework cannot be modified".into(),
        ));
    }
    Ok(())
}

fn exists(conn: &Connection, id: &FrameworkId) -> Result<bool, StoreError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM frameworks WHERE id = ?1",
            [id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn write(
    conn: &Connection,
    framework: &Framework,
    resolved: &ResolvedFramework,
) -> Result<(), StoreError> {
    let document = serde_json::to_string(&FrameworkDocument::from(framework))?;
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO frameworks (id, sector, name, document, fingerprint, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(id) DO UPDATE SET
             sector = excluded.sector,
             name = excluded.name,
             document = excluded.document,
             fingerprint = excluded.fingerprint,
             updated_at = excluded.updated_at",
        params![
            framework.id.as_str(),
            framework.sector,
            framework.name,
            document,
            resolved.fingerprint().to_string(),
            now,
        ],
    )?;
    Ok(())
}

fn decode(document: &str) -> Result<Framework, StoreError> {
    let doc: FrameworkDocument = row_helpers::parse_json(document, "frameworks", "document")?;
    doc.into_framework().map_err(|e| StoreError::CorruptRow {
        table: "frameworks",
        column: "document",
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use irf_schema::Override;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn repo() -> FrameworkRepo {
        let repo = FrameworkRepo::new(Database::in_memory().unwrap());
        repo.ensure_base().unwrap();
        repo
    }

    fn fid(s: &str) -> FrameworkId {
        FrameworkId::parse(s).unwrap()
    }

    fn banks() -> Framework {
        Framework::new(fid("banks"), "financials", "Banks")
            .with_override(Override::new(4).set("title", json!("Net Interest Income")))
    }

    #[test]
    fn base_is_always_listed_first() {
        let repo = repo();
        repo.create(&banks()).unwrap();
        let ids: Vec<String> = repo.list().unwrap().into_iter().map(|s| s.id.to_string()).collect();
        assert_eq!(ids, vec!["base".to_string(), "banks".to_string()]);
    }

    #[test]
    fn ensure_base_is_idempotent() {
        let repo = repo();
        repo.ensure_base().unwrap();
        assert_eq!(repo.list().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn shared_resolution_is_reused_until_edited() {
        let store = crate::Store::in_memory().unwrap();
        store.frameworks().create(&banks()).unwrap();

        let first = store.frameworks().resolve_shared(&fid("banks")).await.unwrap();
        let again = store.frameworks().resolve_shared(&fid("banks")).await.unwrap();
        assert!(Arc::ptr_eq(&first, &again));

        let edited = banks().with_override(Override::new(5).set("title", json!("Credit Quality")));
        store.frameworks().save(&edited).unwrap();
        let after = store.frameworks().resolve_shared(&fid("banks")).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &after));
        assert_eq!(after.sections()[4].title, "Credit Quality");
        assert_eq!(*after, store.frameworks().resolve(&fid("banks")).unwrap());
    }

    #[test]
    fn create_then_get_round_trips() {
        let repo = repo();
        let resolved = repo.create(&banks()).unwrap();
        assert_eq!(resolved.framework_id().as_str(), "banks");
        assert_eq!(repo.get(&fid("banks")).unwrap(), banks());
    }

    #[test]
    fn create_rejects_existing_id() {
        let repo = repo();
        repo.create(&banks()).unwrap();
        assert!(matches!(repo.create(&banks()), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn invalid_framework_is_not_written() {
        let repo = repo();
        let bad = Framework::new(fid("cyclic"), "x", "Cyclic")
            .with_override(Override::new(2).set("depends_on", json!([3])))
            .with_override(Override::new(3).set("depends_on", json!([2])));
        assert!(matches!(repo.save(&bad), Err(StoreError::Invalid(_))));
        assert!(matches!(repo.get(&fid("cyclic")), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn base_cannot_be_deleted_or_replaced() {
        let repo = repo();
        assert!(matches!(repo.delete(&fid("base")), Err(StoreError::Protected(_))));
        assert!(matches!(repo.save(&Framework::base()), Err(StoreError::Protected(_))));
    }

    #[test]
    fn delete_unknown_is_not_found() {
        let repo = repo();
        assert!(matches!(repo.delete(&fid("nope")), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn clone_copies_overrides_with_default_name() {
        let repo = repo();
        repo.create(&banks()).unwrap();
        let copy = repo.clone_framework(&fid("banks"), fid("regional_banks"), None).unwrap();
        assert_eq!(copy.name, "Copy of Banks");
        let stored = repo.get(&fid("regional_banks")).unwrap();
        assert_eq!(stored.override_for(4), banks().override_for(4));
    }

    #[test]
    fn save_replaces_existing() {
        let repo = repo();
        repo.create(&banks()).unwrap();
        let updated = banks().with_description("Deposit-funded lenders");
        repo.save(&updated).unwrap();
        assert_eq!(repo.get(&fid("banks")).unwrap().description, "Deposit-funded lenders");
        assert_eq!(repo.list().unwrap().len(), 2);
    }

    #[test]
    fn export_import_round_trip() {
        let repo = repo();
        repo.create(&banks()).unwrap();
        let yaml = repo.export(&fid("banks"), DocumentFormat::Yaml).unwrap();
        repo.delete(&fid("banks")).unwrap();
        let imported = repo.import(&yaml, DocumentFormat::Yaml).unwrap();
        assert_eq!(imported, banks());
    }

    #[test]
    fn import_of_bad_document_writes_nothing() {
        let repo = repo();
        let doc = r#"{"id":"broken","sector":"x","name":"Broken","overrides":[{"section_id":12,"fields":{"title":"t"}}]}"#;
        assert!(repo.import(doc, DocumentFormat::Json).is_err());
        assert_eq!(repo.list().unwrap().len(), 1);
    }
}
