//! IRF Store - SQLite persistence
//!
//! Holds named frameworks and reports. Every section transition of a live
//! session is written through [`ReportRepo`]'s [`irf_core::ReportSink`]
//! implementation as one committed row update, so a restarted process sees
//! exactly the last committed state of each section.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod database;
pub mod error;
pub mod frameworks;
pub mod reports;
mod row_helpers;
pub mod schema;

use std::path::Path;

use irf_resolver::ResolutionCache;

pub use database::Database;
pub use error::StoreError;
pub use frameworks::{BuiltinLoad, FrameworkRepo, FrameworkSummary};
pub use reports::{ReportListing, ReportRepo};

/// File name of the database inside the data directory
pub const DB_FILE: &str = "irf.db";

/// Both repositories over one database, with one resolution cache
#[derive(Clone)]
pub struct Store {
    db: Database,
    cache: ResolutionCache,
}

impl Store {
    /// Open `<data_dir>/irf.db`, creating it and the base framework if needed
    ///
    /// # Errors
    /// Database failures
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        Self::with_database(Database::open(&data_dir.join(DB_FILE))?)
    }

    /// In-memory store (for testing)
    ///
    /// # Errors
    /// Database failures
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_database(Database::in_memory()?)
    }

    fn with_database(db: Database) -> Result<Self, StoreError> {
        FrameworkRepo::new(db.clone()).ensure_base()?;
        Ok(Self {
            db,
            cache: ResolutionCache::default(),
        })
    }

    pub fn frameworks(&self) -> FrameworkRepo {
        FrameworkRepo::with_cache(self.db.clone(), self.cache.clone())
    }

    pub fn reports(&self) -> ReportRepo {
        ReportRepo::new(self.db.clone())
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
