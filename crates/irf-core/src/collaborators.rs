//! Seams to the outside world
//!
//! - [`TextGenerator`]: turns an assembled prompt into section text
//! - [`InputProvider`]: fetches the financial inputs a report needs
//! - [`ReportSink`]: persists every committed section transition

use async_trait::async_trait;
use irf_schema::{SectionId, SectionInputs};
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, PersistError};
use crate::status::SectionState;
use crate::types::{ReportId, Ticker};

/// Everything a generator needs for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Section being written
    pub section_id: SectionId,
    /// Fully assembled user prompt
    pub prompt: String,
    /// Company and period the report covers, e.g. `NVDA Q3 2025`
    pub context: String,
}

/// Produces section text from a prompt
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate the text for one section
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Supplies input data for a ticker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InputProvider: Send + Sync {
    /// Fetch every input known for `ticker`
    async fn fetch(&self, ticker: &Ticker) -> Result<SectionInputs, String>;
}

/// Inputs held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticInputs(pub SectionInputs);

#[async_trait]
impl InputProvider for StaticInputs {
    async fn fetch(&self, _ticker: &Ticker) -> Result<SectionInputs, String> {
        Ok(self.0.clone())
    }
}

/// Receives each section record after a committed transition
///
/// Called while the section is locked; implementations must not call back
/// into the session.
pub trait ReportSink: Send + Sync {
    /// Persist `state` as the current record for `section`
    ///
    /// # Errors
    /// Returns [`PersistError`] when the write did not happen
    fn commit_section(
        &self,
        report: ReportId,
        section: SectionId,
        state: &SectionState,
    ) -> Result<(), PersistError>;
}

/// Sink that keeps nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl ReportSink for NullSink {
    fn commit_section(
        &self,
        _report: ReportId,
        _section: SectionId,
        _state: &SectionState,
    ) -> Result<(), PersistError> {
        Ok(())
    }
}
