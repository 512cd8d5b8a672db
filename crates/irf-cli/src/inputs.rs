//! JSON input files
//!
//! ```json
//! {
//!   "inputs": {"revenue": "$35.1B", "eps_gaap": 0.78},
//!   "references": [{"id": 1, "title": "Form 10-Q", "source": "SEC"}]
//! }
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use irf_core::{InputProvider, Reference, Ticker};
use irf_schema::SectionInputs;
use serde::Deserialize;

/// Parsed input file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputFile {
    #[serde(default)]
    pub inputs: SectionInputs,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl InputFile {
    /// Read and parse `path`
    ///
    /// # Errors
    /// Unreadable file or invalid JSON
    pub fn read(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        serde_json::from_str(&text).map_err(|e| format!("invalid input file {}: {e}", path.display()))
    }
}

/// [`InputProvider`] backed by one JSON file
#[derive(Debug, Clone)]
pub struct JsonFileInputs {
    path: PathBuf,
}

impl JsonFileInputs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// References listed in the file
    ///
    /// # Errors
    /// As [`InputFile::read`]
    pub fn references(&self) -> Result<Vec<Reference>, String> {
        Ok(InputFile::read(&self.path)?.references)
    }
}

#[async_trait]
impl InputProvider for JsonFileInputs {
    async fn fetch(&self, _ticker: &Ticker) -> Result<SectionInputs, String> {
        Ok(InputFile::read(&self.path)?.inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_inputs_and_references() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvda.json");
        std::fs::write(
            &path,
            r#"{"inputs":{"revenue":"$35.1B","eps_gaap":0.78},
                "references":[{"id":1,"title":"Form 10-Q","source":"SEC"}]}"#,
        )
        .unwrap();
        let provider = JsonFileInputs::new(&path);
        let inputs = provider.fetch(&Ticker::parse("NVDA").unwrap()).await.unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(provider.references().unwrap()[0].title, "Form 10-Q");
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let provider = JsonFileInputs::new("/nonexistent/inputs.json");
        assert!(provider.fetch(&Ticker::parse("NVDA").unwrap()).await.is_err());
    }
}
