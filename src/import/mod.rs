use crate::error::{ImportExportError, Result};
use crate::models::{QuestionnaireResponse, Session};
use std::path::Path;
use tracing::info;

pub mod csv;
pub mod json;

/// Source of logged sessions
pub trait ImportFormat {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    fn import_sessions(&self, file_path: &Path) -> Result<Vec<Session>>;

    fn format_name(&self) -> &'static str;
}

/// Picks an importer by file extension
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportManager {
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> =
            vec![Box::new(csv::CsvImporter::new()), Box::new(json::JsonImporter)];
        Self { importers }
    }

    /// Import sessions from a file, sorted by date
    pub fn import_sessions(&self, file_path: &Path) -> Result<Vec<Session>> {
        let importer = self
            .importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .ok_or_else(|| ImportExportError::UnsupportedFormat {
                format: extension(file_path).unwrap_or_else(|| file_path.display().to_string()),
            })?;

        let mut sessions = importer.import_sessions(file_path)?;
        sessions.sort_by_key(|s| s.date);
        info!(
            file = %file_path.display(),
            format = importer.format_name(),
            sessions = sessions.len(),
            "Imported sessions"
        );
        Ok(sessions)
    }

    /// Questionnaires are always JSON
    pub fn import_questionnaires(&self, file_path: &Path) -> Result<Vec<QuestionnaireResponse>> {
        json::import_questionnaires(file_path)
    }
}

pub(crate) fn extension(file_path: &Path) -> Option<String> {
    file_path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}
