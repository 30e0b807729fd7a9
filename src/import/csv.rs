use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::error::{ImportExportError, Result};
use crate::import::{extension, ImportFormat};
use crate::models::{Session, SessionStyle};

/// CSV importer with flexible column names
pub struct CsvImporter {
    column_mapping: HashMap<String, String>,
}

impl Default for CsvImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvImporter {
    pub fn new() -> Self {
        let mut column_mapping = HashMap::new();

        Self::add_mapping(&mut column_mapping, "date", &["date", "day", "session_date"]);
        Self::add_mapping(&mut column_mapping, "power", &["power", "watts", "avg_power", "power_watts"]);
        Self::add_mapping(
            &mut column_mapping,
            "duration",
            &["duration", "minutes", "duration_min", "duration_minutes"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "effort",
            &["rpe", "effort", "perceived_effort", "perceivedeffort"],
        );
        Self::add_mapping(
            &mut column_mapping,
            "session_type",
            &["session_type", "type", "style", "session_style"],
        );

        Self { column_mapping }
    }

    fn add_mapping(mapping: &mut HashMap<String, String>, standard: &str, variations: &[&str]) {
        for variation in variations {
            mapping.insert(variation.to_lowercase(), standard.to_string());
        }
    }

    fn normalize_column_name(&self, name: &str) -> String {
        let normalized = name.trim().to_lowercase().replace([' ', '-'], "_");

        self.column_mapping
            .get(&normalized)
            .cloned()
            .unwrap_or(normalized)
    }

    fn parse_date(value: &str) -> Option<NaiveDate> {
        let formats = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];
        let value = value.trim();
        // Accept full timestamps by keeping only the date part
        let value = value.split(['T', ' ']).next().unwrap_or(value);
        formats
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
    }

    fn parse_number(value: Option<&str>) -> Option<f64> {
        value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
    }

    /// Parse CSV text; rows that cannot be read are skipped with a warning
    pub fn parse_str(&self, content: &str) -> Result<Vec<Session>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let columns: HashMap<String, usize> = reader
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, name)| (self.normalize_column_name(name), i))
            .collect();

        for required in ["date", "power", "duration", "effort"] {
            if !columns.contains_key(required) {
                return Err(ImportExportError::MissingData {
                    field: required.to_string(),
                }
                .into());
            }
        }

        let mut sessions = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            let line = row + 2;

            let Some(date) = field(&columns, &record, "date").and_then(Self::parse_date) else {
                warn!(line, "Skipping session with unreadable date");
                continue;
            };
            let (Some(power), Some(duration), Some(effort)) = (
                Self::parse_number(field(&columns, &record, "power")),
                Self::parse_number(field(&columns, &record, "duration")),
                Self::parse_number(field(&columns, &record, "effort")),
            ) else {
                warn!(line, %date, "Skipping session with missing power, duration or effort");
                continue;
            };

            let mut session = Session::new(date, power, duration, effort);
            session.session_type = field(&columns, &record, "session_type").and_then(SessionStyle::parse);
            sessions.push(session);
        }

        Ok(sessions)
    }
}

fn field<'r>(columns: &HashMap<String, usize>, record: &'r csv::StringRecord, name: &str) -> Option<&'r str> {
    columns.get(name).and_then(|&i| record.get(i))
}

impl ImportFormat for CsvImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        extension(file_path).as_deref() == Some("csv")
    }

    fn import_sessions(&self, file_path: &Path) -> Result<Vec<Session>> {
        let content = std::fs::read_to_string(file_path)?;
        self.parse_str(&content)
    }

    fn format_name(&self) -> &'static str {
        "CSV"
    }
}
