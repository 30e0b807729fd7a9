use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::import::{extension, ImportFormat};
use crate::models::{QuestionnaireResponse, Session};

/// Either a bare array or an object wrapping one
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "questionnaires", alias = "responses")]
        sessions: Vec<T>,
    },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { sessions: items } => items,
        }
    }
}

pub fn parse_sessions(content: &str) -> Result<Vec<Session>> {
    Ok(serde_json::from_str::<Listing<Session>>(content)?.into_vec())
}

pub fn parse_questionnaires(content: &str) -> Result<Vec<QuestionnaireResponse>> {
    let responses = serde_json::from_str::<Listing<QuestionnaireResponse>>(content)?.into_vec();
    debug!(count = responses.len(), "Parsed questionnaires");
    Ok(responses)
}

pub fn import_questionnaires(file_path: &Path) -> Result<Vec<QuestionnaireResponse>> {
    parse_questionnaires(&std::fs::read_to_string(file_path)?)
}

/// JSON session importer
pub struct JsonImporter;

impl ImportFormat for JsonImporter {
    fn can_import(&self, file_path: &Path) -> bool {
        extension(file_path).as_deref() == Some("json")
    }

    fn import_sessions(&self, file_path: &Path) -> Result<Vec<Session>> {
        parse_sessions(&std::fs::read_to_string(file_path)?)
    }

    fn format_name(&self) -> &'static str {
        "JSON"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{fields, SessionStyle};

    #[test]
    fn test_bare_and_wrapped_sessions() {
        let bare = r#"[{"date": "2024-05-01", "power": 200, "duration": 45, "rpe": 7}]"#;
        let wrapped = r#"{"sessions": [
            {"date": "2024-05-02", "power": 180, "duration": 60, "perceivedEffort": 5, "sessionType": "steady-state"}
        ]}"#;

        let a = parse_sessions(bare).unwrap();
        let b = parse_sessions(wrapped).unwrap();

        assert_eq!(a[0].perceived_effort, 7.0);
        assert_eq!(b[0].session_type, Some(SessionStyle::SteadyState));
    }

    #[test]
    fn test_questionnaires() {
        let json = r#"{"questionnaires": [
            {"date": "2024-05-01", "responses": {"sleep": 4, "soreness": 2}}
        ]}"#;
        let responses = parse_questionnaires(json).unwrap();

        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].get(fields::SORENESS), Some(2.0));
        assert_eq!(responses[0].get_or_neutral(fields::ENERGY), 3.0);
    }

    #[test]
    fn test_malformed_json() {
        assert!(parse_sessions("{\"sessions\": 3}").is_err());
    }
}
