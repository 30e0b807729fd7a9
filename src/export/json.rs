use crate::error::Result;
use std::io::Write;
use std::path::Path;

/// Export any serializable data structure to pretty JSON
pub fn export_json<T, P>(data: &T, output_path: P) -> Result<()>
where
    T: serde::Serialize + ?Sized,
    P: AsRef<Path>,
{
    let json_data = serde_json::to_string_pretty(data)?;

    let mut file = std::fs::File::create(output_path)?;
    file.write_all(json_data.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modifiers::{modifiers_from_json, FatigueModifier, ModifierAdjustments, ModifierCondition, Threshold};
    use tempfile::NamedTempFile;

    #[test]
    fn test_modifiers_survive_export() {
        let modifiers = vec![FatigueModifier::new(
            ModifierCondition::readiness(Threshold::below(25.0)),
            ModifierAdjustments {
                rest_multiplier: Some(1.3),
                ..ModifierAdjustments::default()
            },
            11,
        )];

        let temp_file = NamedTempFile::new().unwrap();
        export_json(&modifiers, temp_file.path()).unwrap();

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.contains("\"readiness\": \"<25\""));
        assert_eq!(modifiers_from_json(&content).unwrap(), modifiers);
    }
}
