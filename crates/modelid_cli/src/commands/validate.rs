//! Validate command implementation.

use modelid_core::{Config, ModelFile};
use std::path::Path;
use tracing::info;

/// Runs the validate command.
///
/// Loading already validates the document; this only reports the outcome.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Validating model {:?}", path);

    let model = ModelFile::load_document(path, &Config::new().create_if_missing(false))?;

    let properties: usize = model.entities.iter().map(|e| e.properties.len()).sum();
    let relations: usize = model.entities.iter().map(|e| e.relations.len()).sum();

    println!("Model is valid");
    println!("  Entities:   {}", model.entities.len());
    println!("  Properties: {properties}");
    println!("  Relations:  {relations}");
    println!("  UIDs:       {}", model.all_uids().count());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_model_fails() {
        let temp = tempdir().unwrap();
        assert!(run(&temp.path().join("model.json")).is_err());
    }

    #[test]
    fn empty_file_is_valid_and_untouched() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("model.json");
        fs::write(&path, "").unwrap();

        run(&path).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn duplicate_uid_fails() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("model.json");
        fs::write(
            &path,
            r#"{
  "_note1": "x",
  "entities": [{"id": "1:10", "lastPropertyId": "1:10", "name": "A",
                "properties": [{"id": "1:10", "name": "id", "type": 6}]}],
  "lastEntityId": "1:10",
  "modelVersion": 5,
  "modelVersionParserMinimum": 5
}"#,
        )
        .unwrap();
        assert!(run(&path).is_err());
    }
}
