//! Merge command implementation.

use modelid_core::{
    Binding, Config, ModelError, ModelFile, ReconcileReport, Reconciler, UidRequestOutcome,
};
use std::fs;
use std::path::Path;
use tracing::{error, info};

/// Runs the merge command.
pub fn run(
    model_path: &Path,
    binding_path: &Path,
    out: Option<&Path>,
    prune: bool,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Merging {:?} into {:?}", binding_path, model_path);

    let data = fs::read(binding_path)?;
    let mut binding: Binding = serde_json::from_slice(&data)?;
    let config = Config::new().prune_missing_entities(prune);

    let report = match merge(model_path, &mut binding, &config, dry_run) {
        Ok(report) => report,
        Err(err) => {
            print_remedy(&err);
            return Err(err.into());
        }
    };

    print_report(&report, dry_run);

    let annotated = serde_json::to_string_pretty(&binding)?;
    match out {
        Some(path) => fs::write(path, annotated)?,
        None => println!("{annotated}"),
    }

    Ok(())
}

/// Reconciles `binding` into the model file. A dry run reconciles against
/// a read-only copy and leaves the file as it is, missing or empty included.
pub fn merge(
    model_path: &Path,
    binding: &mut Binding,
    config: &Config,
    dry_run: bool,
) -> Result<ReconcileReport, ModelError> {
    if dry_run {
        let mut document = ModelFile::load_document(model_path, config)?;
        return Reconciler::new(&mut document)
            .with_config(config)
            .reconcile(binding);
    }

    let mut file = ModelFile::load_or_create(model_path, config)?;
    let report = Reconciler::new(file.document_mut())
        .with_config(config)
        .reconcile(binding)?;

    file.write()?;
    file.close()?;
    Ok(report)
}

fn print_remedy(err: &ModelError) {
    let ModelError::UidRequest {
        kind,
        name,
        outcome,
        ..
    } = err
    else {
        return;
    };

    match outcome {
        UidRequestOutcome::Found {
            current,
            suggested: Some(suggested),
        } => {
            error!("{kind} '{name}' already exists in the model, choose one:");
            error!("  [rename] apply the current UID {current} to keep its data");
            error!("  [change/reset] apply the new UID {suggested} to start over");
        }
        UidRequestOutcome::Found {
            current,
            suggested: None,
        } => {
            error!("{kind} '{name}' exists in the model with UID {current}");
            error!("  apply this UID to rename the {kind} while keeping its data");
        }
        UidRequestOutcome::NotFound => {
            error!("{kind} '{name}' is not in the model; remove the empty uid annotation");
        }
    }
}

fn print_report(report: &ReconcileReport, dry_run: bool) {
    if report.is_unchanged() {
        info!("Model is up to date");
        return;
    }

    let prefix = if dry_run { "Would apply" } else { "Applied" };
    info!(
        "{prefix}: entities +{} ~{} -{}, properties +{} ~{} -{} (reset {}), indexes +{} -{}, relations +{} ~{} -{}",
        report.entities_created,
        report.entities_renamed,
        report.entities_removed,
        report.properties_created,
        report.properties_renamed,
        report.properties_removed,
        report.properties_reset,
        report.indexes_created,
        report.indexes_removed,
        report.relations_created,
        report.relations_renamed,
        report.relations_removed,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use modelid_core::{BindingEntity, BindingProperty, ModelDocument};
    use tempfile::tempdir;

    fn binding() -> Binding {
        Binding::new(vec![BindingEntity::new("Note")
            .property(BindingProperty::new("id", 6))
            .property(BindingProperty::new("text", 9))])
    }

    #[test]
    fn merge_writes_model() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("model.json");

        let mut binding = binding();
        let report = merge(&path, &mut binding, &Config::default(), false).unwrap();
        assert_eq!(report.properties_created, 2);

        let model: ModelDocument = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(model.entities[0].name, "Note");
        assert_eq!(Some(model.entities[0].id), binding.entities[0].id);
    }

    #[test]
    fn dry_run_does_not_create_model() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("model.json");

        let mut binding = binding();
        let report = merge(&path, &mut binding, &Config::default(), true).unwrap();
        assert_eq!(report.entities_created, 1);
        assert!(binding.entities[0].id.is_some());
        assert!(!path.exists());
    }

    #[test]
    fn dry_run_leaves_existing_model_untouched() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("model.json");

        let empty = temp.path().join("empty.json");
        fs::write(&empty, "").unwrap();
        merge(&empty, &mut binding(), &Config::default(), true).unwrap();
        assert_eq!(fs::metadata(&empty).unwrap().len(), 0);

        merge(&path, &mut binding(), &Config::default(), false).unwrap();
        let before = fs::read(&path).unwrap();

        let mut changed = binding();
        changed.entities[0].properties.pop();
        let report = merge(&path, &mut changed, &Config::default(), true).unwrap();
        assert_eq!(report.properties_removed, 1);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn run_writes_annotated_binding() {
        let temp = tempdir().unwrap();
        let model_path = temp.path().join("model.json");
        let binding_path = temp.path().join("binding.json");
        let out_path = temp.path().join("annotated.json");
        fs::write(&binding_path, serde_json::to_vec(&binding()).unwrap()).unwrap();

        run(&model_path, &binding_path, Some(&out_path), false, false).unwrap();

        let annotated: Binding = serde_json::from_slice(&fs::read(&out_path).unwrap()).unwrap();
        let note = &annotated.entities[0];
        assert_eq!(note.id.map(|id| id.id()), Some(1));
        assert_eq!(note.last_property_id.map(|id| id.id()), Some(2));
    }

    #[test]
    fn run_reports_uid_request() {
        let temp = tempdir().unwrap();
        let model_path = temp.path().join("model.json");
        let binding_path = temp.path().join("binding.json");

        let mut first = binding();
        merge(&model_path, &mut first, &Config::default(), false).unwrap();

        let mut request = binding();
        request.entities[0].properties[1].uid_request = true;
        fs::write(&binding_path, serde_json::to_vec(&request).unwrap()).unwrap();

        let err = run(&model_path, &binding_path, None, false, false).unwrap_err();
        assert!(err.to_string().contains("[rename]"));
    }
}
