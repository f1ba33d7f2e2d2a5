//! Inspect command implementation.

use modelid_core::{Config, IdUid, ModelDocument, ModelFile, PropertyFlags};
use serde::Serialize;
use std::path::Path;

/// Model inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Model file path.
    pub path: String,
    /// Model format version.
    pub model_version: u32,
    /// Minimum parser version.
    pub minimum_parser_version: u32,
    /// Last assigned entity identity.
    pub last_entity_id: IdUid,
    /// Last assigned index identity.
    pub last_index_id: IdUid,
    /// Last assigned relation identity.
    pub last_relation_id: IdUid,
    /// Per-entity summaries.
    pub entities: Vec<EntitySummary>,
    /// Number of retired entity UIDs.
    pub retired_entities: usize,
    /// Number of retired index UIDs.
    pub retired_indexes: usize,
    /// Number of retired property UIDs.
    pub retired_properties: usize,
    /// Number of retired relation UIDs.
    pub retired_relations: usize,
}

/// Summary of a single entity.
#[derive(Debug, Serialize)]
pub struct EntitySummary {
    /// Entity name.
    pub name: String,
    /// Entity identity.
    pub id: IdUid,
    /// Last assigned property identity.
    pub last_property_id: IdUid,
    /// Number of properties.
    pub properties: usize,
    /// Number of indexed properties.
    pub indexes: usize,
    /// Number of standalone relations.
    pub relations: usize,
}

impl InspectResult {
    /// Summarizes a model document.
    pub fn from_document(path: &Path, model: &ModelDocument) -> Self {
        let entities = model
            .entities
            .iter()
            .map(|entity| EntitySummary {
                name: entity.name.clone(),
                id: entity.id,
                last_property_id: entity.last_property_id,
                properties: entity.properties.len(),
                indexes: entity
                    .properties
                    .iter()
                    .filter(|p| p.index_id.is_some())
                    .count(),
                relations: entity.relations.len(),
            })
            .collect();

        Self {
            path: path.display().to_string(),
            model_version: model.model_version,
            minimum_parser_version: model.minimum_parser_version,
            last_entity_id: model.last_entity_id,
            last_index_id: model.last_index_id,
            last_relation_id: model.last_relation_id,
            entities,
            retired_entities: model.retired_entity_uids.len(),
            retired_indexes: model.retired_index_uids.len(),
            retired_properties: model.retired_property_uids.len(),
            retired_relations: model.retired_relation_uids.len(),
        }
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let document = ModelFile::load_document(path, &Config::new().create_if_missing(false))?;
    let result = InspectResult::from_document(path, &document);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result, &document);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult, model: &ModelDocument) {
    println!("modelid Model Inspection");
    println!("========================");
    println!();
    println!("Path: {}", result.path);
    println!(
        "Version: {} (parser minimum {})",
        result.model_version, result.minimum_parser_version
    );
    println!();
    println!("Counters:");
    println!("  Last entity ID:   {}", display_id(result.last_entity_id));
    println!("  Last index ID:    {}", display_id(result.last_index_id));
    println!("  Last relation ID: {}", display_id(result.last_relation_id));
    println!();
    println!("Retired UIDs:");
    println!("  Entities:   {}", result.retired_entities);
    println!("  Indexes:    {}", result.retired_indexes);
    println!("  Properties: {}", result.retired_properties);
    println!("  Relations:  {}", result.retired_relations);

    println!();
    println!("Entities:");
    for entity in &model.entities {
        println!(
            "  [{}] {} (last property {})",
            entity.id,
            entity.name,
            display_id(entity.last_property_id)
        );
        for property in &entity.properties {
            let index = property
                .index_id
                .map(|index| format!(", index {index}"))
                .unwrap_or_default();
            println!(
                "    [{}] {}: type {}{}{}",
                property.id,
                property.name,
                property.property_type,
                format_flags(property.flags()),
                index
            );
        }
        for relation in &entity.relations {
            println!(
                "    [{}] {} -> {}",
                relation.id, relation.name, relation.target_id
            );
        }
    }
}

fn display_id(id: IdUid) -> String {
    if id.is_unset() {
        "-".to_string()
    } else {
        id.to_string()
    }
}

fn format_flags(flags: PropertyFlags) -> String {
    if flags.is_empty() {
        String::new()
    } else {
        format!(", flags {flags:?}")
    }
}
