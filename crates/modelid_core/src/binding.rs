//! Binding descriptors.
//!
//! A binding is what the source parser found: entities, properties and
//! relations by name, with optional uid annotations. Reconciliation fills
//! the output fields (`id`, `lastPropertyId`, `indexId`, `targetEntityId`)
//! with the identities the code generator must embed.

use crate::error::{ModelError, ModelResult};
use crate::flags::PropertyFlags;
use crate::id::IdUid;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

/// A complete binding description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    /// Entities found in the source.
    #[serde(default)]
    pub entities: Vec<BindingEntity>,
}

/// An entity as declared in the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingEntity {
    /// Declared name.
    pub name: String,
    /// Explicit uid annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u64>,
    /// Set when the annotation asks for the UID to be reported.
    #[serde(default, skip_serializing_if = "is_false")]
    pub uid_request: bool,
    /// Declared properties.
    #[serde(default)]
    pub properties: Vec<BindingProperty>,
    /// Declared standalone relations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<BindingRelation>,
    /// Resolved identity (output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<IdUid>,
    /// Resolved `lastPropertyId` (output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_property_id: Option<IdUid>,
}

/// A property as declared in the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingProperty {
    /// Declared name.
    pub name: String,
    /// Explicit uid annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u64>,
    /// Set when the annotation asks for the UID to be reported.
    #[serde(default, skip_serializing_if = "is_false")]
    pub uid_request: bool,
    /// Storage type code.
    #[serde(rename = "type")]
    pub property_type: u32,
    /// Storage flag bits, passed through verbatim.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub flags: u32,
    /// Set when the property owns an index.
    #[serde(default, skip_serializing_if = "is_false")]
    pub index: bool,
    /// Target entity name for to-one relation properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_target: Option<String>,
    /// Resolved identity (output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<IdUid>,
    /// Resolved index identity (output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_id: Option<IdUid>,
}

/// A standalone relation as declared in the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingRelation {
    /// Declared name.
    pub name: String,
    /// Explicit uid annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u64>,
    /// Set when the annotation asks for the UID to be reported.
    #[serde(default, skip_serializing_if = "is_false")]
    pub uid_request: bool,
    /// Target entity name.
    pub target: String,
    /// Resolved identity (output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<IdUid>,
    /// Resolved target entity identity (output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_entity_id: Option<IdUid>,
}

impl Binding {
    /// Creates a binding from entities.
    #[must_use]
    pub fn new(entities: Vec<BindingEntity>) -> Self {
        Self { entities }
    }

    /// Finds an entity by exact name.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&BindingEntity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Checks names and uid annotations before reconciliation.
    ///
    /// Names must be non-empty and unique (case-insensitive) within their
    /// scope, and uid annotations must not be zero.
    pub fn validate(&self) -> ModelResult<()> {
        check_names(self.entities.iter().map(|e| e.name.as_str()), "the binding")?;

        for entity in &self.entities {
            check_uid(entity.uid, &entity.name)?;

            let scope = format!("entity '{}'", entity.name);
            check_names(entity.properties.iter().map(|p| p.name.as_str()), &scope)?;
            check_names(entity.relations.iter().map(|r| r.name.as_str()), &scope)?;

            for property in &entity.properties {
                check_uid(property.uid, &property.name)?;
            }
            for relation in &entity.relations {
                check_uid(relation.uid, &relation.name)?;
                if relation.target.is_empty() {
                    return Err(ModelError::invalid_binding(format!(
                        "relation '{}' in {scope} has no target",
                        relation.name
                    )));
                }
            }
        }

        Ok(())
    }
}

fn check_names<'a>(names: impl Iterator<Item = &'a str>, scope: &str) -> ModelResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(ModelError::invalid_binding(format!(
                "empty name in {scope}"
            )));
        }
        if !seen.insert(name.to_lowercase()) {
            return Err(ModelError::invalid_binding(format!(
                "duplicate name '{name}' in {scope}"
            )));
        }
    }
    Ok(())
}

fn check_uid(uid: Option<u64>, name: &str) -> ModelResult<()> {
    if uid == Some(0) {
        return Err(ModelError::invalid_binding(format!(
            "uid annotation on '{name}' must not be zero"
        )));
    }
    Ok(())
}

impl BindingEntity {
    /// Creates an entity declaration.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the uid annotation.
    #[must_use]
    pub fn with_uid(mut self, uid: u64) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Marks the entity as requesting its UID.
    #[must_use]
    pub fn uid_request(mut self) -> Self {
        self.uid_request = true;
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn property(mut self, property: BindingProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// Adds a standalone relation.
    #[must_use]
    pub fn relation(mut self, relation: BindingRelation) -> Self {
        self.relations.push(relation);
        self
    }

    /// Finds a property by exact name.
    #[must_use]
    pub fn find_property(&self, name: &str) -> Option<&BindingProperty> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Finds a relation by exact name.
    #[must_use]
    pub fn find_relation(&self, name: &str) -> Option<&BindingRelation> {
        self.relations.iter().find(|r| r.name == name)
    }
}

impl BindingProperty {
    /// Creates a property declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, property_type: u32) -> Self {
        Self {
            name: name.into(),
            property_type,
            ..Self::default()
        }
    }

    /// Sets the flag bits.
    #[must_use]
    pub fn with_flags(mut self, flags: PropertyFlags) -> Self {
        self.flags = flags.bits();
        self
    }

    /// Sets the uid annotation.
    #[must_use]
    pub fn with_uid(mut self, uid: u64) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Marks the property as requesting its UID.
    #[must_use]
    pub fn uid_request(mut self) -> Self {
        self.uid_request = true;
        self
    }

    /// Requests an index on the property.
    #[must_use]
    pub fn with_index(mut self) -> Self {
        self.index = true;
        self
    }

    /// Makes the property a to-one relation to `target`.
    #[must_use]
    pub fn with_relation_target(mut self, target: impl Into<String>) -> Self {
        self.relation_target = Some(target.into());
        self
    }

    /// Returns true if the property owns an index.
    #[must_use]
    pub const fn wants_index(&self) -> bool {
        self.index
    }
}

impl BindingRelation {
    /// Creates a relation declaration.
    #[must_use]
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            ..Self::default()
        }
    }

    /// Sets the uid annotation.
    #[must_use]
    pub fn with_uid(mut self, uid: u64) -> Self {
        self.uid = Some(uid);
        self
    }

    /// Marks the relation as requesting its UID.
    #[must_use]
    pub fn uid_request(mut self) -> Self {
        self.uid_request = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_binding_json() {
        let json = r#"{
            "entities": [{
                "name": "Task",
                "uid": 12,
                "properties": [
                    {"name": "id", "type": 6, "flags": 8},
                    {"name": "owner", "type": 11, "flags": 8192, "index": true, "relationTarget": "User", "uidRequest": true}
                ],
                "relations": [{"name": "tags", "target": "Tag"}]
            }]
        }"#;
        let binding: Binding = serde_json::from_str(json).unwrap();
        let task = binding.entity("Task").unwrap();
        assert_eq!(task.uid, Some(12));
        assert!(!task.properties[0].wants_index());
        assert!(task.properties[1].wants_index());
        assert!(task.properties[1].uid_request);
        assert_eq!(task.relations[0].target, "Tag");
        binding.validate().unwrap();
    }

    #[test]
    fn outputs_skipped_until_resolved() {
        let entity = BindingEntity::new("Task").property(BindingProperty::new("id", 6));
        let value = serde_json::to_value(&entity).unwrap();
        assert!(value.get("id").is_none());
        assert!(value.get("uidRequest").is_none());
        assert!(value["properties"][0].get("indexId").is_none());
        assert!(value["properties"][0].get("index").is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let binding = Binding::new(vec![
            BindingEntity::new("Task"),
            BindingEntity::new("task"),
        ]);
        assert!(matches!(
            binding.validate(),
            Err(ModelError::InvalidBinding { .. })
        ));

        let binding = Binding::new(vec![BindingEntity::new("Task")
            .property(BindingProperty::new("a", 6))
            .property(BindingProperty::new("A", 6))]);
        assert!(binding.validate().is_err());
    }

    #[test]
    fn zero_uid_rejected() {
        let binding = Binding::new(vec![BindingEntity::new("Task").with_uid(0)]);
        assert!(binding.validate().is_err());
    }

    #[test]
    fn relation_without_target_rejected() {
        let binding = Binding::new(vec![
            BindingEntity::new("Task").relation(BindingRelation::new("tags", ""))
        ]);
        assert!(binding.validate().is_err());
    }
}
