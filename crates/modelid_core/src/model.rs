//! The persisted model document.
//!
//! The model is the authoritative history of schema identities. Entities,
//! properties, relations and indexes keep their [`IdUid`] across renames;
//! removed elements have their UIDs moved to the retired lists so a storage
//! engine never sees a UID reused for something else.
//!
//! Counters:
//! - `lastEntityId`, `lastIndexId`, `lastRelationId` are model-wide
//! - `lastPropertyId` is kept per entity
//!
//! Counters only ever increase; removing the element that holds the highest
//! local ID does not free that ID.

use crate::error::{ElementKind, ModelError, ModelResult};
use crate::flags::PropertyFlags;
use crate::id::IdUid;
use crate::uid::UidPool;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// Model format version written by this crate.
pub const MODEL_VERSION: u32 = 5;

/// Version assumed for files written before version fields existed.
pub const LEGACY_MODEL_VERSION: u32 = 4;

/// Version of the JSON layout itself.
pub const FILE_FORMAT_VERSION: u32 = 1;

/// Notes written at the top of every model file.
pub const NOTES: [&str; 3] = [
    "KEEP THIS FILE! Check it into a version control system (VCS) like git.",
    "modelid manages crucial IDs for your object model. See docs for details.",
    "If you have VCS merge conflicts, you must resolve them according to the modelid docs.",
];

/// Compares element names the way lookups do (case-insensitive).
#[must_use]
pub fn same_name(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// A property of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    /// Identity; the local ID comes from the entity's `lastPropertyId`.
    pub id: IdUid,
    /// Current name.
    pub name: String,
    /// Index identity; independent of the flag bits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_id: Option<IdUid>,
    /// Storage type code, passed through verbatim.
    #[serde(rename = "type")]
    pub property_type: u32,
    /// Storage flag bits, passed through verbatim.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub flags: u32,
    /// Name of the target entity for to-one relation properties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation_target: Option<String>,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

impl Property {
    /// Creates a property without index or flags.
    #[must_use]
    pub fn new(id: IdUid, name: impl Into<String>, property_type: u32) -> Self {
        Self {
            id,
            name: name.into(),
            index_id: None,
            property_type,
            flags: 0,
            relation_target: None,
        }
    }

    /// Returns the flag bits as [`PropertyFlags`].
    #[must_use]
    pub const fn flags(&self) -> PropertyFlags {
        PropertyFlags::from_raw(self.flags)
    }
}

/// A standalone many-to-many relation owned by an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandaloneRelation {
    /// Identity; the local ID comes from the model's `lastRelationId`.
    pub id: IdUid,
    /// Current name.
    pub name: String,
    /// Identity of the target entity.
    #[serde(rename = "targetEntityId", alias = "targetId")]
    pub target_id: IdUid,
}

/// An entity (stored type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Identity; the local ID comes from the model's `lastEntityId`.
    pub id: IdUid,
    /// Highest property identity ever assigned in this entity.
    #[serde(default)]
    pub last_property_id: IdUid,
    /// Current name.
    pub name: String,
    /// Properties in declaration order.
    #[serde(default)]
    pub properties: Vec<Property>,
    /// Standalone relations.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relations: Vec<StandaloneRelation>,
}

impl Entity {
    /// Creates an entity with no properties.
    #[must_use]
    pub fn new(id: IdUid, name: impl Into<String>) -> Self {
        Self {
            id,
            last_property_id: IdUid::UNSET,
            name: name.into(),
            properties: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Position of the property with the given UID.
    #[must_use]
    pub fn property_position_by_uid(&self, uid: u64) -> Option<usize> {
        self.properties.iter().position(|p| p.id.uid() == uid)
    }

    /// Position of the property with the given name.
    #[must_use]
    pub fn property_position_by_name(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| same_name(&p.name, name))
    }

    /// Position of the relation with the given UID.
    #[must_use]
    pub fn relation_position_by_uid(&self, uid: u64) -> Option<usize> {
        self.relations.iter().position(|r| r.id.uid() == uid)
    }

    /// Position of the relation with the given name.
    #[must_use]
    pub fn relation_position_by_name(&self, name: &str) -> Option<usize> {
        self.relations.iter().position(|r| same_name(&r.name, name))
    }

    /// Finds a property by UID.
    pub fn find_property_by_uid(&self, uid: u64) -> ModelResult<&Property> {
        self.property_position_by_uid(uid)
            .map(|pos| &self.properties[pos])
            .ok_or_else(|| ModelError::unknown_uid(ElementKind::Property, uid, self.scope()))
    }

    /// Finds a property by name.
    pub fn find_property_by_name(&self, name: &str) -> ModelResult<&Property> {
        self.property_position_by_name(name)
            .map(|pos| &self.properties[pos])
            .ok_or_else(|| ModelError::not_found(ElementKind::Property, name, self.scope()))
    }

    /// Finds a relation by UID.
    pub fn find_relation_by_uid(&self, uid: u64) -> ModelResult<&StandaloneRelation> {
        self.relation_position_by_uid(uid)
            .map(|pos| &self.relations[pos])
            .ok_or_else(|| ModelError::unknown_uid(ElementKind::Relation, uid, self.scope()))
    }

    /// Finds a relation by name.
    pub fn find_relation_by_name(&self, name: &str) -> ModelResult<&StandaloneRelation> {
        self.relation_position_by_name(name)
            .map(|pos| &self.relations[pos])
            .ok_or_else(|| ModelError::not_found(ElementKind::Relation, name, self.scope()))
    }

    /// Appends a new property with a fresh identity and returns its position.
    ///
    /// The local ID is one past `lastPropertyId`, so IDs of removed
    /// properties are never handed out again.
    pub fn create_property<R: RngCore>(
        &mut self,
        name: &str,
        uids: &mut UidPool<R>,
    ) -> ModelResult<usize> {
        let id = self
            .last_property_id
            .next_id()
            .ok_or(ModelError::CounterOverflow {
                kind: ElementKind::Property,
            })?;
        let identity = IdUid::new(id, uids.generate()?);

        self.properties.push(Property::new(identity, name, 0));
        self.raise_last_property_id(identity);

        Ok(self.properties.len() - 1)
    }

    /// Moves `lastPropertyId` to `candidate` if it is ahead.
    pub fn raise_last_property_id(&mut self, candidate: IdUid) {
        if candidate.id() > self.last_property_id.id() {
            self.last_property_id = candidate;
        }
    }

    /// Returns true if a relation or relation property targets `entity`.
    #[must_use]
    pub fn references(&self, entity: &Entity) -> bool {
        self.relations.iter().any(|r| r.target_id == entity.id)
            || self.properties.iter().any(|p| {
                p.relation_target
                    .as_deref()
                    .is_some_and(|target| same_name(target, &entity.name))
            })
    }

    pub(crate) fn scope(&self) -> String {
        format!("entity '{}'", self.name)
    }
}

/// The model document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDocument {
    /// Free-form note.
    #[serde(rename = "_note1", default, skip_serializing_if = "String::is_empty")]
    pub note1: String,
    /// Free-form note.
    #[serde(rename = "_note2", default, skip_serializing_if = "String::is_empty")]
    pub note2: String,
    /// Free-form note.
    #[serde(rename = "_note3", default, skip_serializing_if = "String::is_empty")]
    pub note3: String,
    /// All entities.
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Highest entity identity ever assigned.
    #[serde(default)]
    pub last_entity_id: IdUid,
    /// Highest index identity ever assigned.
    #[serde(default)]
    pub last_index_id: IdUid,
    /// Highest relation identity ever assigned.
    #[serde(default)]
    pub last_relation_id: IdUid,
    /// Highest sequence identity ever assigned; carried through untouched.
    #[serde(default)]
    pub last_sequence_id: IdUid,
    /// Model format version.
    #[serde(default)]
    pub model_version: u32,
    /// Minimum model version a reader must support.
    #[serde(default, rename = "modelVersionParserMinimum")]
    pub minimum_parser_version: u32,
    /// UIDs of removed entities.
    #[serde(default)]
    pub retired_entity_uids: Vec<u64>,
    /// UIDs of removed indexes.
    #[serde(default)]
    pub retired_index_uids: Vec<u64>,
    /// UIDs of removed properties.
    #[serde(default)]
    pub retired_property_uids: Vec<u64>,
    /// UIDs of removed relations.
    #[serde(default)]
    pub retired_relation_uids: Vec<u64>,
    /// JSON layout version.
    #[serde(default)]
    pub version: u32,
}

impl Default for ModelDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelDocument {
    /// Creates an empty model with current version fields.
    #[must_use]
    pub fn new() -> Self {
        Self {
            note1: NOTES[0].to_string(),
            note2: NOTES[1].to_string(),
            note3: NOTES[2].to_string(),
            entities: Vec::new(),
            last_entity_id: IdUid::UNSET,
            last_index_id: IdUid::UNSET,
            last_relation_id: IdUid::UNSET,
            last_sequence_id: IdUid::UNSET,
            model_version: MODEL_VERSION,
            minimum_parser_version: MODEL_VERSION,
            retired_entity_uids: Vec::new(),
            retired_index_uids: Vec::new(),
            retired_property_uids: Vec::new(),
            retired_relation_uids: Vec::new(),
            version: FILE_FORMAT_VERSION,
        }
    }

    /// Treats a file without any version information as a legacy model.
    ///
    /// Files written before the version fields existed were version 4. The
    /// rule applies only when both version fields and the first note are
    /// absent. Returns true if the backfill was applied.
    pub fn backfill_legacy_version(&mut self) -> bool {
        if self.model_version == 0 && self.minimum_parser_version == 0 && self.note1.is_empty() {
            warn!(
                version = LEGACY_MODEL_VERSION,
                "model file has no version information, assuming legacy version"
            );
            self.model_version = LEGACY_MODEL_VERSION;
            self.minimum_parser_version = LEGACY_MODEL_VERSION;
            return true;
        }
        false
    }

    /// Fills optional fields a loaded file may lack.
    pub fn fill_missing(&mut self) {
        if self.note1.is_empty() {
            self.note1 = NOTES[0].to_string();
        }
        if self.note2.is_empty() {
            self.note2 = NOTES[1].to_string();
        }
        if self.note3.is_empty() {
            self.note3 = NOTES[2].to_string();
        }
        if self.version == 0 {
            self.version = FILE_FORMAT_VERSION;
        }

        for entity in &mut self.entities {
            for property in &mut entity.properties {
                if property.index_id.is_some_and(IdUid::is_unset) {
                    property.index_id = None;
                }
                if property.relation_target.as_deref() == Some("") {
                    property.relation_target = None;
                }
            }
        }
    }

    /// Rejects models written by a newer tool.
    pub fn check_version(&self) -> ModelResult<()> {
        if self.model_version > MODEL_VERSION || self.minimum_parser_version > MODEL_VERSION {
            return Err(ModelError::UnsupportedVersion {
                found: self.model_version,
                required: self.minimum_parser_version,
                supported: MODEL_VERSION,
            });
        }
        Ok(())
    }

    /// Iterates over every UID in the model, active and retired.
    pub fn all_uids(&self) -> impl Iterator<Item = u64> + '_ {
        let active = self.entities.iter().flat_map(|entity| {
            std::iter::once(entity.id.uid())
                .chain(entity.properties.iter().flat_map(|p| {
                    std::iter::once(p.id.uid()).chain(p.index_id.map(IdUid::uid))
                }))
                .chain(entity.relations.iter().map(|r| r.id.uid()))
        });

        active
            .chain(self.retired_entity_uids.iter().copied())
            .chain(self.retired_index_uids.iter().copied())
            .chain(self.retired_property_uids.iter().copied())
            .chain(self.retired_relation_uids.iter().copied())
            .filter(|&uid| uid != 0)
    }

    /// Position of the entity with the given UID.
    #[must_use]
    pub fn entity_position_by_uid(&self, uid: u64) -> Option<usize> {
        self.entities.iter().position(|e| e.id.uid() == uid)
    }

    /// Position of the entity with the given name.
    #[must_use]
    pub fn entity_position_by_name(&self, name: &str) -> Option<usize> {
        self.entities.iter().position(|e| same_name(&e.name, name))
    }

    /// Finds an entity by UID.
    pub fn find_entity_by_uid(&self, uid: u64) -> ModelResult<&Entity> {
        self.entity_position_by_uid(uid)
            .map(|pos| &self.entities[pos])
            .ok_or_else(|| ModelError::unknown_uid(ElementKind::Entity, uid, "the model"))
    }

    /// Finds an entity by name.
    pub fn find_entity_by_name(&self, name: &str) -> ModelResult<&Entity> {
        self.entity_position_by_name(name)
            .map(|pos| &self.entities[pos])
            .ok_or_else(|| ModelError::not_found(ElementKind::Entity, name, "the model"))
    }

    /// Appends a new entity with a fresh identity and returns its position.
    pub fn create_entity<R: RngCore>(
        &mut self,
        name: &str,
        uids: &mut UidPool<R>,
    ) -> ModelResult<usize> {
        let id = self.last_entity_id.next_id().ok_or(ModelError::CounterOverflow {
            kind: ElementKind::Entity,
        })?;
        let identity = IdUid::new(id, uids.generate()?);

        self.entities.push(Entity::new(identity, name));
        self.last_entity_id = identity;
        info!(entity = name, id = %identity, "created entity");

        Ok(self.entities.len() - 1)
    }

    /// Allocates a new index identity.
    pub fn create_index_id<R: RngCore>(&mut self, uids: &mut UidPool<R>) -> ModelResult<IdUid> {
        let id = self.last_index_id.next_id().ok_or(ModelError::CounterOverflow {
            kind: ElementKind::Index,
        })?;
        let identity = IdUid::new(id, uids.generate()?);
        self.last_index_id = identity;
        Ok(identity)
    }

    /// Appends a new relation to the entity at `entity` and returns its position.
    ///
    /// The target is left unset; the caller resolves it.
    pub fn create_relation<R: RngCore>(
        &mut self,
        entity: usize,
        name: &str,
        uids: &mut UidPool<R>,
    ) -> ModelResult<usize> {
        let id = self
            .last_relation_id
            .next_id()
            .ok_or(ModelError::CounterOverflow {
                kind: ElementKind::Relation,
            })?;
        let identity = IdUid::new(id, uids.generate()?);
        self.last_relation_id = identity;

        let relations = &mut self.entities[entity].relations;
        relations.push(StandaloneRelation {
            id: identity,
            name: name.to_string(),
            target_id: IdUid::UNSET,
        });
        Ok(relations.len() - 1)
    }

    /// Adds a UID to the retired list of its kind.
    pub fn retire(&mut self, kind: ElementKind, uid: u64) {
        let list = match kind {
            ElementKind::Entity => &mut self.retired_entity_uids,
            ElementKind::Property => &mut self.retired_property_uids,
            ElementKind::Index => &mut self.retired_index_uids,
            ElementKind::Relation => &mut self.retired_relation_uids,
        };
        if uid != 0 && !list.contains(&uid) {
            list.push(uid);
        }
    }

    /// Retires a removed property's UID and its index UID.
    pub fn retire_property(&mut self, property: &Property) {
        self.retire(ElementKind::Property, property.id.uid());
        if let Some(index) = property.index_id {
            self.retire(ElementKind::Index, index.uid());
        }
    }

    /// Removes the property at `position` of entity `entity`, retiring its UIDs.
    pub fn remove_property(&mut self, entity: usize, position: usize) -> Property {
        let property = self.entities[entity].properties.remove(position);
        self.retire_property(&property);
        info!(
            entity = %self.entities[entity].name,
            property = %property.name,
            id = %property.id,
            "removed property"
        );
        property
    }

    /// Removes the relation at `position` of entity `entity`, retiring its UID.
    pub fn remove_relation(&mut self, entity: usize, position: usize) -> StandaloneRelation {
        let relation = self.entities[entity].relations.remove(position);
        self.retire(ElementKind::Relation, relation.id.uid());
        info!(
            entity = %self.entities[entity].name,
            relation = %relation.name,
            id = %relation.id,
            "removed relation"
        );
        relation
    }

    /// Removes an entity and retires its UID and the UIDs of everything it owns.
    ///
    /// Refused while any other entity still references it.
    pub fn remove_entity(&mut self, uid: u64) -> ModelResult<Entity> {
        let position = self
            .entity_position_by_uid(uid)
            .ok_or_else(|| ModelError::unknown_uid(ElementKind::Entity, uid, "the model"))?;

        let entity = &self.entities[position];
        if let Some(referrer) = self
            .entities
            .iter()
            .enumerate()
            .find(|(pos, other)| *pos != position && other.references(entity))
        {
            return Err(ModelError::invalid_operation(format!(
                "entity '{}' is still referenced by entity '{}'",
                entity.name,
                referrer.1.name
            )));
        }

        Ok(self.remove_entity_at(position))
    }

    pub(crate) fn remove_entity_at(&mut self, position: usize) -> Entity {
        let entity = self.entities.remove(position);

        self.retire(ElementKind::Entity, entity.id.uid());
        for property in &entity.properties {
            self.retire_property(property);
        }
        for relation in &entity.relations {
            self.retire(ElementKind::Relation, relation.id.uid());
        }

        info!(entity = %entity.name, id = %entity.id, "removed entity");
        entity
    }

    /// Checks the model's identity invariants.
    ///
    /// - every identity is complete (`id` and `uid` non-zero)
    /// - entity IDs are unique; property IDs are unique within their entity
    /// - counters cover every ID they account for
    /// - UIDs are unique across active elements and retired lists
    /// - index identities are complete and covered by `lastIndexId`
    pub fn validate(&self) -> ModelResult<()> {
        let mut uids = HashSet::new();
        let mut claim = |uid: u64, what: &dyn Fn() -> String| -> ModelResult<()> {
            if uids.insert(uid) {
                Ok(())
            } else {
                Err(ModelError::invalid_model(format!(
                    "duplicate UID {uid} ({})",
                    what()
                )))
            }
        };

        let mut entity_ids = HashSet::new();
        for entity in &self.entities {
            entity.id.validate()?;
            if !entity_ids.insert(entity.id.id()) {
                return Err(ModelError::invalid_model(format!(
                    "duplicate entity ID {}",
                    entity.id.id()
                )));
            }
            if entity.id.id() > self.last_entity_id.id() {
                return Err(ModelError::invalid_model(format!(
                    "entity '{}' has ID {} above lastEntityId {}",
                    entity.name, entity.id, self.last_entity_id
                )));
            }
            claim(entity.id.uid(), &|| format!("entity '{}'", entity.name))?;

            let mut property_ids = HashSet::new();
            for property in &entity.properties {
                property.id.validate()?;
                if !property_ids.insert(property.id.id()) {
                    return Err(ModelError::invalid_model(format!(
                        "duplicate property ID {} in entity '{}'",
                        property.id.id(),
                        entity.name
                    )));
                }
                if property.id.id() > entity.last_property_id.id() {
                    return Err(ModelError::invalid_model(format!(
                        "property '{}.{}' has ID {} above lastPropertyId {}",
                        entity.name, property.name, property.id, entity.last_property_id
                    )));
                }
                claim(property.id.uid(), &|| {
                    format!("property '{}.{}'", entity.name, property.name)
                })?;

                if let Some(index) = property.index_id {
                    index.validate()?;
                    if index.id() > self.last_index_id.id() {
                        return Err(ModelError::invalid_model(format!(
                            "index of '{}.{}' has ID {} above lastIndexId {}",
                            entity.name, property.name, index, self.last_index_id
                        )));
                    }
                    claim(index.uid(), &|| {
                        format!("index of '{}.{}'", entity.name, property.name)
                    })?;
                }
            }

            for relation in &entity.relations {
                relation.id.validate()?;
                if relation.id.id() > self.last_relation_id.id() {
                    return Err(ModelError::invalid_model(format!(
                        "relation '{}.{}' has ID {} above lastRelationId {}",
                        entity.name, relation.name, relation.id, self.last_relation_id
                    )));
                }
                claim(relation.id.uid(), &|| {
                    format!("relation '{}.{}'", entity.name, relation.name)
                })?;
            }
        }

        let retired = [
            ("entity", &self.retired_entity_uids),
            ("index", &self.retired_index_uids),
            ("property", &self.retired_property_uids),
            ("relation", &self.retired_relation_uids),
        ];
        for (kind, list) in retired {
            for &uid in list {
                claim(uid, &|| format!("retired {kind} UID"))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pool(model: &ModelDocument) -> UidPool<StdRng> {
        UidPool::with_rng(model, StdRng::seed_from_u64(42))
    }

    fn task_model() -> ModelDocument {
        let mut model = ModelDocument::new();
        let mut task = Entity::new(IdUid::new(1, 1000), "Task");
        task.properties.push(Property::new(IdUid::new(1, 100), "Id", 6));
        task.properties.push(Property::new(IdUid::new(2, 101), "Name", 9));
        task.last_property_id = IdUid::new(2, 101);
        model.entities.push(task);
        model.last_entity_id = IdUid::new(1, 1000);
        model
    }

    #[test]
    fn new_model_has_current_version() {
        let model = ModelDocument::new();
        assert_eq!(model.model_version, MODEL_VERSION);
        assert_eq!(model.minimum_parser_version, MODEL_VERSION);
        assert!(model.entities.is_empty());
        assert!(model.last_entity_id.is_unset());
        model.validate().unwrap();
    }

    #[test]
    fn legacy_backfill_only_without_versions() {
        let mut legacy: ModelDocument = serde_json::from_str(r#"{"entities": []}"#).unwrap();
        assert!(legacy.backfill_legacy_version());
        assert_eq!(legacy.model_version, LEGACY_MODEL_VERSION);
        assert_eq!(legacy.minimum_parser_version, LEGACY_MODEL_VERSION);

        let mut current = ModelDocument::new();
        assert!(!current.backfill_legacy_version());
        assert_eq!(current.model_version, MODEL_VERSION);
    }

    #[test]
    fn newer_versions_rejected() {
        let mut model = ModelDocument::new();
        model.minimum_parser_version = MODEL_VERSION + 1;
        assert!(matches!(
            model.check_version(),
            Err(ModelError::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn lookups_are_case_insensitive() {
        let model = task_model();
        assert_eq!(model.find_entity_by_name("task").unwrap().id.uid(), 1000);
        let task = model.find_entity_by_uid(1000).unwrap();
        assert_eq!(task.find_property_by_name("NAME").unwrap().id.id(), 2);
        assert!(matches!(
            task.find_property_by_uid(5),
            Err(ModelError::UnknownUid { uid: 5, .. })
        ));
        assert!(model.find_entity_by_name("Missing").is_err());
    }

    #[test]
    fn create_property_continues_counter() {
        let mut model = task_model();
        let mut uids = pool(&model);
        let pos = model.entities[0].create_property("Email", &mut uids).unwrap();
        let email = &model.entities[0].properties[pos];
        assert_eq!(email.id.id(), 3);
        assert_eq!(model.entities[0].last_property_id, email.id);
        assert!(![100, 101, 1000].contains(&email.id.uid()));
    }

    #[test]
    fn create_entity_and_relation_use_model_counters() {
        let mut model = task_model();
        let mut uids = pool(&model);
        let tag = model.create_entity("Tag", &mut uids).unwrap();
        assert_eq!(model.entities[tag].id.id(), 2);
        assert_eq!(model.last_entity_id, model.entities[tag].id);

        let rel = model.create_relation(0, "tags", &mut uids).unwrap();
        assert_eq!(model.entities[0].relations[rel].id.id(), 1);
        assert_eq!(model.last_relation_id, model.entities[0].relations[rel].id);
    }

    #[test]
    fn remove_property_retires_uids() {
        let mut model = task_model();
        model.entities[0].properties[1].flags = PropertyFlags::INDEXED.bits();
        model.entities[0].properties[1].index_id = Some(IdUid::new(1, 500));
        model.last_index_id = IdUid::new(1, 500);

        let removed = model.remove_property(0, 1);
        assert_eq!(removed.name, "Name");
        assert_eq!(model.retired_property_uids, vec![101]);
        assert_eq!(model.retired_index_uids, vec![500]);
        assert_eq!(model.entities[0].last_property_id.id(), 2);
        model.validate().unwrap();
    }

    #[test]
    fn remove_entity_refused_while_referenced() {
        let mut model = task_model();
        let mut uids = pool(&model);
        let tag = model.create_entity("Tag", &mut uids).unwrap();
        let tag_id = model.entities[tag].id;
        let rel = model.create_relation(0, "tags", &mut uids).unwrap();
        model.entities[0].relations[rel].target_id = tag_id;

        assert!(matches!(
            model.remove_entity(tag_id.uid()),
            Err(ModelError::InvalidOperation { .. })
        ));

        let task = model.remove_entity(1000).unwrap();
        assert_eq!(task.name, "Task");
        assert!(model.retired_entity_uids.contains(&1000));
        assert!(model.retired_property_uids.contains(&100));
        assert!(model.retired_property_uids.contains(&101));
        assert_eq!(model.retired_relation_uids.len(), 1);

        model.remove_entity(tag_id.uid()).unwrap();
        assert!(model.entities.is_empty());
        model.validate().unwrap();
    }

    #[test]
    fn validate_detects_duplicate_uid() {
        let mut model = task_model();
        model.retired_property_uids.push(100);
        assert!(matches!(
            model.validate(),
            Err(ModelError::InvalidModel { .. })
        ));
    }

    #[test]
    fn validate_detects_counter_behind() {
        let mut model = task_model();
        model.entities[0].last_property_id = IdUid::new(1, 100);
        assert!(model.validate().is_err());
    }

    #[test]
    fn validate_checks_index_identity() {
        let mut model = task_model();
        model.entities[0].properties[1].index_id = Some(IdUid::new(1, 7));
        assert!(model.validate().is_err());

        model.last_index_id = IdUid::new(1, 7);
        model.validate().unwrap();

        model.entities[0].properties[1].index_id = Some(IdUid::new(1, 100));
        assert!(model.validate().is_err());
    }

    #[test]
    fn index_identity_does_not_depend_on_flags() {
        let mut model = task_model();
        model.entities[0].properties[1].flags = PropertyFlags::UNIQUE.bits();
        model.entities[0].properties[1].index_id = Some(IdUid::new(1, 7));
        model.last_index_id = IdUid::new(1, 7);
        model.validate().unwrap();

        model.entities[0].properties[1].flags = PropertyFlags::INDEXED.bits();
        model.entities[0].properties[1].index_id = None;
        model.validate().unwrap();
    }

    #[test]
    fn json_layout() {
        let mut model = task_model();
        model.entities[0].properties[1].flags = PropertyFlags::INDEXED.bits();
        model.entities[0].properties[1].index_id = Some(IdUid::new(1, 500));
        model.last_index_id = IdUid::new(1, 500);

        let value = serde_json::to_value(&model).unwrap();
        assert_eq!(value["lastEntityId"], "1:1000");
        assert_eq!(value["lastRelationId"], "");
        assert_eq!(value["modelVersionParserMinimum"], MODEL_VERSION);
        assert_eq!(value["entities"][0]["lastPropertyId"], "2:101");
        assert_eq!(value["entities"][0]["properties"][1]["indexId"], "1:500");
        assert_eq!(value["entities"][0]["properties"][1]["type"], 9);
        assert!(value["entities"][0]["properties"][0].get("flags").is_none());
        assert!(value["entities"][0].get("relations").is_none());
        assert_eq!(value["_note1"], NOTES[0]);
    }

    #[test]
    fn relation_target_alias_accepted() {
        let json = r#"{"id": "1:5", "name": "tags", "targetId": "2:6"}"#;
        let relation: StandaloneRelation = serde_json::from_str(json).unwrap();
        assert_eq!(relation.target_id, IdUid::new(2, 6));
        let out = serde_json::to_value(&relation).unwrap();
        assert_eq!(out["targetEntityId"], "2:6");
    }

    #[test]
    fn fill_missing_normalizes_empty_values() {
        let json = r#"{
            "entities": [{
                "id": "1:10", "lastPropertyId": "1:11", "name": "A",
                "properties": [{"id": "1:11", "name": "x", "type": 6, "indexId": "", "relationTarget": ""}]
            }],
            "lastEntityId": "1:10"
        }"#;
        let mut model: ModelDocument = serde_json::from_str(json).unwrap();
        model.fill_missing();
        let property = &model.entities[0].properties[0];
        assert!(property.index_id.is_none());
        assert!(property.relation_target.is_none());
        assert_eq!(model.version, FILE_FORMAT_VERSION);
        model.validate().unwrap();
    }
}
