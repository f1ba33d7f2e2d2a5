//! Merging a binding into the model.
//!
//! Reconciliation runs in two passes:
//!
//! 1. every binding entity is matched to (or created as) a model entity
//! 2. each matched entity is merged: name, properties, indexes, relations
//!
//! Relations need their target entities resolved, which is why no merge
//! starts before the first pass is complete for the whole binding.
//!
//! Element matching follows the same precedence at every level:
//!
//! 1. an explicit uid annotation must match an existing UID
//! 2. otherwise the element is matched by name; properties and relations
//!    claimed by a uid annotation anywhere in the entity are skipped
//! 3. a UID request is answered with an error reporting what the model knows
//! 4. an unmatched element is created with a fresh identity
//!
//! The binding is authoritative for names, types and flags. The model is
//! authoritative for identities.

use crate::binding::{Binding, BindingEntity, BindingProperty, BindingRelation};
use crate::config::Config;
use crate::error::{ElementKind, ModelError, ModelResult, UidRequestOutcome};
use crate::id::IdUid;
use crate::model::{same_name, ModelDocument};
use crate::uid::UidPool;
use rand::rngs::StdRng;
use rand::RngCore;
use serde::Serialize;
use tracing::{debug, info, warn};

/// What a reconciliation run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Entities created.
    pub entities_created: usize,
    /// Entities renamed.
    pub entities_renamed: usize,
    /// Entities removed by pruning.
    pub entities_removed: usize,
    /// Properties created.
    pub properties_created: usize,
    /// Properties renamed.
    pub properties_renamed: usize,
    /// Properties that received a new UID from an annotation.
    pub properties_reset: usize,
    /// Properties removed.
    pub properties_removed: usize,
    /// Indexes created.
    pub indexes_created: usize,
    /// Indexes removed.
    pub indexes_removed: usize,
    /// Relations created.
    pub relations_created: usize,
    /// Relations renamed.
    pub relations_renamed: usize,
    /// Relations removed.
    pub relations_removed: usize,
}

impl ReconcileReport {
    /// Returns true if the run left every identity as it was.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        *self == Self::default()
    }
}

/// Merges bindings into a model document.
pub struct Reconciler<'m, R = StdRng> {
    model: &'m mut ModelDocument,
    uids: UidPool<R>,
    prune_missing_entities: bool,
    report: ReconcileReport,
}

impl<'m> Reconciler<'m> {
    /// Creates a reconciler with an entropy-seeded UID pool.
    pub fn new(model: &'m mut ModelDocument) -> Self {
        let uids = UidPool::for_document(model);
        Self::with_uid_pool(model, uids)
    }
}

impl<'m, R: RngCore> Reconciler<'m, R> {
    /// Creates a reconciler drawing UIDs from `uids`.
    ///
    /// The pool must have been built from `model`.
    pub fn with_uid_pool(model: &'m mut ModelDocument, uids: UidPool<R>) -> Self {
        Self {
            model,
            uids,
            prune_missing_entities: false,
            report: ReconcileReport::default(),
        }
    }

    /// Applies the reconciliation settings of `config`.
    #[must_use]
    pub fn with_config(mut self, config: &Config) -> Self {
        self.uids = self.uids.max_attempts(config.max_uid_attempts);
        self.prune_missing_entities = config.prune_missing_entities;
        self
    }

    /// Removes model entities that the binding no longer declares.
    #[must_use]
    pub fn prune_missing_entities(mut self, value: bool) -> Self {
        self.prune_missing_entities = value;
        self
    }

    /// Merges `binding` into the model and writes resolved identities back
    /// into `binding`.
    ///
    /// On error the model may be partially updated; callers must not persist
    /// it.
    pub fn reconcile(mut self, binding: &mut Binding) -> ModelResult<ReconcileReport> {
        binding.validate()?;

        let mut resolved = Vec::with_capacity(binding.entities.len());
        for entity in &binding.entities {
            let position = self.resolve_entity(entity)?;
            if let Some(other) = resolved.iter().position(|&p| p == position) {
                return Err(ModelError::invalid_binding(format!(
                    "entities '{}' and '{}' match the same model entity",
                    binding.entities[other].name, entity.name
                )));
            }
            resolved.push(position);
        }

        let names: Vec<String> = binding.entities.iter().map(|e| e.name.clone()).collect();
        for (entity, &position) in binding.entities.iter_mut().zip(&resolved) {
            self.merge_entity(entity, position, &names, &resolved)?;
        }

        if self.prune_missing_entities {
            self.prune_entities(&resolved)?;
        }

        debug!(report = ?self.report, "reconciliation finished");
        Ok(self.report)
    }

    fn resolve_entity(&mut self, binding: &BindingEntity) -> ModelResult<usize> {
        if let Some(uid) = binding.uid {
            return self.model.entity_position_by_uid(uid).ok_or_else(|| {
                ModelError::unknown_uid(
                    ElementKind::Entity,
                    uid,
                    format!("the model (entity '{}')", binding.name),
                )
            });
        }

        let existing = self.model.entity_position_by_name(&binding.name);

        if binding.uid_request {
            let outcome = match existing {
                Some(pos) => UidRequestOutcome::Found {
                    current: self.model.entities[pos].id.uid(),
                    suggested: None,
                },
                None => UidRequestOutcome::NotFound,
            };
            return Err(ModelError::UidRequest {
                kind: ElementKind::Entity,
                name: binding.name.clone(),
                scope: "the model".to_string(),
                outcome,
            });
        }

        match existing {
            Some(pos) => Ok(pos),
            None => {
                self.report.entities_created += 1;
                self.model.create_entity(&binding.name, &mut self.uids)
            }
        }
    }

    fn merge_entity(
        &mut self,
        binding: &mut BindingEntity,
        position: usize,
        names: &[String],
        resolved: &[usize],
    ) -> ModelResult<()> {
        let entity = &mut self.model.entities[position];
        if entity.name != binding.name {
            info!(from = %entity.name, to = %binding.name, "renamed entity");
            entity.name = binding.name.clone();
            self.report.entities_renamed += 1;
        }
        binding.id = Some(entity.id);

        self.merge_properties(binding, position)?;
        binding.last_property_id = Some(self.model.entities[position].last_property_id);

        self.merge_relations(binding, position, names, resolved)
    }

    fn merge_properties(&mut self, binding: &mut BindingEntity, entity: usize) -> ModelResult<()> {
        let mut matched: Vec<Option<usize>> = vec![None; binding.properties.len()];
        let mut claimed = Vec::with_capacity(binding.properties.len());

        // UID annotations claim their properties before any name is looked up.
        for (slot, property) in matched.iter_mut().zip(&binding.properties) {
            let Some(uid) = property.uid else { continue };
            if let Some(pos) = self.model.entities[entity].property_position_by_uid(uid) {
                claim_position(&mut claimed, pos, || {
                    format!(
                        "property '{}' in entity '{}' matches a property that is already bound",
                        property.name, binding.name
                    )
                })?;
                *slot = Some(pos);
            }
        }

        for (slot, property) in matched.iter_mut().zip(&binding.properties) {
            if slot.is_some() {
                continue;
            }
            let pos = self.resolve_property(entity, property, &claimed)?;
            claim_position(&mut claimed, pos, || {
                format!(
                    "property '{}' in entity '{}' matches a property that is already bound",
                    property.name, binding.name
                )
            })?;
            *slot = Some(pos);
        }

        for (property, pos) in binding.properties.iter_mut().zip(&matched) {
            if let Some(pos) = *pos {
                self.merge_property(entity, pos, property)?;
            }
        }

        // Only creations happened above, so positions are still valid.
        let count = self.model.entities[entity].properties.len();
        for position in (0..count).rev() {
            if !claimed.contains(&position) {
                self.model.remove_property(entity, position);
                self.report.properties_removed += 1;
            }
        }

        Ok(())
    }

    /// Resolves a property that no uid annotation claimed. Name lookups skip
    /// `claimed` positions.
    fn resolve_property(
        &mut self,
        entity: usize,
        binding: &BindingProperty,
        claimed: &[usize],
    ) -> ModelResult<usize> {
        let model_entity = &self.model.entities[entity];
        let existing = (0..model_entity.properties.len()).find(|pos| {
            !claimed.contains(pos) && same_name(&model_entity.properties[*pos].name, &binding.name)
        });

        if let Some(uid) = binding.uid {
            // A new UID on an existing property resets the property's data.
            let Some(pos) = existing else {
                return Err(ModelError::unknown_uid(
                    ElementKind::Property,
                    uid,
                    model_entity.scope(),
                ));
            };
            self.reset_property(entity, pos, uid)?;
            return Ok(pos);
        }

        if binding.uid_request {
            let scope = model_entity.scope();
            let outcome = match existing {
                Some(pos) => UidRequestOutcome::Found {
                    current: model_entity.properties[pos].id.uid(),
                    suggested: Some(self.uids.generate()?),
                },
                None => UidRequestOutcome::NotFound,
            };
            return Err(ModelError::UidRequest {
                kind: ElementKind::Property,
                name: binding.name.clone(),
                scope,
                outcome,
            });
        }

        match existing {
            Some(pos) => Ok(pos),
            None => {
                let pos = self.model.entities[entity].create_property(&binding.name, &mut self.uids)?;
                self.report.properties_created += 1;
                info!(
                    entity = %self.model.entities[entity].name,
                    property = %binding.name,
                    id = %self.model.entities[entity].properties[pos].id,
                    "created property"
                );
                Ok(pos)
            }
        }
    }

    fn reset_property(&mut self, entity: usize, position: usize, uid: u64) -> ModelResult<()> {
        self.uids.reserve(uid)?;

        let property = &mut self.model.entities[entity].properties[position];
        let previous = property.id;
        property.id = IdUid::new(previous.id(), uid);
        warn!(
            entity = %self.model.entities[entity].name,
            property = %self.model.entities[entity].properties[position].name,
            previous = %previous,
            uid,
            "new UID specified for an existing property, resetting its data"
        );

        self.model.retire(ElementKind::Property, previous.uid());
        self.report.properties_reset += 1;
        Ok(())
    }

    fn merge_property(
        &mut self,
        entity: usize,
        position: usize,
        binding: &mut BindingProperty,
    ) -> ModelResult<()> {
        let current_index = self.model.entities[entity].properties[position].index_id;
        let index_id = match (binding.wants_index(), current_index) {
            (true, Some(index)) => Some(index),
            (true, None) => {
                let index = self.model.create_index_id(&mut self.uids)?;
                debug!(property = %binding.name, index = %index, "created index");
                self.report.indexes_created += 1;
                Some(index)
            }
            (false, Some(index)) => {
                debug!(property = %binding.name, index = %index, "removed index");
                self.model.retire(ElementKind::Index, index.uid());
                self.report.indexes_removed += 1;
                None
            }
            (false, None) => None,
        };

        let property = &mut self.model.entities[entity].properties[position];
        if property.name != binding.name {
            info!(from = %property.name, to = %binding.name, "renamed property");
            property.name = binding.name.clone();
            self.report.properties_renamed += 1;
        }
        property.index_id = index_id;
        property.property_type = binding.property_type;
        property.flags = binding.flags;
        property.relation_target = binding.relation_target.clone();

        binding.id = Some(property.id);
        binding.index_id = index_id;
        Ok(())
    }

    fn merge_relations(
        &mut self,
        binding: &mut BindingEntity,
        entity: usize,
        names: &[String],
        resolved: &[usize],
    ) -> ModelResult<()> {
        let mut matched: Vec<Option<usize>> = vec![None; binding.relations.len()];
        let mut claimed = Vec::with_capacity(binding.relations.len());

        for (slot, relation) in matched.iter_mut().zip(&binding.relations) {
            let Some(uid) = relation.uid else { continue };
            if let Some(pos) = self.model.entities[entity].relation_position_by_uid(uid) {
                claim_position(&mut claimed, pos, || {
                    format!(
                        "relation '{}' in entity '{}' matches a relation that is already bound",
                        relation.name, binding.name
                    )
                })?;
                *slot = Some(pos);
            }
        }

        for (slot, relation) in matched.iter_mut().zip(&binding.relations) {
            if slot.is_some() {
                continue;
            }
            let pos = self.resolve_relation(entity, relation, &claimed)?;
            claim_position(&mut claimed, pos, || {
                format!(
                    "relation '{}' in entity '{}' matches a relation that is already bound",
                    relation.name, binding.name
                )
            })?;
            *slot = Some(pos);
        }

        for (relation, pos) in binding.relations.iter_mut().zip(&matched) {
            let Some(position) = *pos else { continue };

            let target = self
                .resolve_target(&relation.target, names, resolved)
                .ok_or_else(|| ModelError::RelationTargetMissing {
                    relation: relation.name.clone(),
                    entity: binding.name.clone(),
                    target: relation.target.clone(),
                })?;
            let target_id = self.model.entities[target].id;

            let model_relation = &mut self.model.entities[entity].relations[position];
            if model_relation.name != relation.name {
                info!(from = %model_relation.name, to = %relation.name, "renamed relation");
                model_relation.name = relation.name.clone();
                self.report.relations_renamed += 1;
            }
            model_relation.target_id = target_id;

            relation.id = Some(model_relation.id);
            relation.target_entity_id = Some(target_id);
        }

        let count = self.model.entities[entity].relations.len();
        for position in (0..count).rev() {
            if !claimed.contains(&position) {
                self.model.remove_relation(entity, position);
                self.report.relations_removed += 1;
            }
        }

        Ok(())
    }

    /// Resolves a relation that no uid annotation claimed.
    fn resolve_relation(
        &mut self,
        entity: usize,
        binding: &BindingRelation,
        claimed: &[usize],
    ) -> ModelResult<usize> {
        let model_entity = &self.model.entities[entity];

        if let Some(uid) = binding.uid {
            return Err(ModelError::unknown_uid(ElementKind::Relation, uid, model_entity.scope()));
        }

        let existing = (0..model_entity.relations.len()).find(|pos| {
            !claimed.contains(pos) && same_name(&model_entity.relations[*pos].name, &binding.name)
        });

        if binding.uid_request {
            let outcome = match existing {
                Some(pos) => UidRequestOutcome::Found {
                    current: model_entity.relations[pos].id.uid(),
                    suggested: None,
                },
                None => UidRequestOutcome::NotFound,
            };
            return Err(ModelError::UidRequest {
                kind: ElementKind::Relation,
                name: binding.name.clone(),
                scope: model_entity.scope(),
                outcome,
            });
        }

        match existing {
            Some(pos) => Ok(pos),
            None => {
                let pos = self.model.create_relation(entity, &binding.name, &mut self.uids)?;
                self.report.relations_created += 1;
                info!(
                    entity = %self.model.entities[entity].name,
                    relation = %binding.name,
                    "created relation"
                );
                Ok(pos)
            }
        }
    }

    /// Finds the model entity a relation target name refers to.
    ///
    /// Binding entities are matched first since a renamed entity still
    /// carries its old name in the model until it is merged. Model entities
    /// claimed by the binding are skipped in the fallback lookup.
    fn resolve_target(&self, target: &str, names: &[String], resolved: &[usize]) -> Option<usize> {
        if let Some(i) = names.iter().position(|name| same_name(name, target)) {
            return Some(resolved[i]);
        }

        self.model
            .entities
            .iter()
            .enumerate()
            .find(|(pos, e)| !resolved.contains(pos) && same_name(&e.name, target))
            .map(|(pos, _)| pos)
    }

    fn prune_entities(&mut self, resolved: &[usize]) -> ModelResult<()> {
        let stale: Vec<usize> = (0..self.model.entities.len())
            .filter(|pos| !resolved.contains(pos))
            .collect();

        for &pos in &stale {
            let entity = &self.model.entities[pos];
            if let Some(&referrer) = resolved
                .iter()
                .find(|&&other| self.model.entities[other].references(entity))
            {
                return Err(ModelError::invalid_operation(format!(
                    "entity '{}' is not in the binding but entity '{}' still references it",
                    entity.name, self.model.entities[referrer].name
                )));
            }
        }

        for &pos in stale.iter().rev() {
            self.model.remove_entity_at(pos);
            self.report.entities_removed += 1;
        }

        Ok(())
    }
}

fn claim_position(
    claimed: &mut Vec<usize>,
    position: usize,
    conflict: impl FnOnce() -> String,
) -> ModelResult<()> {
    if claimed.contains(&position) {
        return Err(ModelError::invalid_binding(conflict()));
    }
    claimed.push(position);
    Ok(())
}
