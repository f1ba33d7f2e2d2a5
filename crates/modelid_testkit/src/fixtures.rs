//! Test fixtures and model helpers.
//!
//! Provides temporary model files, sample documents and bindings for the
//! common test scenarios.

use modelid_core::{
    reconcile_file, Binding, BindingEntity, BindingProperty, Config, Entity, IdUid, ModelDocument,
    ModelResult, Property, PropertyFlags, ReconcileReport, Reconciler, UidPool,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Type code of a 64-bit integer property.
pub const TYPE_LONG: u32 = 6;
/// Type code of a string property.
pub const TYPE_STRING: u32 = 9;
/// Type code of a to-one relation property.
pub const TYPE_RELATION: u32 = 11;

/// A model file path inside a temporary directory.
pub struct TempModel {
    path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TempModel {
    /// Creates a path for a model file that does not exist yet.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        Self {
            path: temp_dir.path().join("model.json"),
            _temp_dir: temp_dir,
        }
    }

    /// Creates a model file holding `document`.
    pub fn with_document(document: &ModelDocument) -> Self {
        let data = serde_json::to_vec_pretty(document).expect("Failed to encode model");
        Self::with_contents(data)
    }

    /// Creates a model file with raw contents.
    pub fn with_contents(contents: impl AsRef<[u8]>) -> Self {
        let model = Self::new();
        fs::write(&model.path, contents).expect("Failed to write model file");
        model
    }

    /// Returns the model file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if the model file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the raw model file.
    pub fn contents(&self) -> String {
        fs::read_to_string(&self.path).expect("Failed to read model file")
    }

    /// Parses the model file.
    pub fn read_document(&self) -> ModelDocument {
        serde_json::from_str(&self.contents()).expect("Failed to parse model file")
    }

    /// Runs a full load/reconcile/write/close cycle with default settings.
    pub fn merge(&self, binding: &mut Binding) -> ModelResult<ReconcileReport> {
        self.merge_with(binding, &Config::default())
    }

    /// Runs a full load/reconcile/write/close cycle.
    pub fn merge_with(&self, binding: &mut Binding, config: &Config) -> ModelResult<ReconcileReport> {
        reconcile_file(&self.path, binding, config)
    }
}

impl Default for TempModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a temporary model path.
pub fn with_temp_model<F, R>(f: F) -> R
where
    F: FnOnce(&TempModel) -> R,
{
    let model = TempModel::new();
    f(&model)
}

/// Creates a UID pool for `model` with a fixed seed.
pub fn seeded_pool(model: &ModelDocument, seed: u64) -> UidPool<StdRng> {
    UidPool::with_rng(model, StdRng::seed_from_u64(seed))
}

/// Reconciles `binding` into `model` in memory with a seeded UID pool.
pub fn reconcile_seeded(
    model: &mut ModelDocument,
    binding: &mut Binding,
    seed: u64,
) -> ModelResult<ReconcileReport> {
    let uids = seeded_pool(model, seed);
    Reconciler::with_uid_pool(model, uids).reconcile(binding)
}

/// The "Task" model: entity `1:50` with `id` (`1:100`) and `name` (`2:101`).
pub fn task_model() -> ModelDocument {
    let mut task = Entity::new(IdUid::new(1, 50), "Task");

    let mut id = Property::new(IdUid::new(1, 100), "id", TYPE_LONG);
    id.flags = PropertyFlags::ID.bits();
    task.properties.push(id);
    task.properties.push(Property::new(IdUid::new(2, 101), "name", TYPE_STRING));
    task.last_property_id = IdUid::new(2, 101);

    let mut model = ModelDocument::new();
    model.entities.push(task);
    model.last_entity_id = IdUid::new(1, 50);
    model
}

/// A binding declaring the "Task" entity of [`task_model`].
pub fn task_binding() -> Binding {
    Binding::new(vec![BindingEntity::new("Task")
        .property(BindingProperty::new("id", TYPE_LONG).with_flags(PropertyFlags::ID))
        .property(BindingProperty::new("name", TYPE_STRING))])
}

/// Builds a binding entity with an ID property followed by string
/// properties named `properties`.
pub fn entity_binding(name: &str, properties: &[&str]) -> BindingEntity {
    properties.iter().fold(
        BindingEntity::new(name)
            .property(BindingProperty::new("id", TYPE_LONG).with_flags(PropertyFlags::ID)),
        |entity, property| entity.property(BindingProperty::new(*property, TYPE_STRING)),
    )
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use modelid_core::BindingRelation;

    /// "Customer" and "Order" with a to-one relation and an index on
    /// `Order.number`.
    pub fn shop_binding() -> Binding {
        Binding::new(vec![
            entity_binding("Customer", &["name"]),
            BindingEntity::new("Order")
                .property(BindingProperty::new("id", TYPE_LONG).with_flags(PropertyFlags::ID))
                .property(
                    BindingProperty::new("number", TYPE_STRING).with_index(),
                )
                .property(
                    BindingProperty::new("customer", TYPE_RELATION)
                        .with_flags(PropertyFlags::INDEX_PARTIAL_SKIP_ZERO)
                        .with_index()
                        .with_relation_target("Customer"),
                ),
        ])
    }

    /// "Student" and "Course" with a standalone many-to-many relation.
    pub fn school_binding() -> Binding {
        Binding::new(vec![
            entity_binding("Course", &["title"]),
            entity_binding("Student", &["name"])
                .relation(BindingRelation::new("courses", "Course")),
        ])
    }
}
