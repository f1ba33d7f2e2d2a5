//! Property-based test generators using proptest.
//!
//! Provides strategies for generating bindings whose names are unique in
//! their scope, and edits that evolve an annotated binding between runs.

use crate::fixtures::{TYPE_LONG, TYPE_STRING};
use modelid_core::model::same_name;
use modelid_core::{Binding, BindingEntity, BindingProperty, PropertyFlags};
use proptest::prelude::*;

/// Strategy for generating lowercase element names.
pub fn element_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}").expect("Invalid regex")
}

/// Strategy for generating `count` names that differ ignoring case.
pub fn unique_names_strategy(
    count: std::ops::Range<usize>,
) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set(element_name_strategy(), count)
        .prop_map(|names| names.into_iter().collect())
}

/// Strategy for generating property flag sets.
pub fn property_flags_strategy() -> impl Strategy<Value = PropertyFlags> {
    prop_oneof![
        4 => Just(PropertyFlags::empty()),
        2 => Just(PropertyFlags::INDEXED),
        1 => Just(PropertyFlags::INDEX_HASH),
        1 => Just(PropertyFlags::UNIQUE),
        1 => Just(PropertyFlags::NOT_NULL),
    ]
}

/// Strategy for generating a property declaration with the given name.
///
/// The `index` attribute is drawn independently of the flags.
pub fn binding_property_strategy(name: String) -> impl Strategy<Value = BindingProperty> {
    (1u32..=12, property_flags_strategy(), prop::bool::weighted(0.3))
        .prop_map(move |(property_type, flags, index)| {
            let mut property = BindingProperty::new(name.clone(), property_type).with_flags(flags);
            property.index = index;
            property
        })
}

/// Strategy for generating an entity declaration with the given name.
///
/// The entity always starts with an ID property named `id`.
pub fn binding_entity_strategy(name: String) -> impl Strategy<Value = BindingEntity> {
    unique_names_strategy(0..6)
        .prop_flat_map(|names| {
            names
                .into_iter()
                .filter(|n| !same_name(n, "id"))
                .map(binding_property_strategy)
                .collect::<Vec<_>>()
        })
        .prop_map(move |properties| {
            let id = BindingProperty::new("id", TYPE_LONG).with_flags(PropertyFlags::ID);
            properties
                .into_iter()
                .fold(BindingEntity::new(name.clone()).property(id), |entity, p| {
                    entity.property(p)
                })
        })
}

/// Strategy for generating a binding of up to `max_entities` entities.
pub fn binding_strategy(max_entities: usize) -> impl Strategy<Value = Binding> {
    unique_names_strategy(1..max_entities.max(2))
        .prop_flat_map(|names| {
            names
                .into_iter()
                .map(|name| binding_entity_strategy(capitalize(&name)))
                .collect::<Vec<_>>()
        })
        .prop_map(Binding::new)
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// An edit to an annotated binding between two generator runs.
///
/// Entity and property positions are taken modulo the current lengths.
#[derive(Debug, Clone)]
pub enum BindingEdit {
    /// Declare a new string property.
    AddProperty {
        /// Entity position.
        entity: usize,
        /// Property name.
        name: String,
    },
    /// Drop a property declaration.
    RemoveProperty {
        /// Entity position.
        entity: usize,
        /// Property position.
        property: usize,
    },
    /// Rename a property, pinning it by its resolved UID.
    RenameProperty {
        /// Entity position.
        entity: usize,
        /// Property position.
        property: usize,
        /// New name.
        name: String,
    },
    /// Flip the `index` attribute of a property.
    ToggleIndex {
        /// Entity position.
        entity: usize,
        /// Property position.
        property: usize,
    },
}

impl BindingEdit {
    /// Applies the edit. Returns false if it was skipped because it would
    /// make the binding invalid.
    pub fn apply(&self, binding: &mut Binding) -> bool {
        if binding.entities.is_empty() {
            return false;
        }
        let count = binding.entities.len();

        match self {
            Self::AddProperty { entity, name } => {
                let entity = &mut binding.entities[entity % count];
                if entity.find_property(name).is_some() {
                    return false;
                }
                entity.properties.push(BindingProperty::new(name.clone(), TYPE_STRING));
                true
            }
            Self::RemoveProperty { entity, property } => {
                let entity = &mut binding.entities[entity % count];
                // Keep at least the ID property.
                if entity.properties.len() < 2 {
                    return false;
                }
                let position = property % entity.properties.len();
                entity.properties.remove(position);
                true
            }
            Self::RenameProperty {
                entity,
                property,
                name,
            } => {
                let entity = &mut binding.entities[entity % count];
                if entity.find_property(name).is_some() {
                    return false;
                }
                let position = property % entity.properties.len();
                let property = &mut entity.properties[position];
                let Some(id) = property.id else {
                    return false;
                };
                property.uid = Some(id.uid());
                property.name = name.clone();
                true
            }
            Self::ToggleIndex { entity, property } => {
                let entity = &mut binding.entities[entity % count];
                let position = property % entity.properties.len();
                let property = &mut entity.properties[position];
                property.index = !property.index;
                true
            }
        }
    }
}

/// Strategy for generating binding edits.
pub fn binding_edit_strategy() -> impl Strategy<Value = BindingEdit> {
    prop_oneof![
        3 => (any::<usize>(), element_name_strategy())
            .prop_map(|(entity, name)| BindingEdit::AddProperty { entity, name }),
        2 => (any::<usize>(), any::<usize>())
            .prop_map(|(entity, property)| BindingEdit::RemoveProperty { entity, property }),
        2 => (any::<usize>(), any::<usize>(), element_name_strategy()).prop_map(
            |(entity, property, name)| BindingEdit::RenameProperty {
                entity,
                property,
                name,
            }
        ),
        1 => (any::<usize>(), any::<usize>())
            .prop_map(|(entity, property)| BindingEdit::ToggleIndex { entity, property }),
    ]
}

/// Strategy for generating a sequence of edits.
pub fn edit_sequence_strategy(
    min_edits: usize,
    max_edits: usize,
) -> impl Strategy<Value = Vec<BindingEdit>> {
    prop::collection::vec(binding_edit_strategy(), min_edits..max_edits)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
