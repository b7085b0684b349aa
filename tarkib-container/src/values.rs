//! Root values, the root inversion and the ready-object store.
//!
//! Everything here lives for a single construction call.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tarkib_support::rendering::suggest_similar;
use tracing::{debug, trace, warn};

use crate::blueprint::{Blueprint, Instance};
use crate::error::{AmbiguousRootMappingError, Result, TarkibError, UnknownFieldError};
use crate::key::DependencyKey;

/// Named override values for the root type's fields.
///
/// # Examples
/// ```
/// use tarkib_container::values::Overrides;
///
/// let overrides = Overrides::new()
///     .with("redis_uri", String::from("example:1234"))
///     .with("timeout_ms", 250u64);
/// assert_eq!(overrides.len(), 2);
/// assert!(overrides.contains("redis_uri"));
/// ```
#[derive(Clone, Default)]
pub struct Overrides {
    entries: Vec<(String, DependencyKey, Instance)>,
}

impl Overrides {
    /// Creates an empty set of overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an override for field `name`, replacing an earlier one.
    pub fn with<T: Send + Sync + 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    /// Adds an already shared value; its identity is preserved.
    pub fn with_shared<T: Send + Sync + 'static>(
        mut self,
        name: impl Into<String>,
        value: Arc<T>,
    ) -> Self {
        self.insert_instance(name.into(), DependencyKey::of::<T>(), value);
        self
    }

    /// Adds an override for field `name`, replacing an earlier one.
    pub fn insert<T: Send + Sync + 'static>(&mut self, name: impl Into<String>, value: T) {
        self.insert_instance(name.into(), DependencyKey::of::<T>(), Arc::new(value));
    }

    fn insert_instance(&mut self, name: String, key: DependencyKey, value: Instance) {
        self.entries.retain(|(existing, _, _)| *existing != name);
        self.entries.push((name, key, value));
    }

    /// Whether an override exists for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(existing, _, _)| existing == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, DependencyKey, &Instance)> {
        self.entries
            .iter()
            .map(|(name, key, value)| (name.as_str(), *key, value))
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(name, key, _)| (name, key)))
            .finish()
    }
}

/// Inverse of the root's field map: dependency type to root field name.
#[derive(Debug)]
pub(crate) struct RootIndex {
    by_type: HashMap<DependencyKey, &'static str>,
}

impl RootIndex {
    /// Inverts the root blueprint's fields.
    ///
    /// # Errors
    /// [`TarkibError::AmbiguousRootMapping`] if two root fields share a type.
    pub fn invert(root: &Blueprint) -> Result<Self> {
        let mut by_type = HashMap::with_capacity(root.fields().len());

        for field in root.fields() {
            if by_type.insert(field.key(), field.name()).is_some() {
                let fields: Vec<&'static str> = root
                    .fields()
                    .iter()
                    .filter(|f| f.key() == field.key())
                    .map(|f| f.name())
                    .collect();

                warn!(root = %root.key(), dependency = %field.key(), ?fields, "Ambiguous root mapping");
                return Err(TarkibError::AmbiguousRootMapping(AmbiguousRootMappingError {
                    dependency: field.key(),
                    fields,
                }));
            }
        }

        Ok(Self { by_type })
    }

    /// The root field declaring `key`, if any.
    pub fn field_for(&self, key: &DependencyKey) -> Option<&'static str> {
        self.by_type.get(key).copied()
    }
}

/// Overrides merged over the root's defaults, keyed by root field name.
#[derive(Debug, Default)]
pub(crate) struct RootValues {
    values: HashMap<&'static str, Instance>,
}

impl RootValues {
    /// Merges `overrides` over the defaults of `root`. Overrides win.
    ///
    /// With `strict`, an override for a field the root does not declare is
    /// an error; otherwise it is dropped with a warning.
    pub fn assemble(root: &Blueprint, overrides: &Overrides, strict: bool) -> Result<Self> {
        let mut values = HashMap::new();

        for (name, key, value) in overrides.iter() {
            let Some(field) = root.field(name) else {
                if strict {
                    let available: Vec<&str> = root.fields().iter().map(|f| f.name()).collect();
                    return Err(TarkibError::UnknownField(UnknownFieldError {
                        field: name.to_string(),
                        root: root.key(),
                        suggestions: suggest_similar(name, &available, 3),
                    }));
                }
                warn!(root = %root.key(), field = name, "Ignoring override for undeclared field");
                continue;
            };

            if field.key() != key {
                return Err(TarkibError::TypeMismatch {
                    field: name.to_string(),
                    expected: field.key(),
                    found: key,
                });
            }

            trace!(field = name, "Root value from override");
            values.insert(field.name(), value.clone());
        }

        for field in root.fields() {
            if values.contains_key(field.name()) {
                continue;
            }
            if let Some(value) = field.default_value() {
                trace!(field = field.name(), "Root value from default");
                values.insert(field.name(), value);
            }
        }

        debug!(root = %root.key(), count = values.len(), "Root values assembled");
        Ok(Self { values })
    }

    pub fn get(&self, field: &str) -> Option<&Instance> {
        self.values.get(field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

/// Values constructed so far, keyed by dependency type.
///
/// Write-once: a key is never replaced once present.
#[derive(Debug, Default)]
pub(crate) struct ReadyObjects {
    objects: HashMap<DependencyKey, Instance>,
}

impl ReadyObjects {
    /// Seeds the store with the root values, keyed by each root field's type.
    pub fn seeded(root: &Blueprint, root_values: &RootValues) -> Self {
        let objects = root
            .fields()
            .iter()
            .filter_map(|field| {
                root_values
                    .get(field.name())
                    .map(|value| (field.key(), value.clone()))
            })
            .collect();

        Self { objects }
    }

    pub fn contains(&self, key: &DependencyKey) -> bool {
        self.objects.contains_key(key)
    }

    pub fn get(&self, key: &DependencyKey) -> Option<&Instance> {
        self.objects.get(key)
    }

    /// Stores `value` under `key` unless the key is already present.
    ///
    /// Returns `false` (and keeps the existing value) on a repeat insert.
    pub fn insert(&mut self, key: DependencyKey, value: Instance) -> bool {
        if self.objects.contains_key(&key) {
            warn!(key = %key, "Value already constructed, keeping the first one");
            return false;
        }
        self.objects.insert(key, value);
        true
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }
}
