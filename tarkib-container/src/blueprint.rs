//! Declared types and their blueprints.
//!
//! A [`Blueprint`] is the static description of a type: the ordered list of
//! its fields, the dependency type each field expects, optional default
//! values, and a constructor that builds the type from resolved field
//! values. Leaf types (plain values such as an address string) have no
//! fields and no constructor; their values must come from outside.
//!
//! # Examples
//! ```rust
//! use tarkib_container::blueprint::{Blueprint, Declared};
//!
//! #[derive(Clone)]
//! struct RedisUri(String);
//!
//! impl Declared for RedisUri {
//!     fn blueprint() -> Blueprint {
//!         Blueprint::leaf::<Self>()
//!     }
//! }
//!
//! #[derive(Clone)]
//! struct RedisClient {
//!     uri: RedisUri,
//! }
//!
//! impl Declared for RedisClient {
//!     fn blueprint() -> Blueprint {
//!         Blueprint::builder::<Self>()
//!             .field::<RedisUri>("uri")
//!             .construct(|fields| Ok(RedisClient { uri: fields.take("uri")? }))
//!     }
//! }
//!
//! let blueprint = RedisClient::blueprint();
//! assert_eq!(blueprint.fields().len(), 1);
//! assert!(!blueprint.is_leaf());
//! assert!(RedisUri::blueprint().is_leaf());
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{Result, TarkibError};
use crate::key::DependencyKey;

/// A constructed value, type-erased and shareable between dependents.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Type-erased constructor stored in a blueprint.
pub type ConstructFn =
    Arc<dyn Fn(&mut FieldValues) -> Result<Box<dyn Any + Send + Sync>> + Send + Sync>;

/// Producer of a field's default value.
pub type DefaultFn = Arc<dyn Fn() -> Instance + Send + Sync>;

/// A type that can take part in graph construction.
///
/// Implement by hand with [`Blueprint::builder`] / [`Blueprint::leaf`], or
/// with `#[derive(Declared)]` from the `tarkib` crate.
pub trait Declared: Send + Sync + 'static {
    /// Returns the static description of this type.
    fn blueprint() -> Blueprint;
}

/// One declared field: its name, dependency type and optional default.
#[derive(Clone)]
pub struct Field {
    name: &'static str,
    key: DependencyKey,
    blueprint: fn() -> Blueprint,
    default: Option<DefaultFn>,
}

impl Field {
    /// The field name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The dependency type this field expects.
    #[inline]
    pub fn key(&self) -> DependencyKey {
        self.key
    }

    /// Whether the field declares a default value.
    #[inline]
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Produces the default value, if one is declared.
    pub fn default_value(&self) -> Option<Instance> {
        self.default.as_ref().map(|make| make())
    }

    /// Blueprint of the field's dependency type (used by graph discovery).
    pub(crate) fn dependency_blueprint(&self) -> Blueprint {
        (self.blueprint)()
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("key", &self.key)
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

/// Static description of a [`Declared`] type.
#[derive(Clone)]
pub struct Blueprint {
    key: DependencyKey,
    fields: Vec<Field>,
    constructor: Option<ConstructFn>,
}

impl Blueprint {
    /// Starts a blueprint for a constructible type `T`.
    pub fn builder<T: Send + Sync + 'static>() -> BlueprintBuilder<T> {
        BlueprintBuilder {
            key: DependencyKey::of::<T>(),
            fields: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// A leaf blueprint: no fields, no constructor.
    ///
    /// Values of leaf types are supplied through root fields (overrides or
    /// defaults) or through field defaults of the types that need them.
    pub fn leaf<T: Send + Sync + 'static>() -> Self {
        Self {
            key: DependencyKey::of::<T>(),
            fields: Vec::new(),
            constructor: None,
        }
    }

    /// The key of the described type.
    #[inline]
    pub fn key(&self) -> DependencyKey {
        self.key
    }

    /// Declared fields, in declaration order.
    #[inline]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns `true` if the type has no constructor.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.constructor.is_none()
    }

    /// Produces the declared defaults, keyed by field name.
    ///
    /// Evaluated on demand; the type itself is never instantiated.
    pub fn defaults(&self) -> HashMap<&'static str, Instance> {
        self.fields
            .iter()
            .filter_map(|f| f.default_value().map(|value| (f.name, value)))
            .collect()
    }

    /// Runs the constructor against resolved field values.
    pub(crate) fn construct(&self, values: &mut FieldValues) -> Result<Box<dyn Any + Send + Sync>> {
        let constructor = self
            .constructor
            .as_ref()
            .ok_or(TarkibError::NotConstructible { key: self.key })?;
        constructor(values)
    }

    /// Same fields and defaults, with every constructed value passed
    /// through `wrap` and keyed as `W`.
    fn wrapped<T, W>(self, wrap: fn(T) -> W) -> Self
    where
        T: Send + Sync + 'static,
        W: Send + Sync + 'static,
    {
        let key = DependencyKey::of::<W>();
        let constructor = self.constructor.map(|inner| -> ConstructFn {
            Arc::new(move |values: &mut FieldValues| -> Result<Box<dyn Any + Send + Sync>> {
                let built = inner(values)?;
                let value = built.downcast::<T>().map_err(|_| {
                    TarkibError::construction(key, "inner constructor produced a different type")
                })?;
                Ok(Box::new(wrap(*value)) as Box<dyn Any + Send + Sync>)
            })
        });

        Self {
            key,
            fields: self.fields,
            constructor,
        }
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("key", &self.key)
            .field("fields", &self.fields)
            .field("leaf", &self.is_leaf())
            .finish()
    }
}

/// Fluent builder for a constructible [`Blueprint`].
pub struct BlueprintBuilder<T> {
    key: DependencyKey,
    fields: Vec<Field>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> BlueprintBuilder<T> {
    /// Declares a field that needs a value of type `D`.
    pub fn field<D: Declared>(mut self, name: &'static str) -> Self {
        self.fields.push(Field {
            name,
            key: DependencyKey::of::<D>(),
            blueprint: D::blueprint,
            default: None,
        });
        self
    }

    /// Declares a field of type `D` with a default value.
    pub fn field_with_default<D: Declared>(
        mut self,
        name: &'static str,
        default: impl Fn() -> D + Send + Sync + 'static,
    ) -> Self {
        let default: DefaultFn = Arc::new(move || Arc::new(default()) as Instance);
        self.fields.push(Field {
            name,
            key: DependencyKey::of::<D>(),
            blueprint: D::blueprint,
            default: Some(default),
        });
        self
    }

    /// Finishes the blueprint with the type's constructor.
    ///
    /// The constructor receives every declared field, already resolved.
    pub fn construct(
        self,
        constructor: impl Fn(&mut FieldValues) -> Result<T> + Send + Sync + 'static,
    ) -> Blueprint {
        let constructor: ConstructFn =
            Arc::new(move |values: &mut FieldValues| -> Result<Box<dyn Any + Send + Sync>> {
                Ok(Box::new(constructor(values)?))
            });

        Blueprint {
            key: self.key,
            fields: self.fields,
            constructor: Some(constructor),
        }
    }
}

/// Resolved field values handed to a constructor.
///
/// Values are removed as they are taken; shared dependencies are cloned
/// out of the underlying [`Instance`].
pub struct FieldValues {
    owner: DependencyKey,
    values: HashMap<&'static str, (DependencyKey, Instance)>,
}

impl FieldValues {
    pub(crate) fn new(owner: DependencyKey) -> Self {
        Self {
            owner,
            values: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, name: &'static str, key: DependencyKey, value: Instance) {
        self.values.insert(name, (key, value));
    }

    /// The type being constructed.
    pub fn owner(&self) -> DependencyKey {
        self.owner
    }

    /// Number of values not yet taken.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` once every value has been taken.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Takes a clone of the value resolved for `name`.
    ///
    /// # Errors
    /// - [`TarkibError::TypeMismatch`] if `T` is not the field's type
    /// - [`TarkibError::ConstructionFailed`] if `name` was never declared
    ///   or was already taken
    pub fn take<T: Clone + 'static>(&mut self, name: &str) -> Result<T> {
        let (key, value) = self.remove(name)?;
        value
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| TarkibError::TypeMismatch {
                field: name.to_string(),
                expected: DependencyKey::of::<T>(),
                found: key,
            })
    }

    /// Takes the value resolved for `name` as a shared handle, without
    /// cloning the value itself.
    pub fn shared<T: Send + Sync + 'static>(&mut self, name: &str) -> Result<Arc<T>> {
        let (key, value) = self.remove(name)?;
        value.downcast::<T>().map_err(|_| TarkibError::TypeMismatch {
            field: name.to_string(),
            expected: DependencyKey::of::<T>(),
            found: key,
        })
    }

    fn remove(&mut self, name: &str) -> Result<(DependencyKey, Instance)> {
        self.values.remove(name).ok_or_else(|| {
            TarkibError::construction(
                self.owner,
                format!("field `{name}` is not declared or was already taken"),
            )
        })
    }
}

impl fmt::Debug for FieldValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("FieldValues")
            .field("owner", &self.owner)
            .field("remaining", &names)
            .finish()
    }
}

/// `Arc<T>` is declared whenever `T` is: same fields, value wrapped.
///
/// Supplying an `Arc` as a root value keeps its identity all the way to the
/// bound field.
impl<T: Declared> Declared for Arc<T> {
    fn blueprint() -> Blueprint {
        T::blueprint().wrapped::<T, Arc<T>>(Arc::new)
    }
}

macro_rules! declare_leaves {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Declared for $ty {
                fn blueprint() -> Blueprint {
                    Blueprint::leaf::<$ty>()
                }
            }
        )*
    };
}

declare_leaves!(
    String,
    &'static str,
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    std::time::Duration,
    std::path::PathBuf,
    std::net::SocketAddr,
);
