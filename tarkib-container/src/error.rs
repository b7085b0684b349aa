//! Error types for Tarkib construction.
//!
//! Every failure aborts the whole construction call. Messages name the
//! types and fields involved and end with a hint about the usual fix.

use std::fmt;

use tarkib_support::rendering::render_chain;

use crate::key::DependencyKey;

/// Main error type for all Tarkib operations.
#[derive(Debug, thiserror::Error)]
pub enum TarkibError {
    /// Two root fields declare the same dependency type.
    #[error("{}", .0)]
    AmbiguousRootMapping(AmbiguousRootMappingError),

    /// A field could not be satisfied from built values, root values or defaults.
    #[error("{}", .0)]
    UnresolvableDependency(UnresolvableDependencyError),

    /// The declared types depend on each other in a cycle.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// An override names a field the root type does not declare.
    #[error("{}", .0)]
    UnknownField(UnknownFieldError),

    /// A supplied or default value does not have the field's declared type.
    #[error("Type mismatch for field `{field}`: expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: DependencyKey,
        found: DependencyKey,
    },

    /// A blueprint declares the same field name twice.
    #[error("Field `{field}` is declared more than once on {owner}")]
    DuplicateField {
        owner: DependencyKey,
        field: &'static str,
    },

    /// A root field has no value once construction has finished.
    #[error("Root field `{field}` of type {key} has no value after construction")]
    UnboundRootField {
        field: &'static str,
        key: DependencyKey,
    },

    /// The root type is a leaf and has no constructor.
    #[error("{key} is declared as a leaf and cannot be constructed as a root")]
    NotConstructible { key: DependencyKey },

    /// A constructor returned an error.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: DependencyKey,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl TarkibError {
    /// Wraps an arbitrary constructor error for `key`.
    pub fn construction(
        key: DependencyKey,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        TarkibError::ConstructionFailed {
            key,
            source: source.into(),
        }
    }
}

/// Two or more root fields share a dependency type.
///
/// Root values are looked up by type when satisfying nested dependencies,
/// so the field-name/type mapping on the root must be one-to-one.
#[derive(Debug)]
pub struct AmbiguousRootMappingError {
    /// The shared dependency type
    pub dependency: DependencyKey,
    /// All root fields declaring it, in declaration order
    pub fields: Vec<&'static str>,
}

impl fmt::Display for AmbiguousRootMappingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Ambiguous root mapping: fields {} all declare {}",
            self.fields
                .iter()
                .map(|name| format!("`{name}`"))
                .collect::<Vec<_>>()
                .join(", "),
            self.dependency,
        )?;
        write!(
            f,
            "\n  Hint: Wrap one of them in a distinct newtype so each root field has its own type"
        )
    }
}

/// A dependency could not be found or built.
#[derive(Debug)]
pub struct UnresolvableDependencyError {
    /// The dependency type that had no value
    pub requested: DependencyKey,
    /// The type whose field needed it
    pub required_by: DependencyKey,
    /// The field on `required_by`
    pub field: &'static str,
}

impl fmt::Display for UnresolvableDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unresolvable dependency: {}", self.requested)?;
        write!(f, "\n  Required by: {}.{}", self.required_by, self.field)?;
        write!(
            f,
            "\n  Hint: Declare a root field of type {} or give `{}` a default",
            self.requested, self.field,
        )
    }
}

/// Error when the declared types form a cycle.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// The keys forming the cycle, first key repeated at the end.
    /// Example: ["A", "B", "C", "A"]
    pub chain: Vec<DependencyKey>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.chain.iter().map(DependencyKey::short_name).collect();
        write!(f, "Circular dependency detected:\n  {}", render_chain(&names))?;
        write!(
            f,
            "\n  Hint: Supply one of these types as a root value or restructure the fields"
        )
    }
}

/// An override was given for a field the root does not have.
#[derive(Debug)]
pub struct UnknownFieldError {
    /// The override name
    pub field: String,
    /// The root type being constructed
    pub root: DependencyKey,
    /// Root fields with similar names
    pub suggestions: Vec<String>,
}

impl fmt::Display for UnknownFieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown field `{}` on {}", self.field, self.root)?;

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: Overrides apply to root fields only; use .strict_overrides(false) to ignore extras"
        )
    }
}

/// Convenient Result type for Tarkib operations.
pub type Result<T> = std::result::Result<T, TarkibError>;
