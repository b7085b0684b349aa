//! Core construction engine for Tarkib.

pub mod blueprint;
pub mod container;
pub mod error;
mod graph;
pub mod key;
pub mod values;

pub use blueprint::{Blueprint, Declared, FieldValues};
pub use container::{ConstructionPlan, Container, ContainerBuilder, PlanStep, construct, prelude};
pub use error::{Result, TarkibError};
pub use key::DependencyKey;
pub use values::Overrides;
