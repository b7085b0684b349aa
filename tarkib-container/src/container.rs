//! # The Container Builder — heart of Tarkib
//!
//! Builds a fully wired root value from declared types.
//!
//! # Architecture
//! ```text
//! ContainerBuilder<R> ──build()──> R
//!        │
//!        ├─ DependencyGraph::discover   (blueprints, recursively)
//!        ├─ RootIndex::invert           (root field type → name)
//!        ├─ TopologicalSorter::prepare  (cycle check)
//!        ├─ RootValues::assemble        (overrides over defaults)
//!        ├─ construction loop           (ReadyObjects, dependency order)
//!        └─ root binding                (root constructor)
//! ```
//!
//! Nothing outlives the call: the graph and every intermediate value are
//! dropped once the root is returned.
//!
//! # Examples
//! ```rust
//! use tarkib_container::prelude::*;
//!
//! #[derive(Clone, Debug, PartialEq)]
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
//!             .construct(|f| Ok(RedisClient { uri: f.take("uri")? }))
//!     }
//! }
//!
//! struct Config {
//!     redis_client: RedisClient,
//! }
//!
//! impl Declared for Config {
//!     fn blueprint() -> Blueprint {
//!         Blueprint::builder::<Self>()
//!             .field::<RedisClient>("redis_client")
//!             .field_with_default::<RedisUri>("redis_uri", || RedisUri("localhost:6379".into()))
//!             .construct(|f| Ok(Config { redis_client: f.take("redis_client")? }))
//!     }
//! }
//!
//! let config = Container::builder::<Config>()
//!     .with("redis_uri", RedisUri("example:1234".into()))
//!     .build()
//!     .expect("Failed to build");
//!
//! assert_eq!(config.redis_client.uri, RedisUri("example:1234".into()));
//! ```

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tarkib_support::rendering::{PlanLine, render_plan};
use tracing::{debug, info, instrument, trace};

use crate::blueprint::{Blueprint, Declared, FieldValues, Instance};
use crate::error::{Result, TarkibError, UnresolvableDependencyError};
use crate::graph::{DependencyGraph, TopologicalSorter};
use crate::key::DependencyKey;
use crate::values::{Overrides, ReadyObjects, RootIndex, RootValues};

// ═══════════════════════════════════════════
// ContainerBuilder
// ═══════════════════════════════════════════

/// Builds a root value of type `R` and everything it depends on.
///
/// Collect overrides for the root's fields, then call
/// [`build()`](ContainerBuilder::build).
///
/// ```rust,ignore
/// let config: Config = Container::builder::<Config>()
///     .with("redis_uri", RedisUri::from("example:1234"))
///     .build()?;
/// ```
pub struct ContainerBuilder<R> {
    overrides: Overrides,
    strict_overrides: bool,
    _root: PhantomData<fn() -> R>,
}

impl<R: Declared> ContainerBuilder<R> {
    pub fn new() -> Self {
        Self {
            overrides: Overrides::new(),
            strict_overrides: true,
            _root: PhantomData,
        }
    }

    /// Reject overrides for fields the root does not declare (default `true`).
    ///
    /// When disabled, such overrides are ignored with a warning.
    pub fn strict_overrides(mut self, strict: bool) -> Self {
        self.strict_overrides = strict;
        self
    }

    /// Override root field `name` with `value`.
    pub fn with<T: Send + Sync + 'static>(mut self, name: impl Into<String>, value: T) -> Self {
        self.overrides.insert(name, value);
        self
    }

    /// Override root field `name` with a shared value whose identity is kept.
    pub fn with_shared<T: Send + Sync + 'static>(
        mut self,
        name: impl Into<String>,
        value: Arc<T>,
    ) -> Self {
        self.overrides = self.overrides.with_shared(name, value);
        self
    }

    /// Replace all overrides collected so far.
    pub fn overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Build the root and all of its dependencies.
    ///
    /// # Errors
    /// - [`TarkibError::DuplicateField`] — a blueprint repeats a field name
    /// - [`TarkibError::AmbiguousRootMapping`] — two root fields share a type
    /// - [`TarkibError::CircularDependency`] — the declarations form a cycle
    /// - [`TarkibError::UnknownField`] / [`TarkibError::TypeMismatch`] — bad override
    /// - [`TarkibError::UnresolvableDependency`] — a field has no value anywhere
    /// - [`TarkibError::UnboundRootField`] — a root field ended up without a value
    /// - [`TarkibError::ConstructionFailed`] — a constructor returned an error
    ///
    /// The first four are raised before any constructor or default runs.
    #[instrument(skip(self), name = "container_build", fields(root = %DependencyKey::of::<R>()))]
    pub fn build(self) -> Result<R> {
        info!(overrides = self.overrides.len(), "Building container");

        let graph = DependencyGraph::discover(R::blueprint())?;
        let root = graph.root_blueprint();
        let index = RootIndex::invert(root)?;

        let mut sorter = TopologicalSorter::new(&graph);
        sorter.prepare()?;

        let root_values = RootValues::assemble(root, &self.overrides, self.strict_overrides)?;
        let mut ready = ReadyObjects::seeded(root, &root_values);
        debug!(seeded = ready.len(), root_values = root_values.len(), "Ready objects seeded");

        let mut construction = Construction {
            graph: &graph,
            index: &index,
            root_values: &root_values,
            ready: &mut ready,
        };
        let built = construction.run(&mut sorter)?;
        let value = construction.bind_root()?;

        info!(nodes = graph.len(), constructed = built, "Container built successfully ✓");
        Ok(value)
    }

    /// Work out what [`build()`](ContainerBuilder::build) would do, without
    /// running any constructor.
    ///
    /// Runs the same checks as `build()` up to the construction loop.
    #[instrument(skip(self), name = "container_plan", fields(root = %DependencyKey::of::<R>()))]
    pub fn plan(&self) -> Result<ConstructionPlan> {
        let graph = DependencyGraph::discover(R::blueprint())?;
        let root = graph.root_blueprint();
        let index = RootIndex::invert(root)?;

        let mut sorter = TopologicalSorter::new(&graph);
        sorter.prepare()?;

        let root_values = RootValues::assemble(root, &self.overrides, self.strict_overrides)?;
        let mut present: HashSet<DependencyKey> = root
            .fields()
            .iter()
            .filter(|f| root_values.get(f.name()).is_some())
            .map(|f| f.key())
            .collect();

        let mut steps = Vec::with_capacity(graph.len());
        while sorter.is_active() {
            for key in sorter.get_ready() {
                let step = if key == graph.root() {
                    PlanStep::Root
                } else if present.contains(&key) {
                    PlanStep::Supplied {
                        field: index.field_for(&key),
                    }
                } else if graph.node(&key).is_some_and(|n| n.blueprint.is_leaf()) {
                    PlanStep::Missing
                } else {
                    present.insert(key);
                    PlanStep::Build
                };

                steps.push((key, step));
                sorter.done(&key);
            }
        }

        Ok(ConstructionPlan { steps })
    }
}

impl<R: Declared> Default for ContainerBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Declared> fmt::Debug for ContainerBuilder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuilder")
            .field("root", &DependencyKey::of::<R>())
            .field("overrides", &self.overrides)
            .field("strict_overrides", &self.strict_overrides)
            .finish()
    }
}

// ═══════════════════════════════════════════
// Construction loop (internal)
// ═══════════════════════════════════════════

/// State of one construction call.
struct Construction<'a> {
    graph: &'a DependencyGraph,
    index: &'a RootIndex,
    root_values: &'a RootValues,
    ready: &'a mut ReadyObjects,
}

impl Construction<'_> {
    /// Constructs every non-root node in dependency order.
    ///
    /// Returns the number of values constructed.
    fn run(&mut self, sorter: &mut TopologicalSorter<'_>) -> Result<usize> {
        let mut constructed = 0;

        while sorter.is_active() {
            for key in sorter.get_ready() {
                if key == self.graph.root() {
                    trace!(node = %key, "Root is bound last");
                } else if self.ready.contains(&key) {
                    debug!(node = %key, "Reusing supplied value");
                } else if let Some(value) = self.construct_node(&key)? {
                    self.ready.insert(key, value);
                    constructed += 1;
                }
                sorter.done(&key);
            }
        }

        debug!(finished = sorter.finished(), constructed, "Construction loop finished");
        Ok(constructed)
    }

    /// Builds one node; `None` for a leaf nobody supplied.
    fn construct_node(&self, key: &DependencyKey) -> Result<Option<Instance>> {
        let Some(node) = self.graph.node(key) else {
            return Ok(None);
        };
        let blueprint = &node.blueprint;

        if blueprint.is_leaf() {
            // dependents report it if they can't find a value elsewhere
            trace!(node = %key, "Leaf without a supplied value");
            return Ok(None);
        }

        let mut values = FieldValues::new(*key);
        for field in blueprint.fields() {
            let value = self.resolve_field(blueprint, field.name(), field.key())?;
            values.insert(field.name(), field.key(), value);
        }

        let built = blueprint.construct(&mut values)?;
        debug!(node = %key, fields = blueprint.fields().len(), "Constructed");
        Ok(Some(Arc::from(built)))
    }

    /// Ready objects first, then root values by type, then the owner's default.
    fn resolve_field(
        &self,
        owner: &Blueprint,
        name: &'static str,
        dependency: DependencyKey,
    ) -> Result<Instance> {
        if let Some(value) = self.ready.get(&dependency) {
            trace!(owner = %owner.key(), field = name, "Resolved from ready objects");
            return Ok(value.clone());
        }

        if let Some(value) = self
            .index
            .field_for(&dependency)
            .and_then(|root_field| self.root_values.get(root_field))
        {
            trace!(owner = %owner.key(), field = name, "Resolved from root values");
            return Ok(value.clone());
        }

        if let Some(value) = owner.field(name).and_then(|f| f.default_value()) {
            trace!(owner = %owner.key(), field = name, "Resolved from field default");
            return Ok(value);
        }

        Err(TarkibError::UnresolvableDependency(UnresolvableDependencyError {
            requested: dependency,
            required_by: owner.key(),
            field: name,
        }))
    }

    /// Hands the ready value of every root field to the root constructor.
    fn bind_root<R: Declared>(&self) -> Result<R> {
        let root = self.graph.root_blueprint();
        let mut values = FieldValues::new(root.key());

        for field in root.fields() {
            let value = self.ready.get(&field.key()).ok_or(TarkibError::UnboundRootField {
                field: field.name(),
                key: field.key(),
            })?;
            values.insert(field.name(), field.key(), value.clone());
        }

        let built = root.construct(&mut values)?;
        built.downcast::<R>().map(|b| *b).map_err(|_| {
            TarkibError::construction(
                root.key(),
                format!("root constructor did not produce {}", DependencyKey::of::<R>()),
            )
        })
    }
}

// ═══════════════════════════════════════════
// Container (entry points)
// ═══════════════════════════════════════════

/// Entry point for building declared roots.
///
/// Holds no state: every build owns its own graph and values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Container;

impl Container {
    /// Create a builder for root type `R`.
    pub fn builder<R: Declared>() -> ContainerBuilder<R> {
        ContainerBuilder::new()
    }

    /// Build `R` with the given overrides.
    pub fn construct<R: Declared>(overrides: Overrides) -> Result<R> {
        ContainerBuilder::new().overrides(overrides).build()
    }
}

/// Build `R` with the given overrides.
///
/// ```rust,ignore
/// let config: Config = construct(Overrides::new().with("redis_uri", uri))?;
/// ```
pub fn construct<R: Declared>(overrides: Overrides) -> Result<R> {
    Container::construct(overrides)
}

// ═══════════════════════════════════════════
// ConstructionPlan
// ═══════════════════════════════════════════

/// What happens to one node during construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStep {
    /// The root type; bound last from its fields
    Root,
    /// Taken from a root value (override or default), never constructed
    Supplied { field: Option<&'static str> },
    /// Constructed from its own fields
    Build,
    /// A leaf nobody supplies; dependents need a default for it
    Missing,
}

impl PlanStep {
    fn role(&self) -> &'static str {
        match self {
            PlanStep::Root => "root",
            PlanStep::Supplied { .. } => "supplied",
            PlanStep::Build => "build",
            PlanStep::Missing => "missing",
        }
    }
}

/// Nodes in the order [`ContainerBuilder::build`] would process them.
#[derive(Debug, Clone)]
pub struct ConstructionPlan {
    steps: Vec<(DependencyKey, PlanStep)>,
}

impl ConstructionPlan {
    pub fn steps(&self) -> &[(DependencyKey, PlanStep)] {
        &self.steps
    }

    /// The step planned for `key`, if it is part of the graph.
    pub fn step_for(&self, key: &DependencyKey) -> Option<PlanStep> {
        self.steps.iter().find(|(k, _)| k == key).map(|(_, step)| *step)
    }

    /// Keys of the nodes that will be constructed, in order.
    pub fn constructed(&self) -> Vec<DependencyKey> {
        self.steps
            .iter()
            .filter(|(_, step)| *step == PlanStep::Build)
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Display for ConstructionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<PlanLine> = self
            .steps
            .iter()
            .map(|(key, step)| PlanLine {
                type_name: key.short_name(),
                role: step.role().to_string(),
                note: match step {
                    PlanStep::Supplied { field: Some(field) } => Some(format!("from: {field}")),
                    _ => None,
                },
            })
            .collect();

        f.write_str(&render_plan(&lines))
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{ConstructionPlan, Container, ContainerBuilder, PlanStep, construct};
    pub use crate::blueprint::{Blueprint, Declared, FieldValues};
    pub use crate::error::{Result, TarkibError};
    pub use crate::key::DependencyKey;
    pub use crate::values::Overrides;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Debug, PartialEq)]
    struct RedisUri(String);

    impl RedisUri {
        fn new(uri: &str) -> Self {
            RedisUri(uri.to_string())
        }
    }

    impl Declared for RedisUri {
        fn blueprint() -> Blueprint {
            Blueprint::leaf::<Self>()
        }
    }

    #[derive(Clone, Debug)]
    struct RedisClient {
        uri: RedisUri,
    }

    impl Declared for RedisClient {
        fn blueprint() -> Blueprint {
            Blueprint::builder::<Self>()
                .field::<RedisUri>("uri")
                .construct(|f| Ok(RedisClient { uri: f.take("uri")? }))
        }
    }

    /// Root with the address declared (and defaulted) on the root itself.
    struct Config {
        redis_client: RedisClient,
        redis_uri: RedisUri,
    }

    impl Declared for Config {
        fn blueprint() -> Blueprint {
            Blueprint::builder::<Self>()
                .field::<RedisClient>("redis_client")
                .field_with_default::<RedisUri>("redis_uri", || RedisUri::new("localhost:6379"))
                .construct(|f| {
                    Ok(Config {
                        redis_client: f.take("redis_client")?,
                        redis_uri: f.take("redis_uri")?,
                    })
                })
        }
    }

    #[test]
    fn defaults_flow_into_nested_client() {
        let config = Container::builder::<Config>().build().unwrap();
        assert_eq!(config.redis_client.uri, RedisUri::new("localhost:6379"));
        assert_eq!(config.redis_uri, RedisUri::new("localhost:6379"));
    }

    #[test]
    fn override_beats_default() {
        let config = Container::builder::<Config>()
            .with("redis_uri", RedisUri::new("example:1234"))
            .build()
            .unwrap();

        assert_eq!(config.redis_client.uri, RedisUri::new("example:1234"));
        assert_eq!(config.redis_uri, RedisUri::new("example:1234"));
    }

    #[test]
    fn construct_free_function() {
        let config: Config =
            construct(Overrides::new().with("redis_uri", RedisUri::new("example:1234"))).unwrap();
        assert_eq!(config.redis_client.uri.0, "example:1234");
    }

    #[test]
    fn default_on_nested_type() {
        #[derive(Clone)]
        struct Client {
            address: RedisUri,
        }
        impl Declared for Client {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field_with_default::<RedisUri>("address", || RedisUri::new("localhost:6379"))
                    .construct(|f| Ok(Client { address: f.take("address")? }))
            }
        }

        struct App {
            client: Client,
        }
        impl Declared for App {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<Client>("client")
                    .construct(|f| Ok(App { client: f.take("client")? }))
            }
        }

        let app = Container::builder::<App>().build().unwrap();
        assert_eq!(app.client.address, RedisUri::new("localhost:6379"));
    }

    #[test]
    fn supplied_value_is_not_reconstructed() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        struct Counted;
        impl Declared for Counted {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>().construct(|_| {
                    BUILT.fetch_add(1, Ordering::SeqCst);
                    Ok(Counted)
                })
            }
        }

        struct Holder {
            counted: Arc<Counted>,
        }
        impl Declared for Holder {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<Arc<Counted>>("counted")
                    .construct(|f| Ok(Holder { counted: f.take("counted")? }))
            }
        }

        let supplied = Arc::new(Counted);
        let holder = Container::builder::<Holder>()
            .with("counted", supplied.clone())
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(&supplied, &holder.counted));
        assert_eq!(BUILT.load(Ordering::SeqCst), 0);

        let built = Container::builder::<Holder>().build().unwrap();
        assert!(!Arc::ptr_eq(&supplied, &built.counted));
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shared_client_keeps_identity_through_dependents() {
        #[derive(Clone)]
        struct Service {
            client: Arc<RedisClient>,
        }
        impl Declared for Service {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<Arc<RedisClient>>("client")
                    .construct(|f| Ok(Service { client: f.take("client")? }))
            }
        }

        struct App {
            client: Arc<RedisClient>,
            service: Service,
        }
        impl Declared for App {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<Arc<RedisClient>>("client")
                    .field::<Service>("service")
                    .construct(|f| {
                        Ok(App {
                            client: f.take("client")?,
                            service: f.take("service")?,
                        })
                    })
            }
        }

        let client = Arc::new(RedisClient { uri: RedisUri::new("example:1234") });
        let app = Container::builder::<App>()
            .with("client", client.clone())
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(&client, &app.client));
        assert!(Arc::ptr_eq(&client, &app.service.client));
    }

    #[test]
    fn with_shared_hands_out_the_same_allocation() {
        struct App {
            uri: Arc<RedisUri>,
        }
        impl Declared for App {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<RedisUri>("uri")
                    .construct(|f| Ok(App { uri: f.shared("uri")? }))
            }
        }

        let uri = Arc::new(RedisUri::new("example:1234"));
        let app = Container::builder::<App>()
            .with_shared("uri", uri.clone())
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(&uri, &app.uri));
    }

    #[test]
    fn ambiguous_root_fails_before_anything_runs() {
        static TOUCHED: AtomicUsize = AtomicUsize::new(0);

        struct TwoAddresses;
        impl Declared for TwoAddresses {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field_with_default::<RedisUri>("primary", || {
                        TOUCHED.fetch_add(1, Ordering::SeqCst);
                        RedisUri::new("a:1")
                    })
                    .field::<RedisUri>("replica")
                    .construct(|_| {
                        TOUCHED.fetch_add(1, Ordering::SeqCst);
                        Ok(TwoAddresses)
                    })
            }
        }

        let result = Container::builder::<TwoAddresses>()
            .with("replica", RedisUri::new("b:2"))
            .build();

        match result {
            Err(TarkibError::AmbiguousRootMapping(err)) => {
                assert_eq!(err.fields, vec!["primary", "replica"]);
            }
            Err(other) => panic!("Expected AmbiguousRootMapping, got: {other:?}"),
            Ok(_) => panic!("Expected AmbiguousRootMapping, got a value"),
        }
        assert_eq!(TOUCHED.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unresolvable_nested_dependency() {
        #[derive(Clone)]
        struct Timeout(u64);
        impl Declared for Timeout {
            fn blueprint() -> Blueprint {
                Blueprint::leaf::<Self>()
            }
        }

        #[derive(Clone)]
        struct Client {
            timeout: Timeout,
        }
        impl Declared for Client {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<Timeout>("timeout")
                    .construct(|f| Ok(Client { timeout: f.take("timeout")? }))
            }
        }

        struct App {
            client: Client,
        }
        impl Declared for App {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<Client>("client")
                    .construct(|f| Ok(App { client: f.take("client")? }))
            }
        }

        match Container::builder::<App>().build() {
            Err(TarkibError::UnresolvableDependency(err)) => {
                assert!(err.requested.is::<Timeout>());
                assert!(err.required_by.is::<Client>());
                assert_eq!(err.field, "timeout");
            }
            Err(other) => panic!("Expected UnresolvableDependency, got: {other:?}"),
            Ok(app) => panic!("Expected an error, got timeout {}", app.client.timeout.0),
        }
    }

    #[test]
    fn cycle_fails_before_construction() {
        static BUILT: AtomicUsize = AtomicUsize::new(0);

        struct Left;
        struct Right;
        struct Top;
        impl Declared for Left {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>().field::<Right>("right").construct(|_| {
                    BUILT.fetch_add(1, Ordering::SeqCst);
                    Ok(Left)
                })
            }
        }
        impl Declared for Right {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>().field::<Left>("left").construct(|_| {
                    BUILT.fetch_add(1, Ordering::SeqCst);
                    Ok(Right)
                })
            }
        }
        impl Declared for Top {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<Left>("left")
                    .field::<u8>("level")
                    .construct(|_| Ok(Top))
            }
        }

        let result = Container::builder::<Top>().with("level", 1u8).build();
        match result {
            Err(TarkibError::CircularDependency(err)) => {
                assert_eq!(err.chain.first(), err.chain.last());
                assert!(err.chain.contains(&DependencyKey::of::<Right>()));
            }
            Err(other) => panic!("Expected CircularDependency, got: {other:?}"),
            Ok(_) => panic!("Expected CircularDependency, got a value"),
        }
        assert_eq!(BUILT.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn ready_value_wins_over_reconstruction() {
        // RedisClient is supplied on the root; it is not rebuilt from RedisUri
        struct App {
            client: RedisClient,
            uri: RedisUri,
        }
        impl Declared for App {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<RedisClient>("client")
                    .field_with_default::<RedisUri>("uri", || RedisUri::new("localhost:6379"))
                    .construct(|f| {
                        Ok(App {
                            client: f.take("client")?,
                            uri: f.take("uri")?,
                        })
                    })
            }
        }

        let app = Container::builder::<App>()
            .with("client", RedisClient { uri: RedisUri::new("override:1") })
            .build()
            .unwrap();

        assert_eq!(app.client.uri, RedisUri::new("override:1"));
        assert_eq!(app.uri, RedisUri::new("localhost:6379"));
    }

    #[test]
    fn unknown_override_field() {
        let result = Container::builder::<Config>()
            .with("redis_url", RedisUri::new("example:1234"))
            .build();

        match result {
            Err(TarkibError::UnknownField(err)) => {
                assert_eq!(err.suggestions, vec!["redis_uri".to_string()]);
            }
            Err(other) => panic!("Expected UnknownField, got: {other:?}"),
            Ok(_) => panic!("Expected UnknownField, got a value"),
        }

        let lenient = Container::builder::<Config>()
            .strict_overrides(false)
            .with("redis_url", RedisUri::new("example:1234"))
            .build()
            .unwrap();
        assert_eq!(lenient.redis_uri, RedisUri::new("localhost:6379"));
    }

    #[test]
    fn constructor_error_aborts_build() {
        struct Fails;
        impl Declared for Fails {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<RedisUri>("uri")
                    .construct(|f| {
                        let uri: RedisUri = f.take("uri")?;
                        Err(TarkibError::construction(
                            f.owner(),
                            format!("cannot parse {}", uri.0),
                        ))
                    })
            }
        }

        struct App {
            _fails: Fails,
        }
        impl Declared for App {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<Fails>("fails")
                    .field_with_default::<RedisUri>("uri", || RedisUri::new("not a uri"))
                    .construct(|_| unreachable!("dependency construction fails first"))
            }
        }

        match Container::builder::<App>().build() {
            Err(TarkibError::ConstructionFailed { key, source }) => {
                assert!(key.is::<Fails>());
                assert!(source.to_string().contains("not a uri"));
            }
            Err(other) => panic!("Expected ConstructionFailed, got: {other:?}"),
            Ok(_) => panic!("Expected ConstructionFailed, got a value"),
        }
    }

    #[test]
    fn unbound_root_leaf() {
        struct App {
            port: u16,
        }
        impl Declared for App {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<u16>("port")
                    .construct(|f| Ok(App { port: f.take("port")? }))
            }
        }

        match Container::builder::<App>().build() {
            Err(TarkibError::UnboundRootField { field, key }) => {
                assert_eq!(field, "port");
                assert!(key.is::<u16>());
            }
            Err(other) => panic!("Expected UnboundRootField, got: {other:?}"),
            Ok(app) => panic!("Expected an error, got port {}", app.port),
        }

        let app = Container::builder::<App>().with("port", 6379u16).build().unwrap();
        assert_eq!(app.port, 6379);
    }

    #[test]
    fn leaf_root_is_not_constructible() {
        assert!(matches!(
            Container::builder::<RedisUri>().build(),
            Err(TarkibError::NotConstructible { .. })
        ));
    }

    #[test]
    fn plan_lists_roles_in_order() {
        let plan = Container::builder::<Config>().plan().unwrap();

        let keys: Vec<DependencyKey> = plan.steps().iter().map(|(k, _)| *k).collect();
        assert_eq!(
            keys,
            vec![
                DependencyKey::of::<RedisUri>(),
                DependencyKey::of::<RedisClient>(),
                DependencyKey::of::<Config>(),
            ]
        );
        assert_eq!(
            plan.step_for(&DependencyKey::of::<RedisUri>()),
            Some(PlanStep::Supplied { field: Some("redis_uri") })
        );
        assert_eq!(plan.constructed(), vec![DependencyKey::of::<RedisClient>()]);
        assert_eq!(plan.step_for(&DependencyKey::of::<Config>()), Some(PlanStep::Root));

        let rendered = plan.to_string();
        assert!(rendered.contains("[supplied] RedisUri  (from: redis_uri)"));
        assert!(rendered.contains("[build   ] RedisClient"));
    }

    #[test]
    fn plan_marks_missing_leaves() {
        #[derive(Clone)]
        struct Client {
            _port: u16,
        }
        impl Declared for Client {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<u16>("port")
                    .construct(|f| Ok(Client { _port: f.take("port")? }))
            }
        }

        struct App;
        impl Declared for App {
            fn blueprint() -> Blueprint {
                Blueprint::builder::<Self>()
                    .field::<Client>("client")
                    .construct(|_| Ok(App))
            }
        }

        let plan = Container::builder::<App>().plan().unwrap();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.step_for(&DependencyKey::of::<u16>()), Some(PlanStep::Missing));
    }

    #[test]
    fn independent_builds_on_threads() {
        let handles: Vec<_> = ["a:1", "b:2", "c:3"]
            .into_iter()
            .map(|uri| {
                std::thread::spawn(move || {
                    Container::builder::<Config>()
                        .with("redis_uri", RedisUri::new(uri))
                        .build()
                        .map(|config| config.redis_client.uri.0)
                })
            })
            .collect();

        let uris: Vec<String> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        assert_eq!(uris, vec!["a:1", "b:2", "c:3"]);
    }

    #[test]
    fn builder_debug() {
        let builder = Container::builder::<Config>().with("redis_uri", RedisUri::new("x:1"));
        let debug = format!("{builder:?}");
        assert!(debug.contains("ContainerBuilder"));
        assert!(debug.contains("redis_uri"));
    }
}
