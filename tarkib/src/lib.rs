//! # Tarkib — declarative object-graph construction for Rust
//!
//! Declare what each type's fields need; Tarkib discovers the dependency
//! graph, orders it, builds every dependency once and hands back the
//! fully wired root.
//!
//! ```rust
//! use tarkib::{Container, Declared};
//!
//! #[derive(Clone, Debug, PartialEq, Declared)]
//! #[tarkib(leaf)]
//! struct RedisUri(String);
//!
//! #[derive(Clone, Declared)]
//! struct RedisClient {
//!     redis_uri: RedisUri,
//! }
//!
//! #[derive(Declared)]
//! struct Config {
//!     redis_client: RedisClient,
//!     #[tarkib(default = RedisUri("localhost:6379".to_string()))]
//!     redis_uri: RedisUri,
//! }
//!
//! let config = Container::builder::<Config>().build().unwrap();
//! assert_eq!(config.redis_client.redis_uri.0, "localhost:6379");
//! # let _ = config.redis_uri;
//! ```

pub use tarkib_container::*;
pub use tarkib_derive::*;
pub use tarkib_support::*;
