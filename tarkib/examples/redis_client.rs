//! Wiring a Redis client configuration with Tarkib.
//!
//! Run with `RUST_LOG=tarkib_container=debug` to watch the construction.

use std::fmt;

use tarkib::{Container, Declared, Result};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Declared)]
#[tarkib(leaf)]
struct RedisUri(String);

impl From<&str> for RedisUri {
    fn from(uri: &str) -> Self {
        RedisUri(uri.to_string())
    }
}

impl fmt::Display for RedisUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, Declared)]
struct RedisClient {
    redis_uri: RedisUri,
    #[tarkib(default = 5u32)]
    max_retries: u32,
}

#[derive(Debug, Declared)]
struct Config {
    redis_client: RedisClient,
    #[tarkib(default = RedisUri::from("localhost:6379"))]
    redis_uri: RedisUri,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tarkib_container=info")),
        )
        .init();

    let builder = Container::builder::<Config>();
    println!("Construction plan:\n{}", builder.plan()?);

    let config = builder.build()?;
    tracing::info!(uri = %config.redis_uri, "Config built from defaults");
    println!(
        "redis_client -> {} (retries: {})",
        config.redis_client.redis_uri, config.redis_client.max_retries
    );

    let config = Container::builder::<Config>()
        .with("redis_uri", RedisUri::from("example:1234"))
        .build()?;
    println!("overridden  -> {}", config.redis_client.redis_uri);
    println!("{config:?}");

    Ok(())
}
