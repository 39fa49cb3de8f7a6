//! Tool configuration.

#[expect(clippy::module_inception, reason = "The config module holds the Config type")]
mod config;

pub use config::{Config, DEFAULT_CONFIG_YAML};
