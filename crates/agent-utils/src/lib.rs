//! Shared utilities for the analysis workspace
//!
//! This crate provides the pieces every binary and library shares: tracing
//! setup and typed lookups of environment configuration.

pub mod config;
pub mod logging;

pub use config::{AppConfig, ConfigError, EnvLookup, env_list, env_parse, env_string};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
