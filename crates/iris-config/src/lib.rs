//! Configuration types and loaders for Iris.
//!
//! This crate owns the on-disk configuration schema so the app and the remote
//! layer share a single source of truth for endpoints and cadences.

pub mod client;

pub use client::{
    default_config_path, ClientConfig, LoggingConfig, PollConfig, ReadTextConfig, ServerConfig,
    VideoConfig,
};
