// src/config/mod.rs

//! Configuration loading and validation for sitemill.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load `Sitemill.toml` from disk, or fall back to defaults (`loader.rs`).
//! - Validate globs, browser queries and the project layout (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_from_path, load_or_default};
pub use model::ConfigFile;
pub use validate::validate_config;
