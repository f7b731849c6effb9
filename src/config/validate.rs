// src/config/validate.rs

use anyhow::Context;
use globset::Glob;

use crate::config::model::ConfigFile;
use crate::errors::{Result, SitemillError};
use crate::pipeline::context::resolve_browser_targets;
use crate::pipeline::statics::StaticManifest;
use crate::watch::patterns::build_globset;

/// Run semantic validation against a loaded configuration.
///
/// This checks:
/// - `[project]` directories are non-empty and distinct
/// - every glob in `[markup]`, `[styles]`, `[scripts]`, `[statics]` and
///   `[watch]` compiles
/// - the static manifest has at least one include pattern
/// - `[targets].browsers` queries resolve
/// - the server port is non-zero
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_project(cfg)?;
    validate_globs(cfg)?;
    validate_targets(cfg)?;
    validate_server(cfg)?;
    Ok(())
}

fn validate_project(cfg: &ConfigFile) -> Result<()> {
    if cfg.project.source_dir.trim().is_empty() {
        return Err(SitemillError::ConfigError(
            "[project].source_dir must not be empty".to_string(),
        ));
    }
    if cfg.project.output_dir.trim().is_empty() {
        return Err(SitemillError::ConfigError(
            "[project].output_dir must not be empty".to_string(),
        ));
    }
    if cfg.project.source_dir == cfg.project.output_dir {
        return Err(SitemillError::ConfigError(format!(
            "[project].source_dir and [project].output_dir must differ (both are '{}')",
            cfg.project.source_dir
        )));
    }
    Ok(())
}

fn validate_globs(cfg: &ConfigFile) -> Result<()> {
    Glob::new(&cfg.markup.pattern).context("invalid [markup].pattern")?;
    Glob::new(&cfg.styles.entries).context("invalid [styles].entries")?;
    Glob::new(&cfg.scripts.entries).context("invalid [scripts].entries")?;

    let manifest = StaticManifest::compile(&cfg.statics.patterns)
        .context("invalid [statics].patterns")?;
    if manifest.include_patterns().is_empty() {
        return Err(SitemillError::ConfigError(
            "[statics].patterns must contain at least one include pattern".to_string(),
        ));
    }

    build_globset(&cfg.watch.markup).context("invalid [watch].markup")?;
    build_globset(&cfg.watch.styles).context("invalid [watch].styles")?;
    build_globset(&cfg.watch.scripts).context("invalid [watch].scripts")?;

    Ok(())
}

fn validate_targets(cfg: &ConfigFile) -> Result<()> {
    resolve_browser_targets(&cfg.targets.browsers).context("invalid [targets].browsers")?;
    Ok(())
}

fn validate_server(cfg: &ConfigFile) -> Result<()> {
    if cfg.server.port == 0 {
        return Err(SitemillError::ConfigError(
            "[server].port must be non-zero".to_string(),
        ));
    }
    Ok(())
}
