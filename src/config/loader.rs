// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::ConfigFile;
use crate::config::validate::validate_config;
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `ConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (glob syntax, browser queries, etc.). Use [`load_or_default`]
/// for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: ConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load the configuration for a project, falling back to built-in defaults
/// when no file exists at `path`.
///
/// This is the entry point the rest of the application uses:
///
/// - Missing file: defaults describing the conventional `source/` -> `build/`
///   layout.
/// - Present file: TOML is read, section defaults are applied by `serde`,
///   and the result passes through [`validate_config`]. A malformed file is
///   an error, never silently replaced by defaults.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let config = if path.exists() {
        load_from_path(path)?
    } else {
        debug!(path = ?path, "no config file found, using defaults");
        ConfigFile::default()
    };
    validate_config(&config)?;
    Ok(config)
}

/// Directory that relative `[project]` paths are resolved against: the
/// directory containing the config file, or `.` when the path has no parent.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => PathBuf::from("."),
        Some(parent) => parent.to_path_buf(),
        None => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_or_default(dir.path().join("Sitemill.toml")).unwrap();
        assert_eq!(config.project.source_dir, "source");
        assert_eq!(config.project.output_dir, "build");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.watch.debounce_ms, 150);
        assert!(!config.watch.use_hash);
    }

    #[test]
    fn partial_file_keeps_section_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sitemill.toml");
        fs::write(
            &path,
            r#"
[project]
source_dir = "site"

[server]
port = 8080
"#,
        )
        .unwrap();

        let config = load_or_default(&path).unwrap();
        assert_eq!(config.project.source_dir, "site");
        assert_eq!(config.project.output_dir, "build");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.styles.entries, "styles/*.scss");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Sitemill.toml");
        fs::write(&path, "[project]\nsource = \"typo\"\n").unwrap();
        assert!(load_or_default(&path).is_err());
    }

    #[test]
    fn config_root_dir_handles_bare_file_names() {
        assert_eq!(config_root_dir(Path::new("Sitemill.toml")), Path::new("."));
        assert_eq!(
            config_root_dir(Path::new("/tmp/site/Sitemill.toml")),
            Path::new("/tmp/site")
        );
    }
}
