// src/config/model.rs

use serde::Deserialize;

/// Top-level configuration as read from `Sitemill.toml`.
///
/// ```toml
/// [project]
/// source_dir = "source"
/// output_dir = "build"
///
/// [styles]
/// entries = "styles/*.scss"
///
/// [server]
/// port = 3000
/// ```
///
/// Every section is optional; a missing config file means "all defaults",
/// which reproduces the conventional `source/` -> `build/` project layout.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Directory layout from `[project]`.
    #[serde(default)]
    pub project: ProjectSection,

    /// Markup compilation from `[markup]`.
    #[serde(default)]
    pub markup: MarkupSection,

    /// Style compilation from `[styles]`.
    #[serde(default)]
    pub styles: StylesSection,

    /// Script bundling from `[scripts]`.
    #[serde(default)]
    pub scripts: ScriptsSection,

    /// Static asset manifest from `[statics]`.
    #[serde(default)]
    pub statics: StaticsSection,

    /// Browser support targets from `[targets]`.
    #[serde(default)]
    pub targets: TargetsSection,

    /// Dev server settings from `[server]`.
    #[serde(default)]
    pub server: ServerSection,

    /// File watching settings from `[watch]`.
    #[serde(default)]
    pub watch: WatchSection,
}

/// `[project]` section: where sources live and where outputs go.
///
/// Both paths are resolved relative to the directory containing the
/// config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    #[serde(default = "default_source_dir")]
    pub source_dir: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_source_dir() -> String {
    "source".to_string()
}

fn default_output_dir() -> String {
    "build".to_string()
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// `[markup]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarkupSection {
    /// Glob (relative to the source root) selecting markup files to process.
    #[serde(default = "default_markup_pattern")]
    pub pattern: String,
}

fn default_markup_pattern() -> String {
    "**/*.html".to_string()
}

impl Default for MarkupSection {
    fn default() -> Self {
        Self {
            pattern: default_markup_pattern(),
        }
    }
}

/// `[styles]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StylesSection {
    /// Glob (relative to the source root) selecting stylesheet entry points.
    ///
    /// Partials (file names starting with `_`) are never treated as entries
    /// even when the glob matches them.
    #[serde(default = "default_style_entries")]
    pub entries: String,

    /// Output directory for compiled stylesheets, relative to the output root.
    #[serde(default = "default_style_out_dir")]
    pub out_dir: String,
}

fn default_style_entries() -> String {
    "styles/*.scss".to_string()
}

fn default_style_out_dir() -> String {
    "styles".to_string()
}

impl Default for StylesSection {
    fn default() -> Self {
        Self {
            entries: default_style_entries(),
            out_dir: default_style_out_dir(),
        }
    }
}

/// `[scripts]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptsSection {
    /// Glob (relative to the source root) selecting script entry points.
    /// Each entry is bundled independently.
    #[serde(default = "default_script_entries")]
    pub entries: String,

    /// Output directory for bundled scripts, relative to the output root.
    #[serde(default = "default_script_out_dir")]
    pub out_dir: String,
}

fn default_script_entries() -> String {
    "scripts/*.js".to_string()
}

fn default_script_out_dir() -> String {
    "scripts".to_string()
}

impl Default for ScriptsSection {
    fn default() -> Self {
        Self {
            entries: default_script_entries(),
            out_dir: default_script_out_dir(),
        }
    }
}

/// `[statics]` section.
///
/// Patterns are relative to the source root. A leading `!` marks an
/// exclusion, e.g. `"!**/README.md"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticsSection {
    #[serde(default = "default_static_patterns")]
    pub patterns: Vec<String>,
}

fn default_static_patterns() -> Vec<String> {
    [
        "*.ico",
        "*.webmanifest",
        "favicons/**/*.{svg,png,webp}",
        "fonts/**/*.woff2",
        "images/**/*.{svg,avif,webp}",
        "vendor/**/*",
        "!**/README.md",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for StaticsSection {
    fn default() -> Self {
        Self {
            patterns: default_static_patterns(),
        }
    }
}

/// `[targets]` section: browserslist queries shared by the style and
/// script pipelines.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetsSection {
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,
}

fn default_browsers() -> Vec<String> {
    vec!["last 2 versions".to_string(), "not dead".to_string()]
}

impl Default for TargetsSection {
    fn default() -> Self {
        Self {
            browsers: default_browsers(),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// `[watch]` section.
///
/// Each pattern list maps source edits to the pipeline task that must
/// re-run. Edits matching the static manifest only notify connected
/// browsers; no task re-runs for them.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchSection {
    /// Quiet window, in milliseconds, before a burst of file events is
    /// turned into task triggers.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// When true, a trigger is dropped if the aggregate content hash of the
    /// matched files has not changed since the last run.
    #[serde(default)]
    pub use_hash: bool,

    #[serde(default = "default_watch_markup")]
    pub markup: Vec<String>,

    #[serde(default = "default_watch_styles")]
    pub styles: Vec<String>,

    #[serde(default = "default_watch_scripts")]
    pub scripts: Vec<String>,
}

fn default_debounce_ms() -> u64 {
    150
}

fn default_watch_markup() -> Vec<String> {
    vec!["**/*.html".to_string(), "**/*.njk".to_string()]
}

fn default_watch_styles() -> Vec<String> {
    vec!["**/*.scss".to_string(), "**/*.svg".to_string()]
}

fn default_watch_scripts() -> Vec<String> {
    vec!["scripts/**/*.js".to_string()]
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            use_hash: false,
            markup: default_watch_markup(),
            styles: default_watch_styles(),
            scripts: default_watch_scripts(),
        }
    }
}
