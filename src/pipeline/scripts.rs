// src/pipeline/scripts.rs

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{anyhow, bail, Context, Result};
use globset::Glob;
use parcel_sourcemap::{OriginalLocation, SourceMap};
use regex::Regex;
use tracing::debug;
use walkdir::WalkDir;

use crate::pipeline::context::{relative_str, BuildContext};
use crate::pipeline::jsmin;

/// One source file participating in a bundle, dependency-first.
struct Module {
    path: PathBuf,
    source: String,
}

/// Compiled patterns for the subset of ESM syntax the bundler rewrites.
struct ModuleSyntax {
    import_line: Regex,
    export_decl: Regex,
    export_list: Regex,
    export_default: Regex,
    export_from: Regex,
}

impl ModuleSyntax {
    fn new() -> Result<Self> {
        Ok(Self {
            import_line: Regex::new(
                r#"^\s*import\s+(?:[^'"]*?\bfrom\s+)?['"]([^'"]+)['"]\s*;?\s*$"#,
            )?,
            export_decl: Regex::new(
                r"^(\s*)export\s+((?:async\s+)?(?:function|class|const|let|var)\b.*)$",
            )?,
            export_list: Regex::new(r"^\s*export\s*\{[^}]*\}\s*;?\s*$")?,
            export_default: Regex::new(r"^\s*export\s+default\b")?,
            export_from: Regex::new(r#"^\s*export\s+.*\bfrom\s+['"]"#)?,
        })
    }

    /// Specifier of a single-line import statement, if this line is one.
    fn import_specifier<'a>(&self, line: &'a str) -> Option<&'a str> {
        self.import_line
            .captures(line)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }
}

/// Bundle every script entry point into the output tree.
///
/// Each entry's relative imports are inlined dependency-first into one
/// flat ES module. Production bundles are minified; development bundles
/// keep a line-level source map and, when the existing output is newer
/// than every input, are skipped entirely.
///
/// Returns the number of files written (maps included).
pub fn process(ctx: &BuildContext) -> Result<usize> {
    let entries = find_entries(ctx)?;
    let out_dir = ctx.paths.output_root.join(&ctx.config.scripts.out_dir);
    let syntax = ModuleSyntax::new()?;
    let mut written = 0usize;

    if !entries.is_empty() {
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating directory {:?}", out_dir))?;
        if !ctx.script_targets.is_empty() {
            debug!(targets = ?ctx.script_targets, "bundling for browser targets");
        }
    }

    for entry in entries {
        let name = entry
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("script entry {:?} has no usable file name", entry))?
            .to_string();
        let out_path = out_dir.join(&name);

        let modules = load_modules(&entry, &syntax)?;

        if ctx.mode.is_development() && is_up_to_date(&out_path, &modules) {
            debug!(entry = %name, "bundle up to date, skipping");
            continue;
        }

        written += write_bundle(ctx, &syntax, &modules, &out_path, &name)?;
    }

    Ok(written)
}

/// Entry points matched by `[scripts].entries`, in stable order.
fn find_entries(ctx: &BuildContext) -> Result<Vec<PathBuf>> {
    let matcher = Glob::new(&ctx.config.scripts.entries)
        .context("invalid scripts entry pattern")?
        .compile_matcher();
    let source_root = &ctx.paths.source_root;
    let mut entries = Vec::new();

    for entry in WalkDir::new(source_root) {
        let entry = entry.with_context(|| format!("walking {:?}", source_root))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = match relative_str(source_root, entry.path()) {
            Some(rel) => rel,
            None => continue,
        };
        if matcher.is_match(&rel) {
            entries.push(entry.path().to_path_buf());
        }
    }

    entries.sort();
    Ok(entries)
}

/// Resolve the module closure of `entry`: every transitively imported
/// relative module, dependency-first, each exactly once. The entry itself
/// is the final element.
fn load_modules(entry: &Path, syntax: &ModuleSyntax) -> Result<Vec<Module>> {
    let mut ordered = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = Vec::new();
    visit_module(entry, syntax, &mut ordered, &mut visited, &mut stack)?;
    Ok(ordered)
}

fn visit_module(
    path: &Path,
    syntax: &ModuleSyntax,
    ordered: &mut Vec<Module>,
    visited: &mut HashSet<PathBuf>,
    stack: &mut Vec<PathBuf>,
) -> Result<()> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("resolving module path {:?}", path))?;

    if visited.contains(&canonical) {
        return Ok(());
    }
    if stack.contains(&canonical) {
        let chain: Vec<String> = stack
            .iter()
            .chain(std::iter::once(&canonical))
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        bail!("import cycle detected: {}", chain.join(" -> "));
    }

    let source = fs::read_to_string(&canonical)
        .with_context(|| format!("reading module {:?}", canonical))?;

    stack.push(canonical.clone());
    for line in source.lines() {
        if let Some(spec) = syntax.import_specifier(line) {
            if is_relative_specifier(spec) {
                let resolved = resolve_import(&canonical, spec)?;
                visit_module(&resolved, syntax, ordered, visited, stack)?;
            }
        }
    }
    stack.pop();

    visited.insert(canonical.clone());
    ordered.push(Module {
        path: canonical,
        source,
    });
    Ok(())
}

fn is_relative_specifier(spec: &str) -> bool {
    spec.starts_with("./") || spec.starts_with("../")
}

/// Resolve a relative specifier against the importing file, trying an
/// implied `.js` extension before giving up.
fn resolve_import(importer: &Path, spec: &str) -> Result<PathBuf> {
    let base = importer.parent().unwrap_or_else(|| Path::new("."));
    let joined = base.join(spec);
    if joined.is_file() {
        return Ok(joined);
    }
    if joined.extension().is_none() {
        let with_ext = joined.with_extension("js");
        if with_ext.is_file() {
            return Ok(with_ext);
        }
    }
    bail!(
        "cannot resolve import '{}' from {:?}",
        spec,
        importer
    );
}

/// True when the existing bundle (and its map) is newer than every input.
fn is_up_to_date(out_path: &Path, modules: &[Module]) -> bool {
    let out_mtime = match fs::metadata(out_path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };
    let map_path = sibling_map_path(out_path);
    if fs::metadata(&map_path).is_err() {
        return false;
    }

    let newest_input = modules
        .iter()
        .filter_map(|m| fs::metadata(&m.path).and_then(|meta| meta.modified()).ok())
        .max()
        .unwrap_or(SystemTime::UNIX_EPOCH);

    out_mtime >= newest_input
}

fn sibling_map_path(out_path: &Path) -> PathBuf {
    let mut name = out_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.push_str(".map");
    out_path.with_file_name(name)
}

fn write_bundle(
    ctx: &BuildContext,
    syntax: &ModuleSyntax,
    modules: &[Module],
    out_path: &Path,
    name: &str,
) -> Result<usize> {
    let (code, map) = assemble(ctx, syntax, modules)?;
    let mut written = 0usize;

    if ctx.mode.is_development() {
        let mut code = code;
        code.push_str(&format!("//# sourceMappingURL={name}.map\n"));
        fs::write(out_path, code).with_context(|| format!("writing {:?}", out_path))?;
        written += 1;

        let map_json = map
            .context("development bundle produced no source map")?;
        let map_path = sibling_map_path(out_path);
        fs::write(&map_path, map_json)
            .with_context(|| format!("writing {:?}", map_path))?;
        written += 1;
    } else {
        fs::write(out_path, jsmin::minify_js(&code))
            .with_context(|| format!("writing {:?}", out_path))?;
        written += 1;
    }

    debug!(bundle = %name, modules = modules.len(), "wrote bundle");
    Ok(written)
}

/// Concatenate modules into one flat ES module.
///
/// Relative import lines vanish (their targets are inlined above), bare
/// imports stay, and `export` prefixes are stripped from inlined
/// declarations. The entry module, last in the slice, keeps its exports.
/// In development a line-level source map is built alongside.
fn assemble(
    ctx: &BuildContext,
    syntax: &ModuleSyntax,
    modules: &[Module],
) -> Result<(String, Option<String>)> {
    let mut code = String::new();
    let mut map = if ctx.mode.is_development() {
        Some(SourceMap::new("/"))
    } else {
        None
    };
    let mut generated_line: u32 = 0;
    let last = modules.len().saturating_sub(1);

    for (index, module) in modules.iter().enumerate() {
        let is_entry = index == last;
        let display = relative_str(&ctx.paths.source_root, &module.path)
            .unwrap_or_else(|| module.path.to_string_lossy().into_owned());

        let source_index = match map.as_mut() {
            Some(map) => {
                let idx = map.add_source(&display);
                map.set_source_content(idx as usize, &module.source)
                    .map_err(|e| anyhow!("recording source content for {}: {}", display, e))?;
                Some(idx)
            }
            None => None,
        };

        for (line_number, line) in module.source.lines().enumerate() {
            let emitted = rewrite_line(syntax, line, is_entry)
                .with_context(|| format!("bundling {}", display))?;
            let text = match emitted {
                Some(text) => text,
                None => continue,
            };

            if let (Some(map), Some(source_index)) = (map.as_mut(), source_index) {
                map.add_mapping(
                    generated_line,
                    0,
                    Some(OriginalLocation {
                        original_line: line_number as u32,
                        original_column: 0,
                        source: source_index,
                        name: None,
                    }),
                );
            }
            code.push_str(&text);
            code.push('\n');
            generated_line += 1;
        }
    }

    let map_json = match map {
        Some(mut map) => Some(
            map.to_json(None)
                .map_err(|e| anyhow!("serializing bundle source map: {}", e))?,
        ),
        None => None,
    };

    Ok((code, map_json))
}

/// Rewrite one line for inclusion in the bundle. `None` drops the line.
fn rewrite_line(syntax: &ModuleSyntax, line: &str, is_entry: bool) -> Result<Option<String>> {
    if let Some(spec) = syntax.import_specifier(line) {
        if is_relative_specifier(spec) {
            // Inlined above; the statement disappears.
            return Ok(None);
        }
        // Bare specifier: leave it for the browser.
        return Ok(Some(line.to_string()));
    }

    if is_entry {
        return Ok(Some(line.to_string()));
    }

    if syntax.export_default.is_match(line) {
        bail!("default exports are not supported in inlined modules: {}", line.trim());
    }
    if syntax.export_from.is_match(line) {
        bail!("re-exports are not supported in inlined modules: {}", line.trim());
    }
    if let Some(caps) = syntax.export_decl.captures(line) {
        return Ok(Some(format!("{}{}", &caps[1], &caps[2])));
    }
    if syntax.export_list.is_match(line) {
        return Ok(None);
    }

    Ok(Some(line.to_string()))
}
