// src/pipeline/styles.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use globset::Glob;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::Targets;
use parcel_sourcemap::SourceMap;
use tracing::debug;
use walkdir::WalkDir;

use crate::pipeline::context::{relative_str, BuildContext};

struct CompiledStyle {
    css: String,
    map: Option<String>,
}

/// Compile every stylesheet entry point.
///
/// Each entry runs through SCSS expansion, then browser-target lowering.
/// Production output is minified; development output keeps a source map
/// next to it and a `sourceMappingURL` trailer pointing at it.
///
/// Returns the number of files written (maps included).
pub fn process(ctx: &BuildContext) -> Result<usize> {
    let entries = find_entries(ctx)?;
    let out_dir = ctx.paths.output_root.join(&ctx.config.styles.out_dir);
    let mut written = 0usize;

    if !entries.is_empty() {
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("creating directory {:?}", out_dir))?;
    }

    for entry in entries {
        let stem = entry
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| anyhow!("stylesheet entry {:?} has no usable file name", entry))?;
        let css_name = format!("{stem}.css");

        let compiled = compile_entry(ctx, &entry, &css_name)?;

        let css_path = out_dir.join(&css_name);
        fs::write(&css_path, compiled.css)
            .with_context(|| format!("writing {:?}", css_path))?;
        written += 1;

        if let Some(map) = compiled.map {
            let map_path = out_dir.join(format!("{css_name}.map"));
            fs::write(&map_path, map).with_context(|| format!("writing {:?}", map_path))?;
            written += 1;
        }
        debug!(entry = ?entry, "compiled stylesheet");
    }

    Ok(written)
}

/// Entry points matched by `[styles].entries`, excluding `_`-prefixed
/// partials, in stable order.
fn find_entries(ctx: &BuildContext) -> Result<Vec<PathBuf>> {
    let matcher = Glob::new(&ctx.config.styles.entries)
        .context("invalid styles entry pattern")?
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
        if !matcher.is_match(&rel) {
            continue;
        }
        let is_partial = entry.file_name().to_string_lossy().starts_with('_');
        if is_partial {
            continue;
        }
        entries.push(entry.path().to_path_buf());
    }

    entries.sort();
    Ok(entries)
}

fn compile_entry(ctx: &BuildContext, entry: &Path, css_name: &str) -> Result<CompiledStyle> {
    let display = relative_str(&ctx.paths.source_root, entry)
        .unwrap_or_else(|| entry.to_string_lossy().into_owned());

    let grass_options = grass::Options::default().load_path(&ctx.paths.source_root);
    let expanded = grass::from_path(entry, &grass_options)
        .map_err(|e| anyhow!("compiling {}: {}", display, e))?;

    let targets = Targets {
        browsers: ctx.browsers,
        ..Targets::default()
    };
    let minify_output = !ctx.mode.is_development();

    let mut source_map = if ctx.mode.is_development() {
        let mut map = SourceMap::new("/");
        let source_index = map.add_source(&display);
        map.set_source_content(source_index as usize, &expanded)
            .map_err(|e| anyhow!("recording source content for {}: {}", display, e))?;
        Some(map)
    } else {
        None
    };

    let result = {
        let mut stylesheet = StyleSheet::parse(
            &expanded,
            ParserOptions {
                filename: display.clone(),
                ..ParserOptions::default()
            },
        )
        .map_err(|e| anyhow!("parsing {}: {}", display, e))?;

        stylesheet
            .minify(MinifyOptions {
                targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| anyhow!("transforming {}: {}", display, e))?;

        stylesheet
            .to_css(PrinterOptions {
                minify: minify_output,
                source_map: source_map.as_mut(),
                targets,
                ..PrinterOptions::default()
            })
            .map_err(|e| anyhow!("printing {}: {}", display, e))?
    };

    let mut css = result.code;
    let map = match source_map {
        Some(mut map) => {
            let json = map
                .to_json(None)
                .map_err(|e| anyhow!("serializing source map for {}: {}", display, e))?;
            css.push_str(&format!("\n/*# sourceMappingURL={css_name}.map */"));
            Some(json)
        }
        None => None,
    };

    Ok(CompiledStyle { css, map })
}
