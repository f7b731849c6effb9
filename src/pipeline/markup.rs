// src/pipeline/markup.rs

use std::fs;

use anyhow::{Context, Result};
use globset::Glob;
use tracing::debug;
use walkdir::WalkDir;

use crate::pipeline::context::{relative_str, BuildContext};

/// Elements whose text content must pass through untouched.
const RAW_TEXT_ELEMENTS: [&str; 4] = ["pre", "textarea", "script", "style"];

/// Compile markup files from the source tree into the output tree.
///
/// In development the file is copied byte for byte. In production the
/// whitespace between tags is collapsed; markup is otherwise left alone.
///
/// Returns the number of files written.
pub fn process(ctx: &BuildContext) -> Result<usize> {
    let matcher = Glob::new(&ctx.config.markup.pattern)
        .context("invalid markup pattern")?
        .compile_matcher();
    let source_root = &ctx.paths.source_root;
    let mut written = 0usize;

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

        let dest = ctx.paths.output_root.join(&rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {:?}", parent))?;
        }

        if ctx.mode.is_development() {
            fs::copy(entry.path(), &dest)
                .with_context(|| format!("copying {} to {:?}", rel, dest))?;
        } else {
            let source = fs::read_to_string(entry.path())
                .with_context(|| format!("reading {}", rel))?;
            fs::write(&dest, collapse_whitespace(&source))
                .with_context(|| format!("writing {:?}", dest))?;
        }
        debug!(file = %rel, "compiled markup");
        written += 1;
    }

    Ok(written)
}

/// Collapse insignificant whitespace in an HTML document.
///
/// Rules:
/// - whitespace-only text between two tags is removed
/// - other whitespace runs in text collapse to a single space
/// - tags, comments and quoted attribute values pass through unchanged
/// - content of `<pre>`, `<textarea>`, `<script>` and `<style>` is preserved
///
/// The transformation is conservative: it never trims a space that sits
/// between a word and an inline element.
pub fn collapse_whitespace(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut pending_space = false;
    let mut i = 0;

    while i < html.len() {
        let rest = &html[i..];

        if rest.starts_with("<!--") {
            flush_pending(&mut out, &mut pending_space, true);
            let end = rest.find("-->").map(|p| p + 3).unwrap_or(rest.len());
            out.push_str(&rest[..end]);
            i += end;
            continue;
        }

        if rest.starts_with('<') {
            flush_pending(&mut out, &mut pending_space, true);
            let tag_len = tag_length(rest);
            let tag = &rest[..tag_len];
            out.push_str(tag);
            i += tag_len;

            if let Some(name) = raw_text_element_name(tag) {
                let body = &html[i..];
                let end = find_close_tag(body, name).unwrap_or(body.len());
                out.push_str(&body[..end]);
                i += end;
            }
            continue;
        }

        // Text content.
        match rest.chars().next() {
            Some(ch) if ch.is_whitespace() => {
                pending_space = true;
                i += ch.len_utf8();
            }
            Some(ch) => {
                flush_pending(&mut out, &mut pending_space, false);
                out.push(ch);
                i += ch.len_utf8();
            }
            None => break,
        }
    }

    out
}

/// Resolve a buffered whitespace run: drop it when it separates two tags
/// (or leads the document), emit one space otherwise.
fn flush_pending(out: &mut String, pending: &mut bool, next_is_tag: bool) {
    if !*pending {
        return;
    }
    *pending = false;

    let after_tag = out.is_empty() || out.ends_with('>');
    if !(after_tag && next_is_tag) {
        out.push(' ');
    }
}

/// Byte length of a tag starting at `<`, honoring quoted attribute values.
/// An unterminated tag extends to the end of input.
fn tag_length(rest: &str) -> usize {
    let mut quote: Option<char> = None;
    for (idx, ch) in rest.char_indices() {
        match quote {
            Some(q) => {
                if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '"' | '\'' => quote = Some(ch),
                '>' => return idx + 1,
                _ => {}
            },
        }
    }
    rest.len()
}

/// Tag name when `tag` opens a raw text element like `<pre class="x">`.
fn raw_text_element_name(tag: &str) -> Option<&'static str> {
    let after = tag.strip_prefix('<')?;
    if after.starts_with('/') || tag.ends_with("/>") {
        return None;
    }
    let name_len = after
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(after.len());
    let name = &after[..name_len];
    RAW_TEXT_ELEMENTS
        .iter()
        .find(|known| known.eq_ignore_ascii_case(name))
        .copied()
}

/// Byte offset of the matching `</name` close tag, case-insensitive.
fn find_close_tag(haystack: &str, name: &str) -> Option<usize> {
    let needle = format!("</{name}");
    let nb = needle.as_bytes();
    let hb = haystack.as_bytes();
    if hb.len() < nb.len() {
        return None;
    }
    // `<` is never a continuation byte, so any hit is a char boundary.
    (0..=hb.len() - nb.len()).find(|&i| hb[i..i + nb.len()].eq_ignore_ascii_case(nb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::ConfigFile;
    use crate::pipeline::context::BuildMode;

    #[test]
    fn drops_whitespace_between_tags() {
        let html = "<ul>\n  <li>a</li>\n  <li>b</li>\n</ul>\n";
        assert_eq!(collapse_whitespace(html), "<ul><li>a</li><li>b</li></ul>");
    }

    #[test]
    fn collapses_text_runs_to_one_space() {
        let html = "<p>hello   brave\n\tworld</p>";
        assert_eq!(collapse_whitespace(html), "<p>hello brave world</p>");
    }

    #[test]
    fn keeps_space_next_to_inline_elements() {
        let html = "<p>read <a href=\"/more\">more</a> here</p>";
        assert_eq!(
            collapse_whitespace(html),
            "<p>read <a href=\"/more\">more</a> here</p>"
        );
    }

    #[test]
    fn preserves_pre_content() {
        let html = "<div>\n  <pre>  two\n    spaces</pre>\n</div>";
        assert_eq!(
            collapse_whitespace(html),
            "<div><pre>  two\n    spaces</pre></div>"
        );
    }

    #[test]
    fn preserves_script_and_style_content() {
        let html = "<script>\n  const a = 1;\n</script>\n<style>\n  body { }\n</style>";
        assert_eq!(
            collapse_whitespace(html),
            "<script>\n  const a = 1;\n</script><style>\n  body { }\n</style>"
        );
    }

    #[test]
    fn preserves_quoted_attribute_values() {
        let html = "<div data-x=\"a  >  b\">  </div>";
        assert_eq!(collapse_whitespace(html), "<div data-x=\"a  >  b\"></div>");
    }

    #[test]
    fn preserves_comments() {
        let html = "<div>\n<!-- keep   me -->\n</div>";
        assert_eq!(collapse_whitespace(html), "<div><!-- keep   me --></div>");
    }

    #[test]
    fn uppercase_raw_text_close_tags_are_found() {
        let html = "<PRE>a  b</PRE> <p>x</p>";
        assert_eq!(collapse_whitespace(html), "<PRE>a  b</PRE><p>x</p>");
    }

    fn write_source(dir: &std::path::Path, rel: &str, contents: &str) {
        let path = dir.join("source").join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn development_output_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let html = "<main>\n  <p>spaced   out</p>\n</main>\n";
        write_source(dir.path(), "index.html", html);
        write_source(dir.path(), "pages/about.html", html);

        let ctx = BuildContext::new(ConfigFile::default(), BuildMode::Development, dir.path())
            .unwrap();
        assert_eq!(process(&ctx).unwrap(), 2);
        let out = fs::read_to_string(dir.path().join("build/index.html")).unwrap();
        assert_eq!(out, html);
        assert!(dir.path().join("build/pages/about.html").exists());
    }

    #[test]
    fn production_output_is_collapsed() {
        let dir = tempfile::tempdir().unwrap();
        write_source(dir.path(), "index.html", "<main>\n  <p>a   b</p>\n</main>\n");

        let ctx = BuildContext::new(ConfigFile::default(), BuildMode::Production, dir.path())
            .unwrap();
        assert_eq!(process(&ctx).unwrap(), 1);
        let out = fs::read_to_string(dir.path().join("build/index.html")).unwrap();
        assert_eq!(out, "<main><p>a b</p></main>");
    }
}
