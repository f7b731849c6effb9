// src/pipeline/lint.rs

use std::collections::HashSet;
use std::fs;

use anyhow::{Context, Result};
use globset::Glob;
use regex::Regex;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::pipeline::context::{relative_str, BuildContext};

/// One BEM naming problem found in a markup file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintViolation {
    pub line: usize,
    pub class: String,
    pub message: String,
}

/// Check class names in every markup file against BEM naming rules.
///
/// Violations are reported through the log and never fail the task; the
/// tool advises, it does not gate. Returns the number of violations found.
pub fn run(ctx: &BuildContext) -> Result<usize> {
    let matcher = Glob::new(&ctx.config.markup.pattern)
        .context("invalid markup pattern")?
        .compile_matcher();
    let source_root = &ctx.paths.source_root;
    let mut total = 0usize;
    let mut files = 0usize;

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

        let source =
            fs::read_to_string(entry.path()).with_context(|| format!("reading {}", rel))?;
        files += 1;

        for violation in lint_markup(&source)? {
            warn!(
                file = %rel,
                line = violation.line,
                class = %violation.class,
                "{}",
                violation.message
            );
            total += 1;
        }
    }

    if total == 0 {
        info!(files, "no BEM violations found");
    } else {
        info!(files, violations = total, "BEM check finished");
    }

    Ok(total)
}

/// Lint a single markup document.
///
/// Three rules:
/// - a class may contain at most one `__` element separator
/// - a `--` modifier requires its base block/element on the same element
/// - names are lowercase kebab-case throughout
pub fn lint_markup(source: &str) -> Result<Vec<LintViolation>> {
    let class_attr = Regex::new(r#"class\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?;
    let mut violations = Vec::new();

    for caps in class_attr.captures_iter(source) {
        let attr = match caps.get(1).or_else(|| caps.get(2)) {
            Some(m) => m,
            None => continue,
        };
        let line = source[..attr.start()].matches('\n').count() + 1;
        let classes: HashSet<&str> = attr.as_str().split_whitespace().collect();

        for class in attr.as_str().split_whitespace() {
            check_class(class, &classes, line, &mut violations);
        }
    }

    Ok(violations)
}

fn check_class(
    class: &str,
    siblings: &HashSet<&str>,
    line: usize,
    violations: &mut Vec<LintViolation>,
) {
    if class.matches("__").count() > 1 {
        violations.push(LintViolation {
            line,
            class: class.to_string(),
            message: "element of an element is not allowed".to_string(),
        });
        return;
    }

    if let Some(pos) = class.find("--") {
        let base = &class[..pos];
        if base.is_empty() {
            violations.push(LintViolation {
                line,
                class: class.to_string(),
                message: "modifier has no base name".to_string(),
            });
            return;
        }
        if !siblings.contains(base) {
            violations.push(LintViolation {
                line,
                class: class.to_string(),
                message: format!("modifier used without its base class '{base}'"),
            });
            return;
        }
    }

    if !is_kebab_case(class) {
        violations.push(LintViolation {
            line,
            class: class.to_string(),
            message: "class name is not lowercase kebab-case".to_string(),
        });
    }
}

/// Lowercase kebab-case with optional `__element` and `--modifier` parts.
fn is_kebab_case(class: &str) -> bool {
    fn valid_part(part: &str) -> bool {
        !part.is_empty()
            && part
                .split('-')
                .all(|seg| !seg.is_empty() && seg.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()))
    }

    let rest = match class.split_once("--") {
        Some((rest, modifier)) => {
            if !valid_part(modifier) {
                return false;
            }
            rest
        }
        None => class,
    };

    match rest.split_once("__") {
        Some((block, element)) => valid_part(block) && valid_part(element),
        None => valid_part(rest),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(source: &str) -> Vec<String> {
        lint_markup(source)
            .unwrap()
            .into_iter()
            .map(|v| v.message)
            .collect()
    }

    #[test]
    fn clean_bem_passes() {
        let html = r#"<nav class="site-nav">
  <a class="site-nav__link site-nav__link--active" href="/">home</a>
</nav>"#;
        assert!(lint_markup(html).unwrap().is_empty());
    }

    #[test]
    fn flags_element_of_element() {
        let html = r#"<span class="card__header__title">x</span>"#;
        let found = lint_markup(html).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].class, "card__header__title");
        assert!(found[0].message.contains("element of an element"));
    }

    #[test]
    fn flags_modifier_without_base() {
        let html = r#"<button class="button--primary">ok</button>"#;
        let found = lint_markup(html).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found[0].message.contains("without its base class 'button'"));
    }

    #[test]
    fn modifier_with_base_is_fine() {
        let html = r#"<button class="button button--primary">ok</button>"#;
        assert!(lint_markup(html).unwrap().is_empty());
    }

    #[test]
    fn flags_non_kebab_names() {
        let html = r#"<div class="SiteNav snake_case ok-name"></div>"#;
        let found = messages(html);
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|m| m.contains("kebab-case")));
    }

    #[test]
    fn reports_line_numbers() {
        let html = "<div>\n<p>\n<span class=\"a__b__c\">x</span>\n</p>\n</div>\n";
        let found = lint_markup(html).unwrap();
        assert_eq!(found[0].line, 3);
    }

    #[test]
    fn single_quoted_attributes_are_scanned() {
        let html = "<div class='Bad'></div>";
        assert_eq!(lint_markup(html).unwrap().len(), 1);
    }

    #[test]
    fn kebab_case_rules() {
        assert!(is_kebab_case("site-nav"));
        assert!(is_kebab_case("site-nav__link"));
        assert!(is_kebab_case("site-nav__link--active"));
        assert!(is_kebab_case("grid2"));
        assert!(!is_kebab_case("SiteNav"));
        assert!(!is_kebab_case("snake_case"));
        assert!(!is_kebab_case("-leading"));
        assert!(!is_kebab_case("double--"));
    }
}
