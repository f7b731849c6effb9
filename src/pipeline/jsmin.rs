// src/pipeline/jsmin.rs

//! Conservative JavaScript minification for bundled scripts.
//!
//! Two passes: strip `/* */` and `//` comments, then collapse horizontal
//! whitespace. Newlines survive both passes, so code relying on automatic
//! semicolon insertion keeps its statement boundaries. String and template
//! literals pass through untouched. When in doubt a construct is emitted
//! unchanged; the output is deterministic for a given input.

/// Parsing state for the comment-stripping pass.
enum State {
    Normal,
    InString(char),
    InStringEscape(char),
    AfterSlash,
    InBlockComment,
    InBlockCommentEnd,
    InLineComment,
}

/// Minify a JavaScript source string.
pub fn minify_js(input: &str) -> String {
    collapse_whitespace(&strip_comments(input))
}

/// Remove block and line comments, leaving string literals and line
/// structure intact.
fn strip_comments(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut state = State::Normal;

    for ch in input.chars() {
        match state {
            State::Normal => match ch {
                '"' | '\'' | '`' => {
                    output.push(ch);
                    state = State::InString(ch);
                }
                '/' => {
                    output.push(ch);
                    state = State::AfterSlash;
                }
                _ => output.push(ch),
            },
            State::AfterSlash => match ch {
                '*' => {
                    output.pop();
                    state = State::InBlockComment;
                }
                '/' => {
                    output.pop();
                    state = State::InLineComment;
                }
                _ => {
                    // Not a comment opener. Keep the char so division and
                    // regex literals stay intact.
                    output.push(ch);
                    state = match ch {
                        '"' | '\'' | '`' => State::InString(ch),
                        _ => State::Normal,
                    };
                }
            },
            State::InString(quote) => {
                output.push(ch);
                if ch == '\\' {
                    state = State::InStringEscape(quote);
                } else if ch == quote {
                    state = State::Normal;
                }
            }
            State::InStringEscape(quote) => {
                output.push(ch);
                state = State::InString(quote);
            }
            State::InBlockComment => {
                if ch == '*' {
                    state = State::InBlockCommentEnd;
                }
            }
            State::InBlockCommentEnd => {
                if ch == '/' {
                    state = State::Normal;
                } else if ch != '*' {
                    state = State::InBlockComment;
                }
            }
            State::InLineComment => {
                if ch == '\n' || ch == '\r' {
                    output.push(ch);
                    state = State::Normal;
                }
            }
        }
    }

    output
}

/// Collapse runs of spaces and tabs, dropping them around punctuation.
/// A run containing a newline collapses to a single newline instead, and
/// blank lines disappear.
fn collapse_whitespace(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut string_char = ' ';
    let mut prev_char = '\0';
    let mut pending: Option<char> = None;

    for ch in input.chars() {
        if in_string {
            out.push(ch);
            if ch == string_char && prev_char != '\\' {
                in_string = false;
            }
            prev_char = if ch == '\\' && prev_char == '\\' {
                '\0'
            } else {
                ch
            };
            continue;
        }

        if ch.is_whitespace() {
            pending = match pending {
                Some('\n') => Some('\n'),
                _ if ch == '\n' || ch == '\r' => Some('\n'),
                _ => Some(' '),
            };
            continue;
        }

        if let Some(space) = pending.take() {
            if space == '\n' {
                if !out.is_empty() {
                    out.push('\n');
                }
            } else {
                maybe_push_space(&mut out, ch);
            }
        }

        if ch == '"' || ch == '\'' || ch == '`' {
            in_string = true;
            string_char = ch;
        }
        out.push(ch);
        prev_char = ch;
    }

    out
}

fn is_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'
}

fn maybe_push_space(out: &mut String, next_char: char) {
    let prev_char = match out.chars().last() {
        Some(c) => c,
        None => return,
    };
    if prev_char == '\n' {
        return;
    }

    let no_space_after: &[char] = &[
        '(', '[', '{', ',', ';', ':', '=', '+', '-', '*', '/', '%', '&', '|', '^', '!', '~', '<',
        '>', '?', '.',
    ];
    let no_space_before: &[char] = &[
        ')', ']', '}', ',', ';', ':', '=', '+', '-', '*', '/', '%', '&', '|', '^', '!', '~', '<',
        '>', '?', '.', '(',
    ];

    // Keep `a + ++b` from merging into `a+++b`.
    if (prev_char == '+' && next_char == '+') || (prev_char == '-' && next_char == '-') {
        out.push(' ');
        return;
    }

    if no_space_after.contains(&prev_char) || no_space_before.contains(&next_char) {
        return;
    }

    if is_word_char(prev_char) && is_word_char(next_char) {
        out.push(' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_block_and_line_comments() {
        let out = minify_js("/* header */\nconst a = 1; // trailing\nconst b = 2;\n");
        assert!(!out.contains("header"));
        assert!(!out.contains("trailing"));
        assert!(out.contains("const a=1;"));
        assert!(out.contains("const b=2;"));
    }

    #[test]
    fn preserves_comment_lookalikes_in_strings() {
        let out = minify_js("const url = \"https://example.com\";\nconst t = `// keep`;\n");
        assert!(out.contains("https://example.com"));
        assert!(out.contains("// keep"));
    }

    #[test]
    fn collapses_punctuation_spacing() {
        assert_eq!(
            minify_js("function foo ( x ) { return x + 1 ; }"),
            "function foo(x){return x+1;}"
        );
    }

    #[test]
    fn keeps_newlines_for_asi() {
        let out = minify_js("const a = 1\nconst b = 2\n");
        assert_eq!(out, "const a=1\nconst b=2");
    }

    #[test]
    fn drops_blank_lines_and_indentation() {
        let out = minify_js("if (x) {\n\n    y()\n}\n");
        assert_eq!(out, "if(x){\ny()\n}");
    }

    #[test]
    fn keeps_space_between_keywords() {
        let out = minify_js("return new Date()");
        assert_eq!(out, "return new Date()");
    }

    #[test]
    fn avoids_increment_merges() {
        assert_eq!(minify_js("a + ++b"), "a+ ++b");
    }

    #[test]
    fn division_and_regex_survive() {
        let out = minify_js("const r = x / y;\nconst ok = /ab/.test(\"z\");\n");
        assert!(out.contains("x/y"));
        assert!(out.contains("/ab/.test(\"z\")"));
    }

    #[test]
    fn deterministic() {
        let src = "const a = 1;  // c\nfunction f ( ) { return a ; }\n";
        assert_eq!(minify_js(src), minify_js(src));
    }
}
