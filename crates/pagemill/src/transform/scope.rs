// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Style isolation for markup fragments.
//!
//! Content wrapped in `<isolate>...</isolate>` gets a unique boolean
//! attribute (`data-s-<token>`) on every element, and the selectors of its
//! `<style>` blocks are narrowed to that attribute:
//!
//! ```html
//! <isolate class="card"><style>p { color: red }</style><p>Hi</p></isolate>
//! ```
//!
//! becomes
//!
//! ```html
//! <div data-s-lx2k9a0b7cd3e class="card"><style data-s-lx2k9a0b7cd3e>p[data-s-lx2k9a0b7cd3e] { color: red }</style><p data-s-lx2k9a0b7cd3e>Hi</p></div>
//! ```
//!
//! Nested fragments are handled innermost first, one level per pass. Elements
//! already carrying a scope attribute keep it, so an inner fragment is not
//! affected by the styles of the one around it.

use crate::error::{PagemillError, Result};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix of every scope attribute.
pub const SCOPE_ATTRIBUTE_PREFIX: &str = "data-s-";

/// Default number of nesting levels processed.
pub const DEFAULT_SCOPE_DEPTH: usize = 10;

const MARKER_OPEN: &str = "<isolate";
const MARKER_CLOSE: &str = "</isolate>";
const TOKEN_SUFFIX_LEN: usize = 8;
const TOKEN_ALPHABET: [char; 36] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l',
    'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

lazy_static! {
    static ref MASKED: Regex =
        Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>|<style\b[^>]*>.*?</style\s*>|<!--.*?-->").unwrap();
    static ref STYLE_BLOCK: Regex = Regex::new(r"(?is)<style\b([^>]*)>(.*?)</style\s*>").unwrap();
    static ref OPEN_TAG: Regex = Regex::new(r"<([A-Za-z][A-Za-z0-9:-]*)([^<>]*)>").unwrap();
    static ref MASK_PLACEHOLDER: Regex = Regex::new(r"__PM_MASK_(\d+)__").unwrap();
    static ref CSS_COMMENT: Regex = Regex::new(r"(?s)/\*.*?\*/").unwrap();
    static ref COMMENT_PLACEHOLDER: Regex = Regex::new(r"__PM_COMMENT_(\d+)__").unwrap();
    static ref LEADING_COMMENTS: Regex = Regex::new(r"^(\s*(?:__PM_COMMENT_\d+__\s*)*)").unwrap();
    static ref SCOPE_SELECTOR: Regex = Regex::new(r"\[data-s-[A-Za-z0-9_-]+\]").unwrap();
    static ref KEYFRAME_SELECTOR: Regex = Regex::new(r"(?i)^(from|to|\d+(\.\d+)?%)$").unwrap();
}

/// Rewrites `<isolate>` fragments into scoped markup.
#[derive(Debug, Clone, Copy)]
pub struct ScopeRewriter {
    max_depth: usize,
}

impl Default for ScopeRewriter {
    fn default() -> Self {
        Self::new(DEFAULT_SCOPE_DEPTH)
    }
}

impl ScopeRewriter {
    /// Creates a rewriter handling at most `max_depth` nesting levels.
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Nesting limit.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Scopes every fragment in `text`.
    ///
    /// Text without fragment markers is returned as-is. On failure a warning
    /// is logged and `text` is returned unchanged.
    pub fn rewrite(&self, text: &str) -> String {
        if !text.contains(MARKER_OPEN) || !text.contains(MARKER_CLOSE) {
            return text.to_string();
        }
        match self.try_rewrite(text) {
            Ok(rewritten) => rewritten,
            Err(e) => {
                tracing::warn!("Scope isolation skipped: {}", e);
                text.to_string()
            }
        }
    }

    /// Scopes every fragment, failing on unbalanced markers or stylesheets.
    pub fn try_rewrite(&self, text: &str) -> Result<String> {
        let mut current = text.to_string();
        for _ in 0..self.max_depth {
            let markers = find_markers(&current);
            if markers.is_empty() {
                return Ok(current);
            }
            let fragments = innermost_fragments(&markers)?;
            current = rewrite_level(&current, &fragments)?;
        }

        if !find_markers(&current).is_empty() {
            tracing::warn!(
                "Isolated fragments nested deeper than {} level(s) were left unscoped",
                self.max_depth
            );
        }
        Ok(current)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Marker {
    /// Start of the opening tag and index just past its `>`.
    Open(usize, usize),
    /// Start and end of the closing tag.
    Close(usize, usize),
}

fn find_markers(text: &str) -> Vec<Marker> {
    let mut markers = Vec::new();
    let mut offset = 0;
    while offset < text.len() {
        let next_open = text[offset..].find(MARKER_OPEN).map(|p| p + offset);
        let next_close = text[offset..].find(MARKER_CLOSE).map(|p| p + offset);
        match (next_open, next_close) {
            (Some(open), close) if close.map_or(true, |c| open < c) => {
                let after = text[open + MARKER_OPEN.len()..].chars().next();
                let is_tag = matches!(after, Some(c) if c.is_whitespace() || c == '>');
                match text[open..].find('>') {
                    Some(end) if is_tag => {
                        markers.push(Marker::Open(open, open + end + 1));
                        offset = open + end + 1;
                    }
                    _ => offset = open + MARKER_OPEN.len(),
                }
            }
            (_, Some(close)) => {
                markers.push(Marker::Close(close, close + MARKER_CLOSE.len()));
                offset = close + MARKER_CLOSE.len();
            }
            _ => break,
        }
    }
    markers
}

/// An isolate element: opening tag span and closing tag span.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Fragment {
    open: (usize, usize),
    close: (usize, usize),
}

/// Pairs each opening marker directly followed by a closing marker.
fn innermost_fragments(markers: &[Marker]) -> Result<Vec<Fragment>> {
    let mut depth: i64 = 0;
    for marker in markers {
        depth += match marker {
            Marker::Open(..) => 1,
            Marker::Close(..) => -1,
        };
        if depth < 0 {
            return Err(PagemillError::Transform("</isolate> without a matching <isolate>".to_string()));
        }
    }
    if depth != 0 {
        return Err(PagemillError::Transform("unclosed <isolate> fragment".to_string()));
    }

    Ok(markers
        .windows(2)
        .filter_map(|pair| match (pair[0], pair[1]) {
            (Marker::Open(os, oe), Marker::Close(cs, ce)) => Some(Fragment {
                open: (os, oe),
                close: (cs, ce),
            }),
            _ => None,
        })
        .collect())
}

fn rewrite_level(text: &str, fragments: &[Fragment]) -> Result<String> {
    let mut out = String::with_capacity(text.len() + fragments.len() * 32);
    let mut last = 0;
    for fragment in fragments {
        out.push_str(&text[last..fragment.open.0]);

        let open_tag = &text[fragment.open.0..fragment.open.1];
        let attributes = open_tag[MARKER_OPEN.len()..open_tag.len() - 1].trim_end_matches('/');
        let body = &text[fragment.open.1..fragment.close.0];
        let attribute = generate_scope_attribute();

        out.push_str(&format!("<div {}{}>", attribute, attributes));
        out.push_str(&scope_body(body, &attribute)?);
        out.push_str("</div>");
        last = fragment.close.1;
    }
    out.push_str(&text[last..]);
    Ok(out)
}

/// Generates a fresh `data-s-<base36 millis><random>` attribute name.
fn generate_scope_attribute() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!(
        "{}{}{}",
        SCOPE_ATTRIBUTE_PREFIX,
        to_base36(millis),
        nanoid::nanoid!(TOKEN_SUFFIX_LEN, &TOKEN_ALPHABET)
    )
}

fn to_base36(mut n: u128) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(TOKEN_ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    digits.iter().rev().collect()
}

fn scope_body(body: &str, attribute: &str) -> Result<String> {
    // styles first, so the rewritten blocks are what gets masked
    let mut style_error = None;
    let styled = STYLE_BLOCK.replace_all(body, |caps: &Captures| {
        if caps[1].contains(SCOPE_ATTRIBUTE_PREFIX) {
            return caps[0].to_string();
        }
        match scope_css(&caps[2], attribute) {
            Ok(css) => format!("<style {}{}>{}</style>", attribute, &caps[1], css),
            Err(e) => {
                style_error.get_or_insert(e);
                caps[0].to_string()
            }
        }
    });
    if let Some(e) = style_error {
        return Err(e);
    }

    let mut masked = Vec::new();
    let hidden = MASKED.replace_all(&styled, |caps: &Captures| {
        masked.push(caps[0].to_string());
        format!("__PM_MASK_{}__", masked.len() - 1)
    });

    let tagged = OPEN_TAG.replace_all(&hidden, |caps: &Captures| {
        let name = caps[1].to_ascii_lowercase();
        let attributes = &caps[2];
        if matches!(name.as_str(), "script" | "style" | "isolate") || attributes.contains(SCOPE_ATTRIBUTE_PREFIX) {
            caps[0].to_string()
        } else {
            format!("<{} {}{}>", &caps[1], attribute, attributes)
        }
    });

    Ok(MASK_PLACEHOLDER
        .replace_all(&tagged, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| masked.get(i).cloned())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned())
}

/// Narrows every selector of a stylesheet to elements carrying `attribute`.
pub fn scope_css(css: &str, attribute: &str) -> Result<String> {
    let mut comments = Vec::new();
    let without_comments = CSS_COMMENT.replace_all(css, |caps: &Captures| {
        comments.push(caps[0].to_string());
        format!("__PM_COMMENT_{}__", comments.len() - 1)
    });
    if without_comments.contains("/*") {
        return Err(PagemillError::Transform("unterminated CSS comment".to_string()));
    }

    let scoped = scope_rules(&without_comments, &format!("[{}]", attribute))?;

    Ok(COMMENT_PLACEHOLDER
        .replace_all(&scoped, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| comments.get(i).cloned())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned())
}

fn scope_rules(css: &str, selector: &str) -> Result<String> {
    let mut out = String::with_capacity(css.len() + 64);
    let mut rest = css;

    loop {
        let Some(stop) = find_top_level(rest, &['{', ';', '}']) else {
            out.push_str(rest);
            return Ok(out);
        };

        match rest.as_bytes()[stop] {
            b'}' => return Err(PagemillError::Transform("unbalanced '}' in stylesheet".to_string())),
            b';' => {
                // at-rule statement such as @import
                out.push_str(&rest[..=stop]);
                rest = &rest[stop + 1..];
            }
            _ => {
                let close = matching_brace(rest, stop)
                    .ok_or_else(|| PagemillError::Transform("unbalanced '{' in stylesheet".to_string()))?;
                let prelude = &rest[..stop];
                let block = &rest[stop + 1..close];

                let leading = LEADING_COMMENTS
                    .captures(prelude)
                    .and_then(|c| c.get(1))
                    .map_or(0, |m| m.end());
                out.push_str(&prelude[..leading]);
                let prelude = &prelude[leading..];

                if let Some(at_rule) = prelude.strip_prefix('@') {
                    let name = at_rule
                        .split(|c: char| c.is_whitespace() || c == '(')
                        .next()
                        .unwrap_or("")
                        .to_ascii_lowercase();
                    out.push_str(prelude);
                    out.push('{');
                    if name == "media" || name == "supports" {
                        out.push_str(&scope_rules(block, selector)?);
                    } else {
                        out.push_str(block);
                    }
                    out.push('}');
                } else {
                    let trailing = &prelude[prelude.trim_end().len()..];
                    out.push_str(&scope_selector_list(prelude.trim_end(), selector));
                    out.push_str(trailing);
                    out.push('{');
                    out.push_str(block);
                    out.push('}');
                }
                rest = &rest[close + 1..];
            }
        }
    }
}

/// Index of the first of `stops` outside strings, parentheses and brackets.
fn find_top_level(text: &str, stops: &[char]) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            c if depth == 0 && stops.contains(&c) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Index of the `}` closing the `{` at `open`.
fn matching_brace(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = None;
    let mut escaped = false;
    for (i, c) in text[open..].char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

fn scope_selector_list(prelude: &str, selector: &str) -> String {
    split_top_level(prelude, ',')
        .iter()
        .map(|part| scope_selector(part.trim(), selector))
        .collect::<Vec<_>>()
        .join(", ")
}

fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(pos) = find_top_level(rest, &[separator]) {
        parts.push(&rest[..pos]);
        rest = &rest[pos + separator.len_utf8()..];
    }
    parts.push(rest);
    parts
}

/// Adds `scope` to the first compound of one selector, before its pseudo part.
fn scope_selector(selector: &str, scope: &str) -> String {
    if selector.is_empty() || KEYFRAME_SELECTOR.is_match(selector) {
        return selector.to_string();
    }
    let selector = SCOPE_SELECTOR.replace_all(selector, "");
    let selector = selector.trim();

    let mut depth = 0usize;
    let mut insert_at = selector.len();
    for (i, c) in selector.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ':' | ' ' | '>' | '+' | '~' | '\t' | '\n' if depth == 0 => {
                insert_at = i;
                break;
            }
            _ => {}
        }
    }

    format!("{}{}{}", &selector[..insert_at], scope, &selector[insert_at..])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attribute_of(html: &str) -> String {
        let start = html.find(SCOPE_ATTRIBUTE_PREFIX).unwrap();
        let end = html[start..]
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap();
        html[start..start + end].to_string()
    }

    #[test]
    fn test_fast_path_without_markers() {
        let html = "<div><p>no fragments</p></div>";
        assert_eq!(ScopeRewriter::default().rewrite(html), html);
        assert_eq!(ScopeRewriter::default().rewrite("<isolate>only open"), "<isolate>only open");
    }

    #[test]
    fn test_single_fragment() {
        let html = "<h1>Out</h1><isolate class=\"card\"><style>p { color: red }</style><p>Hi</p><br/></isolate>";
        let out = ScopeRewriter::default().rewrite(html);
        let attr = attribute_of(&out);

        assert!(attr.len() > SCOPE_ATTRIBUTE_PREFIX.len() + TOKEN_SUFFIX_LEN);
        assert_eq!(
            out,
            format!(
                "<h1>Out</h1><div {a} class=\"card\"><style {a}>p[{a}] {{ color: red }}</style><p {a}>Hi</p><br {a}/></div>",
                a = attr
            )
        );
    }

    #[test]
    fn test_scripts_and_comments_are_untouched() {
        let html = "<isolate><script>var s = '<b>';</script><!-- <i> --><b>x</b></isolate>";
        let out = ScopeRewriter::default().rewrite(html);
        let attr = attribute_of(&out);
        assert!(out.contains("<script>var s = '<b>';</script><!-- <i> -->"));
        assert!(out.contains(&format!("<b {}>x</b>", attr)));
    }

    #[test]
    fn test_nested_fragments_keep_inner_scope() {
        let html = "<isolate><p>outer</p><isolate><p>inner</p></isolate></isolate>";
        let out = ScopeRewriter::default().rewrite(html);

        assert!(!out.contains("isolate"));
        let outer = attribute_of(&out);
        let inner_start = out.find("<div").map(|p| p + 4).unwrap();
        let inner = attribute_of(&out[out[inner_start..].find("<div").unwrap() + inner_start..]);
        assert_ne!(outer, inner);
        assert!(out.contains(&format!("<p {}>outer</p>", outer)));
        assert!(out.contains(&format!("<p {}>inner</p>", inner)));
        assert!(!out.contains(&format!("<p {} {}", outer, inner)));
    }

    #[test]
    fn test_idempotent_on_own_output() {
        let rewriter = ScopeRewriter::default();
        let once = rewriter.rewrite("<isolate><style>a:hover{x:y}</style><a>l</a></isolate>");
        assert_eq!(rewriter.rewrite(&once), once);
    }

    #[test]
    fn test_depth_limit_leaves_outer_markers() {
        let html = "<isolate><isolate><isolate><b>x</b></isolate></isolate></isolate>";
        let out = ScopeRewriter::new(2).rewrite(html);
        assert_eq!(out.matches("<isolate").count(), 1);
        assert_eq!(out.matches("</isolate>").count(), 1);
    }

    #[test]
    fn test_unbalanced_markers_return_original() {
        let html = "<isolate><b>x</b></isolate></isolate>";
        assert_eq!(ScopeRewriter::default().rewrite(html), html);
    }

    #[test]
    fn test_unbalanced_css_returns_original() {
        let html = "<isolate><style>p { color: red </style><p>x</p></isolate>";
        assert_eq!(ScopeRewriter::default().rewrite(html), html);
    }

    #[test]
    fn test_scope_css_selectors() {
        let css = "a, .b > c:hover::after, input[type=\"text\"]:focus { x: y }";
        assert_eq!(
            scope_css(css, "data-s-t").unwrap(),
            "a[data-s-t], .b[data-s-t] > c:hover::after, input[type=\"text\"][data-s-t]:focus { x: y }"
        );
    }

    #[test]
    fn test_scope_css_at_rules_and_comments() {
        let css = "/* top */ @import url(x.css);\n@media (max-width: 600px) { .a { b: c } }\n@keyframes spin { from { t: 0 } to { t: 1 } }\n@font-face { font-family: F }";
        let out = scope_css(css, "data-s-t").unwrap();
        assert!(out.starts_with("/* top */ @import url(x.css);"));
        assert!(out.contains("@media (max-width: 600px) { .a[data-s-t] { b: c } }"));
        assert!(out.contains("@keyframes spin { from { t: 0 } to { t: 1 } }"));
        assert!(out.contains("@font-face { font-family: F }"));
    }

    #[test]
    fn test_existing_scope_selector_is_replaced() {
        assert_eq!(scope_selector(".a[data-s-old] .b", "[data-s-new]"), ".a[data-s-new] .b");
        assert_eq!(scope_selector("50%", "[data-s-new]"), "50%");
        assert_eq!(scope_selector(":root", "[data-s-new]"), "[data-s-new]:root");
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
