// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Macro expansion over rendered markup.
//!
//! Two constructs are recognized:
//!
//! - `^^key^^` is replaced by `data[key]`. Strings are inserted as-is,
//!   numbers and booleans stringified, objects and arrays written as JSON
//!   with `"` escaped to `&quot;` so they fit in an attribute. Unknown keys
//!   stay in place.
//! - `<tag:for key="items" start="0" end="2" index_floor="1">...</tag:for>`
//!   repeats its body for each element of `data[key].slice(start, end)`.
//!   Inside the body, `^^field^^` refers to the element's fields and
//!   `^^index^^` to the slice position plus `index_floor`.
//!
//! Blocks are expanded first (left to right, no nesting), then keys are
//! substituted over the whole text.

use crate::error::{PagemillError, Result};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::{Map, Value};

const FOR_OPEN: &str = "<tag:for";
const FOR_CLOSE: &str = "</tag:for>";

lazy_static! {
    static ref KEY: Regex = Regex::new(r"\^\^([A-Za-z0-9_.-]+)\^\^").unwrap();
    static ref ATTRIBUTE: Regex =
        Regex::new(r#"([A-Za-z_][A-Za-z0-9_-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
}

/// Expands macros in `text` using `data`.
///
/// On failure a warning is logged and `text` is returned unchanged.
pub fn expand_macros(text: &str, data: &Value) -> String {
    if !text.contains("^^") && !text.contains(FOR_OPEN) {
        return text.to_string();
    }
    match try_expand(text, data) {
        Ok(expanded) => expanded,
        Err(e) => {
            tracing::warn!("Macro expansion skipped: {}", e);
            text.to_string()
        }
    }
}

/// Expands macros, failing on malformed blocks.
pub fn try_expand(text: &str, data: &Value) -> Result<String> {
    let empty = Map::new();
    let fields = data.as_object().unwrap_or(&empty);
    let expanded = expand_blocks(text, fields)?;
    Ok(substitute(&expanded, fields))
}

fn expand_blocks(text: &str, data: &Map<String, Value>) -> Result<String> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = find_block_open(rest) {
        out.push_str(&rest[..open]);
        let after_open = &rest[open..];
        let tag_end = after_open
            .find('>')
            .ok_or_else(|| PagemillError::Transform("unterminated <tag:for> opening tag".to_string()))?;
        let attributes = &after_open[FOR_OPEN.len()..tag_end];
        let body_and_rest = &after_open[tag_end + 1..];
        let close = body_and_rest
            .find(FOR_CLOSE)
            .ok_or_else(|| PagemillError::Transform("unclosed <tag:for> block".to_string()))?;
        let body = &body_and_rest[..close];

        out.push_str(&expand_block(attributes, body, data)?);
        rest = &body_and_rest[close + FOR_CLOSE.len()..];
    }

    out.push_str(rest);
    Ok(out)
}

/// Start of the next `<tag:for` that is a whole tag name.
fn find_block_open(text: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(FOR_OPEN) {
        let start = offset + pos;
        let next = text[start + FOR_OPEN.len()..].chars().next();
        if matches!(next, Some(c) if c.is_whitespace() || c == '>' || c == '/') {
            return Some(start);
        }
        offset = start + FOR_OPEN.len();
    }
    None
}

fn expand_block(attributes: &str, body: &str, data: &Map<String, Value>) -> Result<String> {
    let mut key = None;
    let mut start = None;
    let mut end = None;
    let mut index_floor = 0i64;

    for caps in ATTRIBUTE.captures_iter(attributes) {
        let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        match &caps[1] {
            "key" => key = Some(value.to_string()),
            "start" => start = Some(parse_int("start", value)?),
            "end" => end = Some(parse_int("end", value)?),
            "index_floor" => index_floor = parse_int("index_floor", value)?,
            _ => {}
        }
    }

    let key = key.ok_or_else(|| PagemillError::Transform("<tag:for> has no key attribute".to_string()))?;
    let items = match data.get(&key) {
        Some(Value::Array(items)) => items,
        Some(_) => return Err(PagemillError::Transform(format!("'{}' is not an array", key))),
        None => return Err(PagemillError::Transform(format!("no data for key '{}'", key))),
    };

    let (from, to) = slice_bounds(items.len(), start, end);
    let mut out = String::new();
    for (offset, item) in items[from..to].iter().enumerate() {
        let mut fields = match item {
            Value::Object(map) => map.clone(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other.clone());
                map
            }
        };
        let index = index_floor
            .checked_add(offset as i64)
            .ok_or_else(|| PagemillError::Transform(format!("index_floor=\"{}\" overflows the loop index", index_floor)))?;
        fields.insert("index".to_string(), Value::from(index));
        out.push_str(&substitute(body, &fields));
    }
    Ok(out)
}

fn parse_int(name: &str, value: &str) -> Result<i64> {
    value
        .trim()
        .parse()
        .map_err(|_| PagemillError::Transform(format!("{}=\"{}\" is not an integer", name, value)))
}

/// Array `slice(start, end)` bounds: negatives count from the end, everything
/// is clamped to `0..=len`, and an inverted range is empty.
fn slice_bounds(len: usize, start: Option<i64>, end: Option<i64>) -> (usize, usize) {
    let len_i = len as i64;
    let clamp = |n: i64| -> usize {
        let n = if n < 0 { len_i + n } else { n };
        n.clamp(0, len_i) as usize
    };
    let from = start.map_or(0, clamp);
    let to = end.map_or(len, clamp);
    if from >= to {
        (from.min(len), from.min(len))
    } else {
        (from, to)
    }
}

fn substitute(text: &str, fields: &Map<String, Value>) -> String {
    KEY.replace_all(text, |caps: &Captures| match fields.get(&caps[1]) {
        Some(value) => format_value(value),
        None => caps[0].to_string(),
    })
    .into_owned()
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string().replace('"', "&quot;"),
    }
}
