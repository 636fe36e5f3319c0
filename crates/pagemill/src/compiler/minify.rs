// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Whitespace and comment stripping for generated Lua.
//!
//! Not a full Lua lexer: it only knows enough to tell strings, long brackets
//! and comments apart from code. Indentation, trailing whitespace, blank
//! lines and comments are removed; line breaks between statements are kept.

use crate::error::{PagemillError, Result};

/// Minifies Lua source. `name` is used in error messages.
pub fn minify_lua(source: &str, name: &str) -> Result<String> {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut pending_space = false;
    let mut pending_newline = false;
    let mut line = 1;
    let mut i = 0;

    let unterminated = |what: &str, line: usize| {
        PagemillError::compile(name, format!("unterminated {} starting on line {}", what, line))
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                pending_newline = true;
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => {
                pending_space = true;
                i += 1;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let start_line = line;
                i += 2;
                if let Some(level) = long_bracket_level(&chars, i) {
                    let end = find_long_bracket_end(&chars, i, level)
                        .ok_or_else(|| unterminated("long comment", start_line))?;
                    line += chars[i..end].iter().filter(|&&c| c == '\n').count();
                    i = end;
                    pending_space = true;
                } else {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                }
            }
            '"' | '\'' => {
                let start_line = line;
                let start = i;
                i += 1;
                loop {
                    match chars.get(i) {
                        None | Some('\n') => return Err(unterminated("string", start_line)),
                        Some('\\') => {
                            if chars.get(i + 1) == Some(&'\n') {
                                line += 1;
                            }
                            i += 2;
                        }
                        Some(&q) if q == c => {
                            i += 1;
                            break;
                        }
                        Some(_) => i += 1,
                    }
                }
                emit(&mut out, &mut pending_space, &mut pending_newline, &chars[start..i]);
            }
            '[' if long_bracket_level(&chars, i).is_some() => {
                let start_line = line;
                let level = long_bracket_level(&chars, i).unwrap_or(0);
                let end = find_long_bracket_end(&chars, i, level)
                    .ok_or_else(|| unterminated("long string", start_line))?;
                line += chars[i..end].iter().filter(|&&c| c == '\n').count();
                emit(&mut out, &mut pending_space, &mut pending_newline, &chars[i..end]);
                i = end;
            }
            _ => {
                emit(&mut out, &mut pending_space, &mut pending_newline, &chars[i..i + 1]);
                i += 1;
            }
        }
    }

    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

fn emit(out: &mut String, pending_space: &mut bool, pending_newline: &mut bool, text: &[char]) {
    if !out.is_empty() {
        if *pending_newline {
            out.push('\n');
        } else if *pending_space {
            out.push(' ');
        }
    }
    *pending_space = false;
    *pending_newline = false;
    out.extend(text.iter());
}

/// Level of a long bracket opening at `start` (`[[` is 0, `[==[` is 2).
fn long_bracket_level(chars: &[char], start: usize) -> Option<usize> {
    if chars.get(start) != Some(&'[') {
        return None;
    }
    let mut level = 0;
    while chars.get(start + 1 + level) == Some(&'=') {
        level += 1;
    }
    if chars.get(start + 1 + level) == Some(&'[') {
        Some(level)
    } else {
        None
    }
}

/// Index just past the long bracket close matching `level`.
fn find_long_bracket_end(chars: &[char], start: usize, level: usize) -> Option<usize> {
    let mut i = start + level + 2;
    while i < chars.len() {
        if chars[i] == ']' {
            let mut j = i + 1;
            let mut equals = 0;
            while chars.get(j) == Some(&'=') {
                equals += 1;
                j += 1;
            }
            if equals == level && chars.get(j) == Some(&']') {
                return Some(j + 1);
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_comments_and_indentation() {
        let source = "-- header\nlocal a = 1  -- trailing\n\n\n    if a then\n        return a\n    end\n";
        assert_eq!(
            minify_lua(source, "t").unwrap(),
            "local a = 1\nif a then\nreturn a\nend\n"
        );
    }

    #[test]
    fn test_preserves_strings() {
        let source = "local s = \"  -- not a comment  \"\nlocal t = 'it\\'s'\nlocal u = [==[\n  keep  ]] this\n]==]\n";
        assert_eq!(
            minify_lua(source, "t").unwrap(),
            "local s = \"  -- not a comment  \"\nlocal t = 'it\\'s'\nlocal u = [==[\n  keep  ]] this\n]==]\n"
        );
    }

    #[test]
    fn test_long_comment_becomes_space() {
        assert_eq!(minify_lua("a = 1 --[[ x\n y ]] b = 2", "t").unwrap(), "a = 1 b = 2\n");
    }

    #[test]
    fn test_unterminated_constructs() {
        assert!(minify_lua("local s = \"abc\nx", "t").is_err());
        assert!(minify_lua("local s = [[abc", "t").is_err());
        assert!(minify_lua("--[[ never closed", "t").is_err());
    }

    #[test]
    fn test_minified_code_still_runs() {
        let source = "local t = {}\n-- comment\nfor i = 1, 3 do\n  t[#t + 1] = i * 2 -- double\nend\nreturn table.concat(t, \",\")\n";
        let minified = minify_lua(source, "t").unwrap();
        let lua = mlua::Lua::new();
        let result: String = lua.load(&minified).eval().unwrap();
        assert_eq!(result, "2,4,6");
    }
}
