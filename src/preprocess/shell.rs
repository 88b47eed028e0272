use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Reason};
use crate::lineinfo::LineMap;

use super::scan::is_inside_string_literal;

const KEYWORDS: &[&str] = &[
    "def", "test", "bench", "if", "elsif", "else", "while", "for", "in", "try", "or", "spawn",
    "parallel", "end", "return", "break", "next", "use", "require", "import", "sandbox",
    "struct", "case", "when", "nil", "true", "false", "not", "and",
];

const BUILTIN_FUNCS: &[&str] = &["puts", "print", "raise", "len", "range"];

const BLOCK_OPENERS: &[&str] = &[
    "def", "test", "bench", "if", "while", "for", "try", "spawn", "parallel",
];
const FUNC_BLOCK_OPENERS: &[&str] = &["def", "test", "bench"];

static FIRST_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?P<indent>\s*)(?P<tok>[A-Za-z_][A-Za-z0-9_]*)").unwrap());
static DEF_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*def\s+(?:[A-Za-z_][A-Za-z0-9_]*\.)?(?P<name>[A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Prescans the whole (post-sugar) source for every `def`/`def NS.name`, used
/// as the `allFuncs` set available to paren-free rewriting inside function
/// bodies — forward references within bodies are always fine, only top-level
/// statement order matters (see `topLevelFuncs` in [`rewrite_paren_free`]).
fn collect_all_func_names(source: &str) -> HashSet<String> {
    source
        .split('\n')
        .filter_map(|line| DEF_NAME.captures(line).map(|c| c["name"].to_string()))
        .collect()
}

fn first_opening_keyword(tok: &str) -> Option<&'static str> {
    BLOCK_OPENERS.iter().find(|&&k| k == tok).copied()
}

/// Line-by-line, block-aware paren-free/shell-fallback rewrite. A line whose
/// first token is a plain identifier not followed by `(`, `=`, `.`, `[`, or
/// an operator is rewritten as a call (`t(rest)`) when `t` is a known
/// function, else wrapped as `__shell__("...")`.
pub fn rewrite_paren_free(source: &str) -> anyhow::Result<(String, Option<LineMap>)> {
    let all_funcs = collect_all_func_names(source);
    let mut top_level_funcs: HashSet<String> = HashSet::new();
    let mut block_stack: Vec<&'static str> = Vec::new();
    let mut func_depth = 0usize;

    let mut out = String::with_capacity(source.len());
    for (i, line) in source.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }

        let trimmed_end = line.trim_end();
        let trimmed = trimmed_end.trim_start();

        if trimmed == "end" {
            if let Some(popped) = block_stack.pop() {
                if FUNC_BLOCK_OPENERS.contains(&popped) {
                    func_depth = func_depth.saturating_sub(1);
                }
            }
            out.push_str(trimmed_end);
            continue;
        }

        if let Some(caps) = DEF_NAME.captures(line) {
            if func_depth == 0 {
                top_level_funcs.insert(caps["name"].to_string());
            }
        }

        if let Some(tok_caps) = FIRST_TOKEN.captures(line) {
            let tok = &tok_caps["tok"];
            if let Some(kw) = first_opening_keyword(tok) {
                block_stack.push(kw);
                if FUNC_BLOCK_OPENERS.contains(&kw) {
                    func_depth += 1;
                }
                out.push_str(trimmed_end);
                continue;
            }
        }

        match rewrite_shell_candidate(line, &all_funcs, &top_level_funcs, func_depth > 0)? {
            Some(rewritten) => out.push_str(&rewritten),
            None => out.push_str(trimmed_end),
        }
    }

    Ok((out, None))
}

fn rewrite_shell_candidate(
    line: &str,
    all_funcs: &HashSet<String>,
    top_level_funcs: &HashSet<String>,
    inside_func_body: bool,
) -> anyhow::Result<Option<String>> {
    let indent_len = line.len() - line.trim_start().len();
    let indent = &line[..indent_len];
    let rest_of_line = line.trim_start();

    let Some(caps) = FIRST_TOKEN.captures(line) else {
        return Ok(None);
    };
    let tok = caps["tok"].to_string();

    if KEYWORDS.contains(&tok.as_str()) {
        if tok == "or" {
            return Err(Error::new(Reason::Simple(
                "orphan `or` outside a try block — did you mean `try …`?".to_string(),
            ))
            .into());
        }
        return Ok(None);
    }

    let after_tok = &rest_of_line[tok.len()..];
    let next_non_space = after_tok.trim_start().chars().next();
    if matches!(next_non_space, Some('(') | Some('=') | Some('.') | Some('[')) {
        return Ok(None);
    }
    if let Some(c) = next_non_space {
        if "+-*/%<>!&|,".contains(c) {
            return Ok(None);
        }
    }

    let known = all_funcs.contains(&tok)
        || BUILTIN_FUNCS.contains(&tok.as_str())
        || (!inside_func_body && top_level_funcs.contains(&tok));

    let rest_trimmed = after_tok.trim();

    if known {
        if rest_trimmed.is_empty() {
            return Ok(Some(format!("{indent}{tok}()")));
        }
        return Ok(Some(format!("{indent}{tok}({rest_trimmed})")));
    }

    if contains_bare_or(line) {
        return Err(Error::new(Reason::Simple(
            "orphan `or` outside a try block — did you mean `try …`?".to_string(),
        ))
        .into());
    }

    let shell_line = line.trim();
    let escaped = shell_line.replace('\\', "\\\\").replace('"', "\\\"");
    Ok(Some(format!("{indent}__shell__(\"{escaped}\")")))
}

static BARE_OR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bor\b").unwrap());

fn contains_bare_or(line: &str) -> bool {
    BARE_OR
        .find_iter(line)
        .any(|m| !is_inside_string_literal(line, m.start()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_function_gets_parens() {
        let (out, _) = rewrite_paren_free("def greet(name)\n  puts name\nend\n").unwrap();
        assert_eq!(out, "def greet(name)\n  puts(name)\nend\n");
    }

    #[test]
    fn user_function_forward_ref_inside_body() {
        let src = "def a()\n  b\nend\ndef b()\n  1\nend\n";
        let (out, _) = rewrite_paren_free(src).unwrap();
        assert!(out.contains("b()"));
    }

    #[test]
    fn unknown_top_level_line_becomes_shell() {
        let (out, _) = rewrite_paren_free("timeout 30 ping host\n").unwrap();
        assert_eq!(out, "__shell__(\"timeout 30 ping host\")\n");
    }

    #[test]
    fn lines_with_assignment_are_untouched() {
        let (out, _) = rewrite_paren_free("x = 1\n").unwrap();
        assert_eq!(out, "x = 1\n");
    }

    #[test]
    fn orphan_or_is_an_error() {
        assert!(rewrite_paren_free("timeout 30 ping host or \"x\"\n").is_err());
    }
}
