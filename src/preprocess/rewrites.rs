use once_cell::sync::Lazy;
use regex::Regex;

use crate::lineinfo::LineMap;

use super::scan::is_inside_string_literal;

static COMPOUND_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?x)
        ^(?P<indent>\s*)
        (?P<target>[A-Za-z_][A-Za-z0-9_]*(?:\[[^\]\n]*\]|\.[A-Za-z_][A-Za-z0-9_]*)?)
        \s*(?P<op>[-+*/%])=\s*
        (?P<rest>.+)$
    ")
    .unwrap()
});

/// `x OP= e` -> `x = x OP e` for `OP ∈ {+,-,*,/,%}`. Anchored at line start so
/// a string containing the literal `"OP="` elsewhere on the line is never
/// mistaken for an assignment target; indentation is preserved verbatim.
pub fn expand_compound_assign(source: &str) -> (String, Option<LineMap>) {
    rewrite_lines(source, |line| {
        COMPOUND_ASSIGN.captures(line).map(|caps| {
            format!(
                "{}{} = {} {} {}",
                &caps["indent"], &caps["target"], &caps["target"], &caps["op"], &caps["rest"]
            )
        })
    })
}

/// `` `cmd` `` -> `__capture__("cmd")`, outside string literals.
pub fn expand_backtick_capture(source: &str) -> (String, Option<LineMap>) {
    rewrite_lines(source, |line| {
        if !line.contains('`') {
            return None;
        }
        let mut out = String::with_capacity(line.len());
        let mut changed = false;
        let bytes = line.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let c = bytes[i] as char;
            if c == '`' && !is_inside_string_literal(line, i) {
                if let Some(end) = line[i + 1..].find('`') {
                    let cmd = &line[i + 1..i + 1 + end];
                    let escaped = cmd.replace('\\', "\\\\").replace('"', "\\\"");
                    out.push_str(&format!("__capture__(\"{escaped}\")"));
                    changed = true;
                    i += end + 2;
                    continue;
                }
            }
            out.push(c);
            i += 1;
        }
        changed.then_some(out)
    })
}

static HASH_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*):(?!:)").unwrap());

/// `{foo: 1}` -> `{"foo" => 1}`, outside string literals.
pub fn expand_hash_colon_syntax(source: &str) -> (String, Option<LineMap>) {
    rewrite_lines(source, |line| {
        if !HASH_KEY.is_match(line) {
            return None;
        }
        let mut changed = false;
        let out = HASH_KEY.replace_all(line, |caps: &regex::Captures| {
            let whole = caps.get(0).unwrap();
            if is_inside_string_literal(line, whole.start()) {
                whole.as_str().to_string()
            } else {
                changed = true;
                format!("{}\"{}\"{} =>", &caps[1], &caps[2], &caps[3])
            }
        });
        changed.then(|| out.into_owned())
    })
}

static TEST_MODULE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btest\.").unwrap());

/// `test.` -> `__tmod__.`, outside string literals — resolves the `test`
/// keyword/module-name collision.
pub fn rewrite_test_module(source: &str) -> (String, Option<LineMap>) {
    rewrite_lines(source, |line| {
        if !TEST_MODULE.is_match(line) {
            return None;
        }
        let mut changed = false;
        let out = TEST_MODULE.replace_all(line, |caps: &regex::Captures| {
            let whole = caps.get(0).unwrap();
            if is_inside_string_literal(line, whole.start()) {
                whole.as_str().to_string()
            } else {
                changed = true;
                "__tmod__.".to_string()
            }
        });
        changed.then(|| out.into_owned())
    })
}

/// Applies `f` to each line independently; `f` returns `Some(new_line)` only
/// when it changed something. None of these passes reshuffle line counts, so
/// the returned line map is always `None` (identity).
fn rewrite_lines(source: &str, f: impl Fn(&str) -> Option<String>) -> (String, Option<LineMap>) {
    let mut out = String::with_capacity(source.len());
    for (i, line) in source.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        match f(line) {
            Some(rewritten) => out.push_str(&rewritten),
            None => out.push_str(line),
        }
    }
    (out, None)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compound_assign_expands_plain_target() {
        let (out, _) = expand_compound_assign("  x += 1\n");
        assert_eq!(out, "  x = x + 1\n");
    }

    #[test]
    fn compound_assign_supports_index_and_dot_targets() {
        let (out, _) = expand_compound_assign("a[i] += e\no.f -= g\n");
        assert_eq!(out, "a[i] = a[i] + e\no.f = o.f - g\n");
    }

    #[test]
    fn compound_assign_leaves_string_literal_alone() {
        let (out, _) = expand_compound_assign(r#"msg = "contains += literally""#);
        assert_eq!(out, r#"msg = "contains += literally""#);
    }

    #[test]
    fn backtick_capture_rewrites_outside_strings() {
        let (out, _) = expand_backtick_capture("x = `ls -la`\n");
        assert_eq!(out, "x = __capture__(\"ls -la\")\n");
    }

    #[test]
    fn hash_colon_rewrites_keys() {
        let (out, _) = expand_hash_colon_syntax("h = {foo: 1, bar: 2}\n");
        assert_eq!(out, "h = {\"foo\" => 1, \"bar\" => 2}\n");
    }

    #[test]
    fn test_module_rewritten_outside_strings() {
        let (out, _) = rewrite_test_module("test.run()\nputs(\"test.run\")\n");
        assert_eq!(out, "__tmod__.run()\nputs(\"test.run\")\n");
    }
}
