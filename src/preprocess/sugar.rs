use once_cell::sync::Lazy;
use regex::Regex;

use crate::lineinfo::LineMap;

static TRY_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<indent>\s*)try\s+(?P<tried>.+?)(?:\s+or\s+(?P<handler>.+))?$").unwrap());
static BARE_IDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// `try E` -> `try\n  E\nor _err\n  nil\nend`; `try E or D` -> `try\n  E\nor
/// _err\n  D\nend`, unless `D` is a bare identifier, in which case the line
/// is already hand-written block-form (`try E or errname`, body and `end`
/// following) and is left untouched.
pub fn expand_try_sugar(source: &str) -> (String, Option<LineMap>) {
    expand_single_line_blocks(source, |line| {
        let caps = TRY_LINE.captures(line)?;
        let indent = &caps["indent"];
        let tried = caps.name("tried")?.as_str();
        let handler = caps.name("handler").map(|m| m.as_str());

        if let Some(h) = handler {
            if BARE_IDENT.is_match(h.trim()) {
                return None;
            }
        }

        let fallback = handler.unwrap_or("nil");
        Some(vec![
            format!("{indent}try"),
            format!("{indent}  {tried}"),
            format!("{indent}or _err"),
            format!("{indent}  {fallback}"),
            format!("{indent}end"),
        ])
    })
}

static SPAWN_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<indent>\s*)(?:(?P<target>[A-Za-z_][A-Za-z0-9_]*)\s*=\s*)?spawn\s+(?P<body>.+)$").unwrap());

/// `spawn E` (or `x = spawn E`) -> `spawn\n  E\nend` (assignment target, if
/// any, stays on the opener line).
pub fn expand_spawn_sugar(source: &str) -> (String, Option<LineMap>) {
    expand_single_line_blocks(source, |line| {
        let caps = SPAWN_LINE.captures(line)?;
        let indent = &caps["indent"];
        let body = caps.name("body")?.as_str();
        let opener = match caps.name("target") {
            Some(t) => format!("{indent}{} = spawn", t.as_str()),
            None => format!("{indent}spawn"),
        };
        Some(vec![opener, format!("{indent}  {body}"), format!("{indent}end")])
    })
}

/// Shared driver for sugar passes that replace one source line with several,
/// recording the collapse so the line map still points every new line back
/// at the original single line it came from.
fn expand_single_line_blocks(
    source: &str,
    expand: impl Fn(&str) -> Option<Vec<String>>,
) -> (String, Option<LineMap>) {
    let mut out_lines: Vec<String> = Vec::new();
    let mut original_of: Vec<usize> = Vec::new();
    let mut changed = false;

    for (i, line) in source.split('\n').enumerate() {
        match expand(line) {
            Some(replacement) => {
                for r in replacement {
                    out_lines.push(r);
                    original_of.push(i + 1);
                }
                changed = true;
            }
            None => {
                out_lines.push(line.to_string());
                original_of.push(i + 1);
            }
        }
    }

    if !changed {
        return (source.to_string(), None);
    }
    (out_lines.join("\n"), Some(LineMap::from_rows(original_of)))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn try_without_handler_defaults_to_nil() {
        let (out, map) = expand_try_sugar("try risky()\n");
        assert_eq!(out, "try\n  risky()\nor _err\n  nil\nend\n");
        let map = map.unwrap();
        for line in 1..=5 {
            assert_eq!(map.translate(line), 1);
        }
    }

    #[test]
    fn try_with_expression_fallback_expands() {
        let (out, _) = expand_try_sugar("try risky() or \"fallback\"\n");
        assert_eq!(out, "try\n  risky()\nor _err\n  \"fallback\"\nend\n");
    }

    #[test]
    fn try_with_bare_ident_handler_left_alone() {
        let (out, map) = expand_try_sugar("try risky() or err\n");
        assert_eq!(out, "try risky() or err\n");
        assert!(map.is_none());
    }

    #[test]
    fn spawn_with_assignment_target() {
        let (out, _) = expand_spawn_sugar("t = spawn compute()\n");
        assert_eq!(out, "t = spawn\n  compute()\nend\n");
    }

    #[test]
    fn bare_spawn_expands() {
        let (out, _) = expand_spawn_sugar("spawn compute()\n");
        assert_eq!(out, "spawn\n  compute()\nend\n");
    }
}
