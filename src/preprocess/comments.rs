use crate::lineinfo::LineMap;

use super::scan::is_inside_string_literal;

/// Strips `#`-to-end-of-line comments outside string literals. Preserves the
/// line count exactly (Invariant 4): a stripped comment leaves an empty tail
/// on its line, never removes the newline.
pub fn strip_comments(source: &str) -> (String, Option<LineMap>) {
    let mut out = String::with_capacity(source.len());
    for (i, line) in source.split('\n').enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&strip_comment_from_line(line));
    }
    (out, None)
}

fn strip_comment_from_line(line: &str) -> String {
    match line.find('#') {
        None => line.to_string(),
        Some(mut idx) => {
            while is_inside_string_literal(line, idx) {
                match line[idx + 1..].find('#') {
                    Some(next) => idx += 1 + next,
                    None => return line.to_string(),
                }
            }
            line[..idx].trim_end().to_string()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn strips_trailing_comment() {
        let (out, map) = strip_comments("x = 1 # set x\ny = 2\n");
        assert_eq!(out, "x = 1\ny = 2\n");
        assert!(map.is_none());
    }

    #[test]
    fn preserves_line_count() {
        let input = "a\n# just a comment\nb\n";
        let (out, _) = strip_comments(input);
        assert_eq!(out.split('\n').count(), input.split('\n').count());
    }

    #[test]
    fn leaves_hash_inside_string_untouched() {
        let (out, _) = strip_comments(r#"x = "a # b""#);
        assert_eq!(out, r#"x = "a # b""#);
    }
}
