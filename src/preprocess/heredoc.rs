use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Reason};
use crate::lineinfo::LineMap;

static OPENER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<<(~)?(?:'([A-Za-z_][A-Za-z0-9_]*)'|([A-Za-z_][A-Za-z0-9_]*))").unwrap());

/// Collapses every `<<TAG` / `<<~TAG` / `<<'TAG'` heredoc block into a single
/// quoted-string token on the opener line, recording the collapse in the
/// returned line map. Squiggly heredocs (`<<~TAG`) strip the common leading
/// indentation from content lines before joining them. `<<'TAG'` heredocs
/// expand to a single-quoted (raw, non-interpolating) literal; all others
/// expand to a double-quoted literal so embedded `#{...}` still interpolates.
pub fn expand_heredocs(source: &str) -> anyhow::Result<(String, Option<LineMap>)> {
    let lines: Vec<&str> = source.split('\n').collect();
    let mut out_lines: Vec<String> = Vec::new();
    let mut original_of: Vec<usize> = Vec::new();

    let mut i = 0usize;
    let mut changed = false;
    while i < lines.len() {
        let line = lines[i];
        if let Some(caps) = OPENER.captures(line) {
            let squiggly = caps.get(1).is_some();
            let (raw, tag) = match (caps.get(2), caps.get(3)) {
                (Some(m), _) => (true, m.as_str().to_string()),
                (None, Some(m)) => (false, m.as_str().to_string()),
                _ => unreachable!(),
            };
            let whole = caps.get(0).unwrap();

            let mut j = i + 1;
            let mut content_lines: Vec<&str> = Vec::new();
            let terminator = loop {
                if j >= lines.len() {
                    return Err(Error::new(Reason::Simple(format!(
                        "unterminated heredoc <<{tag}"
                    )))
                    .into());
                }
                if lines[j].trim() == tag {
                    break j;
                }
                content_lines.push(lines[j]);
                j += 1;
            };

            if squiggly {
                let min_indent = content_lines
                    .iter()
                    .filter(|l| !l.trim().is_empty())
                    .map(|l| l.len() - l.trim_start().len())
                    .min()
                    .unwrap_or(0);
                content_lines = content_lines
                    .iter()
                    .map(|l| {
                        let strip = min_indent.min(l.len() - l.trim_start().len());
                        &l[strip..]
                    })
                    .collect::<Vec<_>>();
            }

            let body = content_lines.join("\n");
            let literal = if raw {
                format!("'{}'", body.replace('\\', "\\\\").replace('\'', "\\'"))
            } else {
                let escaped = body
                    .replace('\\', "\\\\")
                    .replace('"', "\\\"")
                    .replace('\n', "\\n");
                format!("\"{escaped}\"")
            };

            let mut new_line = String::new();
            new_line.push_str(&line[..whole.start()]);
            new_line.push_str(&literal);
            new_line.push_str(&line[whole.end()..]);

            out_lines.push(new_line);
            original_of.push(i + 1);
            changed = true;

            i = terminator + 1;
        } else {
            out_lines.push(line.to_string());
            original_of.push(i + 1);
            i += 1;
        }
    }

    if !changed {
        return Ok((source.to_string(), None));
    }

    Ok((out_lines.join("\n"), Some(LineMap::from_rows(original_of))))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn collapses_plain_heredoc_to_one_line() {
        let src = "x = <<TXT\nhello\nworld\nTXT\ny = 2\n";
        let (out, map) = expand_heredocs(src).unwrap();
        assert_eq!(out, "x = \"hello\\nworld\"\ny = 2\n");
        let map = map.unwrap();
        assert_eq!(map.translate(1), 1);
        assert_eq!(map.translate(2), 5);
    }

    #[test]
    fn squiggly_strips_common_indent() {
        let src = "x = <<~TXT\n  a\n    b\nTXT\n";
        let (out, _) = expand_heredocs(src).unwrap();
        assert_eq!(out, "x = \"a\\n  b\"\n");
    }

    #[test]
    fn raw_heredoc_is_single_quoted() {
        let src = "x = <<'TXT'\nno #{interp} here\nTXT\n";
        let (out, _) = expand_heredocs(src).unwrap();
        assert_eq!(out, "x = 'no #{interp} here'\n");
    }

    #[test]
    fn unterminated_heredoc_is_an_error() {
        let src = "x = <<TXT\nhello\n";
        assert!(expand_heredocs(src).is_err());
    }
}
