//! Surface-syntax rewrites (L2): a pipeline of textual passes, each
//! idempotent w.r.t. already-transformed input, producing parser-ready text
//! plus the composed line map back to the original file.

mod comments;
mod heredoc;
mod rewrites;
mod scan;
mod shell;
mod sugar;

use crate::lineinfo::LineMap;

pub use comments::strip_comments;
pub use heredoc::expand_heredocs;
pub use rewrites::{
    expand_backtick_capture, expand_compound_assign, expand_hash_colon_syntax, rewrite_test_module,
};
pub use shell::rewrite_paren_free;
pub use sugar::{expand_spawn_sugar, expand_try_sugar};

/// Runs every preprocessor pass in spec order and returns the parser-ready
/// text plus the final line map (preprocessed line -> original 1-based
/// line). Passes that don't reshuffle lines compose as identity.
pub fn preprocess(source: &str) -> anyhow::Result<(String, LineMap)> {
    let base_lines = source.split('\n').count();
    let mut text = source.to_string();
    let mut pass_maps: Vec<Option<LineMap>> = Vec::new();

    let (t, m) = strip_comments(&text);
    text = t;
    pass_maps.push(m);

    let (t, m) = expand_heredocs(&text)?;
    text = t;
    pass_maps.push(m);

    let (t, m) = expand_compound_assign(&text);
    text = t;
    pass_maps.push(m);

    let (t, m) = expand_backtick_capture(&text);
    text = t;
    pass_maps.push(m);

    let (t, m) = expand_try_sugar(&text);
    text = t;
    pass_maps.push(m);

    let (t, m) = expand_spawn_sugar(&text);
    text = t;
    pass_maps.push(m);

    let (t, m) = expand_hash_colon_syntax(&text);
    text = t;
    pass_maps.push(m);

    let (t, m) = rewrite_test_module(&text);
    text = t;
    pass_maps.push(m);

    let (t, m) = rewrite_paren_free(&text)?;
    text = t;
    pass_maps.push(m);

    let map = crate::lineinfo::compose_all(base_lines, pass_maps);
    Ok((text, map))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pipeline_composes_heredoc_and_try_sugar() {
        let src = "greeting = <<TXT\nhello\nTXT\ntry risky() or \"fallback\"\n";
        let (out, map) = preprocess(src).unwrap();
        assert!(out.contains("greeting = \"hello\""));
        assert!(out.contains("try\n"));
        assert!(out.contains("or _err"));
        // every line of the expanded try block came from original line 4,
        // the single line the heredoc-collapsed source held it on.
        let try_start = out.find("try\n").unwrap();
        let try_line_no = out[..try_start].matches('\n').count() + 1;
        assert_eq!(map.translate(try_line_no), 4);
    }

    #[test]
    fn idempotent_on_output_with_no_sugar_left() {
        let src = "x = 1\ny = 2\n";
        let (out1, _) = preprocess(src).unwrap();
        let (out2, _) = preprocess(&out1).unwrap();
        assert_eq!(out1, out2);
    }
}
