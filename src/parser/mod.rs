//! The external parser boundary. The production Rugo grammar is treated as
//! a replaceable collaborator (not reproduced here — see DESIGN.md); this
//! module defines the flat, post-order interchange shape the walker (L3)
//! consumes, plus a small `tokenize` lexer sufficient to exercise it in
//! tests without a full grammar.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// A lexical token: enough text to reconstruct a literal or identifier, plus
/// the preprocessed-source line it came from (the walker re-points this
/// through the line map to the original file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Int,
    Float,
    /// Double-quoted (interpolating) string, unescaped text already.
    String,
    /// Single-quoted (raw, non-interpolating) string.
    RawString,
    Ident,
    Keyword,
    Op,
    Eof,
}

const KEYWORDS: &[&str] = &[
    "def", "test", "bench", "if", "elsif", "else", "end", "while", "for", "in", "try", "or",
    "spawn", "parallel", "return", "break", "next", "use", "require", "import", "sandbox",
    "struct", "case", "when", "nil", "true", "false", "not", "and",
];

/// Non-terminals carry their grammar symbol and children in post-order;
/// terminals carry a single token. `sym` is `&'static str` rather than an
/// owned `String` since grammar symbol names are a fixed, compiled-in set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FlatNode {
    NonTerminal { sym: &'static str, children: Vec<FlatNode> },
    Terminal(Token),
}

impl FlatNode {
    pub fn non_terminal(sym: &'static str, children: Vec<FlatNode>) -> Self {
        FlatNode::NonTerminal { sym, children }
    }

    pub fn terminal(token: Token) -> Self {
        FlatNode::Terminal(token)
    }

    pub fn as_terminal(&self) -> Option<&Token> {
        match self {
            FlatNode::Terminal(t) => Some(t),
            FlatNode::NonTerminal { .. } => None,
        }
    }
}

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?x)
        (?P<float>\d+\.\d+) |
        (?P<int>\d+) |
        (?P<string>"(?:[^"\\]|\\.)*") |
        (?P<raw>'(?:[^'\\]|\\.)*') |
        (?P<ident>[A-Za-z_][A-Za-z0-9_]*) |
        (?P<op>==|!=|<=|>=|&&|\|\||=>|\.\.|[-+*/%=<>!(){}\[\],.:])
        "#,
    )
    .unwrap()
});

/// Lexes one preprocessed source line into a flat token stream. Whitespace
/// is skipped; strings are unescaped and keep their raw/interpolating kind.
/// This is the "minimal adapter" the production grammar would replace — it
/// does not build a parse tree, only the terminals a test-built `FlatNode`
/// tree would wrap.
pub fn tokenize(line_text: &str, line: usize) -> Vec<Token> {
    let mut tokens = Vec::new();
    for caps in TOKEN_RE.captures_iter(line_text) {
        let (kind, raw) = if let Some(m) = caps.name("float") {
            (TokenKind::Float, m.as_str().to_string())
        } else if let Some(m) = caps.name("int") {
            (TokenKind::Int, m.as_str().to_string())
        } else if let Some(m) = caps.name("string") {
            (TokenKind::String, unescape(&m.as_str()[1..m.as_str().len() - 1]))
        } else if let Some(m) = caps.name("raw") {
            (TokenKind::RawString, unescape(&m.as_str()[1..m.as_str().len() - 1]))
        } else if let Some(m) = caps.name("ident") {
            let text = m.as_str().to_string();
            let kind = if KEYWORDS.contains(&text.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Ident
            };
            (kind, text)
        } else if let Some(m) = caps.name("op") {
            (TokenKind::Op, m.as_str().to_string())
        } else {
            continue;
        };
        tokens.push(Token { kind, text: raw, line });
    }
    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        line,
    });
    tokens
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('"') => out.push('"'),
                Some('\'') => out.push('\''),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tokenizes_assignment() {
        let toks = tokenize("x = 1 + 2", 1);
        let kinds: Vec<TokenKind> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident,
                TokenKind::Op,
                TokenKind::Int,
                TokenKind::Op,
                TokenKind::Int,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn recognizes_keywords() {
        let toks = tokenize("if x end", 1);
        assert_eq!(toks[0].kind, TokenKind::Keyword);
        assert_eq!(toks[2].kind, TokenKind::Keyword);
    }

    #[test]
    fn unescapes_double_quoted_string() {
        let toks = tokenize(r#"x = "a\nb""#, 1);
        assert_eq!(toks[2].kind, TokenKind::String);
        assert_eq!(toks[2].text, "a\nb");
    }

    #[test]
    fn raw_string_keeps_escapes_distinct_kind() {
        let toks = tokenize("x = 'no #{interp}'", 1);
        assert_eq!(toks[2].kind, TokenKind::RawString);
        assert_eq!(toks[2].text, "no #{interp}");
    }
}
