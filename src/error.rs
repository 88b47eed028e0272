pub use anyhow::Result;

use ariadne::{Cache, Config, Label, Report, ReportKind, Source};
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::ops::{Add, Range};

/// Byte-offset range into the *original* source file.
///
/// Preprocessor passes may shuffle line numbers (heredoc collapse, sugar
/// expansion), but every `Span` constructed once the walker runs has already
/// been translated back into original-file coordinates via the line map
/// (see [`crate::lineinfo`]).
#[derive(Clone, PartialEq, Eq, Copy, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub span: Option<Span>,
    pub reason: Reason,
    pub help: Option<String>,
}

/// Line/column location within a source file, both 0-based.
#[derive(Debug, Clone, Serialize)]
pub struct SourceLocation {
    pub start: (usize, usize),
    pub end: (usize, usize),
}

#[derive(Debug, Clone)]
pub enum Reason {
    Simple(String),
    Expected {
        who: Option<String>,
        expected: String,
        found: String,
    },
    Unexpected {
        found: String,
    },
    NotFound {
        name: String,
        namespace: String,
    },
}

impl Error {
    pub fn new(reason: Reason) -> Self {
        Error {
            span: None,
            reason,
            help: None,
        }
    }

    pub fn new_simple<S: Into<String>>(text: S) -> Self {
        Error::new(Reason::Simple(text.into()))
    }

    pub fn with_help<S: Into<String>>(mut self, help: S) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    /// Plain text of the error.
    pub reason: String,
    /// Suggestion for how to fix the error.
    pub hint: Option<String>,
    /// Byte offset of the error origin within the original source file.
    pub span: Option<Span>,
    /// Annotated source snippet, built lazily by [`ErrorMessages::composed`].
    pub display: Option<String>,
    /// Line/column location, built lazily by [`ErrorMessages::composed`].
    pub location: Option<SourceLocation>,
}

impl Display for ErrorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(display) = &self.display {
            let trimmed = display
                .split('\n')
                .map(str::trim_end)
                .collect::<Vec<_>>()
                .join("\n");
            f.write_str(&trimmed)?;
        } else {
            f.write_str(&self.reason)?;
        }
        Ok(())
    }
}

impl StdError for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self, f)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessages {
    pub inner: Vec<ErrorMessage>,
}

impl From<ErrorMessage> for ErrorMessages {
    fn from(e: ErrorMessage) -> Self {
        ErrorMessages { inner: vec![e] }
    }
}

impl Display for ErrorMessages {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for e in &self.inner {
            Display::fmt(&e, f)?;
        }
        Ok(())
    }
}

/// Converts any failure from the pipeline into a user-facing [`ErrorMessages`].
///
/// Every pipeline stage (preprocess, walk, resolve, infer, check, codegen)
/// funnels its failures through `anyhow::Error`; this is the single place
/// that downcasts back to our typed [`Error`] to recover span/help
/// information. A failure that isn't one of ours just gets its `Display`.
pub fn downcast(error: anyhow::Error) -> ErrorMessages {
    let error = match error.downcast::<ErrorMessages>() {
        Ok(messages) => return messages,
        Err(error) => error,
    };

    let (reason, span, hint) = match error.downcast::<Error>() {
        Ok(error) => (error.reason.message(), error.span, error.help),
        Err(error) => (format!("{error:#}"), None, None),
    };

    ErrorMessage {
        reason,
        hint,
        span,
        display: None,
        location: None,
    }
    .into()
}

impl ErrorMessages {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap()
    }

    /// Computes message location and builds the pretty display.
    pub fn composed(mut self, source_id: &str, source: &str, color: bool) -> Self {
        for e in &mut self.inner {
            let src = Source::from(source);
            let cache = (source_id, src);

            e.location = e.compose_location(&cache.1);
            e.display = e.compose_display(source_id, cache, color);
        }
        self
    }
}

impl ErrorMessage {
    fn compose_display<'a, C>(&self, source_id: &'a str, cache: C, color: bool) -> Option<String>
    where
        C: Cache<&'a str>,
    {
        let config = Config::default().with_color(color);

        let span = Range::from(self.span?);

        let mut report = Report::build(ReportKind::Error, source_id, span.start)
            .with_config(config)
            .with_message("")
            .with_label(Label::new((source_id, span)).with_message(&self.reason));

        if let Some(hint) = &self.hint {
            report.set_help(hint);
        }

        let mut out = Vec::new();
        report.finish().write(cache, &mut out).ok()?;
        String::from_utf8(out).ok()
    }

    fn compose_location(&self, source: &Source) -> Option<SourceLocation> {
        let span = self.span?;

        let start = source.get_offset_line(span.start)?;
        let end = source.get_offset_line(span.end)?;
        Some(SourceLocation {
            start: (start.1, start.2),
            end: (end.1, end.2),
        })
    }
}

impl Reason {
    fn message(&self) -> String {
        match self {
            Reason::Simple(text) => text.clone(),
            Reason::Expected {
                who,
                expected,
                found,
            } => {
                let who = who.clone().map(|x| format!("{x} ")).unwrap_or_default();
                format!("{who}expected {expected}, but found {found}")
            }
            Reason::Unexpected { found } => format!("unexpected {found}"),
            Reason::NotFound { name, namespace } => format!("{namespace} `{name}` not found"),
        }
    }
}

impl From<Span> for Range<usize> {
    fn from(a: Span) -> Self {
        a.start..a.end
    }
}

impl Add<Span> for Span {
    type Output = Span;

    fn add(self, rhs: Span) -> Span {
        Span {
            start: self.start.min(rhs.start),
            end: self.end.max(rhs.end),
        }
    }
}

pub trait WithErrorInfo {
    fn with_help<S: Into<String>>(self, help: S) -> Self;
    fn with_span(self, span: Option<Span>) -> Self;
}

impl<T> WithErrorInfo for Result<T, Error> {
    fn with_help<S: Into<String>>(self, help: S) -> Self {
        self.map_err(|e| e.with_help(help))
    }

    fn with_span(self, span: Option<Span>) -> Self {
        self.map_err(|e| e.with_span(span))
    }
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "span-bytes-{}-{}", self.start, self.end)
    }
}

/// Substrings that must never leak into a user-facing diagnostic.
const FORBIDDEN_HOST_LEAKS: &[&str] = &["interface{}", "goroutine ", "panic:", "nil pointer"];

pub fn check_no_host_leaks(message: &str) -> std::result::Result<(), String> {
    for needle in FORBIDDEN_HOST_LEAKS {
        if message.contains(needle) {
            return Err(format!("message leaks host-language detail: {needle:?}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_no_host_leaks_catches_interface() {
        assert!(check_no_host_leaks("got interface{} somehow").is_err());
    }

    #[test]
    fn test_no_host_leaks_allows_clean_message() {
        assert!(check_no_host_leaks("undefined variable 'foo'").is_ok());
    }

    #[test]
    fn test_span_add_takes_union() {
        let a = Span { start: 2, end: 5 };
        let b = Span { start: 1, end: 3 };
        let c = a + b;
        assert_eq!(c.start, 1);
        assert_eq!(c.end, 5);
    }
}
