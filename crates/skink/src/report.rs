use crate::{
    error::ErrorKind,
    exception::Exception,
};

/// Receiver for parse-time diagnostics.
///
/// The lexer and parser never raise syntax errors directly; they report them
/// here and keep going so a single pass surfaces as many problems as
/// possible. The embedder decides whether reported errors are fatal.
pub trait ErrorReporter {
    /// Reports a non-fatal oddity (unused label, legacy octal in loose code).
    fn warning(&mut self, message: &str, source_name: &str, line: u32, column: u32, line_source: Option<&str>);

    /// Reports a syntax error. Parsing continues at the next recovery point.
    fn error(&mut self, message: &str, source_name: &str, line: u32, column: u32, line_source: Option<&str>);
}

/// A single recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub source_name: String,
    pub line: u32,
    pub column: u32,
    pub line_source: Option<String>,
}

impl Diagnostic {
    /// Converts the diagnostic into a `SyntaxError` exception.
    pub fn into_exception(self) -> Exception {
        Exception::new(ErrorKind::Syntax, self.message).with_location(
            Some(self.source_name),
            Some(self.line),
            Some(self.column),
            self.line_source,
        )
    }
}

/// Reporter that collects diagnostics for later inspection.
///
/// This is the default reporter: parse errors accumulate here and the first
/// one is turned into a `SyntaxError` once parsing finishes.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Takes the first recorded error as an `Exception`, if any.
    pub fn first_error(&self) -> Option<Exception> {
        self.errors.first().cloned().map(Diagnostic::into_exception)
    }
}

impl ErrorReporter for CollectingReporter {
    fn warning(&mut self, message: &str, source_name: &str, line: u32, column: u32, line_source: Option<&str>) {
        self.warnings.push(Diagnostic {
            message: message.to_owned(),
            source_name: source_name.to_owned(),
            line,
            column,
            line_source: line_source.map(str::to_owned),
        });
    }

    fn error(&mut self, message: &str, source_name: &str, line: u32, column: u32, line_source: Option<&str>) {
        self.errors.push(Diagnostic {
            message: message.to_owned(),
            source_name: source_name.to_owned(),
            line,
            column,
            line_source: line_source.map(str::to_owned),
        });
    }
}
