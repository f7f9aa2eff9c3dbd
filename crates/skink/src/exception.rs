use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// A location in script source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLoc {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

/// One frame of the script call stack, captured at throw time.
///
/// Frames describe the script's own activation chain, never the host stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackFrame {
    /// The source name the frame's code came from.
    pub file_name: String,
    /// Function name, or `"<top-level>"` for the script body.
    pub function_name: String,
    /// Line number the frame was executing when the capture happened.
    pub line_number: u32,
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\tat {} ({}:{})", self.function_name, self.file_name, self.line_number)
    }
}

/// Structured error delivered to the embedder.
///
/// Carries the error kind, the bare message, the source position where the
/// error was raised, and the script stack captured from the evaluator's
/// activation chain. `Display` renders the conventional one-line form
/// `Kind: message (source#line)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exception {
    kind: ErrorKind,
    message: String,
    source_name: Option<String>,
    line_number: Option<u32>,
    column_number: Option<u32>,
    line_source: Option<String>,
    stack: Vec<StackFrame>,
}

impl Exception {
    pub(crate) fn new(kind: ErrorKind, message: String) -> Self {
        Self {
            kind,
            message,
            source_name: None,
            line_number: None,
            column_number: None,
            line_source: None,
            stack: Vec::new(),
        }
    }

    pub(crate) fn with_location(
        mut self,
        source_name: Option<String>,
        line: Option<u32>,
        column: Option<u32>,
        line_source: Option<String>,
    ) -> Self {
        self.source_name = source_name;
        self.line_number = line;
        self.column_number = column;
        self.line_source = line_source;
        self
    }

    pub(crate) fn with_stack(mut self, stack: Vec<StackFrame>) -> Self {
        self.stack = stack;
        self
    }

    /// The error kind (Type, Reference, Syntax, ...).
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The bare message without kind prefix or source suffix.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Name of the source the error was raised in, when known.
    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    /// 1-based line number of the raise site, when known.
    pub fn line_number(&self) -> Option<u32> {
        self.line_number
    }

    /// 1-based column number of the raise site, when known.
    pub fn column_number(&self) -> Option<u32> {
        self.column_number
    }

    /// The text of the offending source line, when available.
    pub fn line_source(&self) -> Option<&str> {
        self.line_source.as_deref()
    }

    /// The captured script stack, innermost frame first.
    pub fn stack(&self) -> &[StackFrame] {
        &self.stack
    }

    /// Message with the `(source#line)` suffix appended when both are known.
    ///
    /// This is the `details` part of `Display`, without the kind prefix.
    pub fn details(&self) -> String {
        let mut out = self.message.clone();
        if let (Some(source), Some(line)) = (&self.source_name, self.line_number) {
            let _ = write!(out, " ({source}#{line})");
        }
        out
    }

    /// Renders the script stack one frame per line, innermost first.
    ///
    /// `limit` truncates the rendering to at most that many frames.
    /// `hide_below` stops rendering at the first frame with the given
    /// function name, hiding it and everything beneath it.
    pub fn render_stack(&self, limit: Option<usize>, hide_below: Option<&str>) -> String {
        let mut out = String::new();
        for (index, frame) in self.stack.iter().enumerate() {
            if let Some(limit) = limit {
                if index >= limit {
                    break;
                }
            }
            if let Some(hide) = hide_below {
                if frame.function_name == hide {
                    break;
                }
            }
            let _ = writeln!(out, "{frame}");
        }
        out
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.details())
    }
}

impl std::error::Error for Exception {}
