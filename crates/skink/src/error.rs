use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::{
    exception::{CodeLoc, Exception, StackFrame},
    value::Value,
};

/// Result type alias for operations that can produce a runtime error.
pub(crate) type RunResult<T> = Result<T, RunError>;

/// Script error kinds.
///
/// Uses strum derives so the string form matches the script-visible
/// constructor name (`ErrorKind::Type` renders as "TypeError").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Parse-time failure.
    #[strum(serialize = "SyntaxError")]
    Syntax,
    /// Invalid receiver, non-callable, non-constructor, frozen write, bad
    /// conversion, ambiguous host call.
    #[strum(serialize = "TypeError")]
    Type,
    /// Unbound name or read of an uninitialized `let`/`const` binding.
    #[strum(serialize = "ReferenceError")]
    Reference,
    /// Invalid length, radix, or numeric domain; resource exhaustion.
    #[strum(serialize = "RangeError")]
    Range,
    /// Malformed URI component.
    #[strum(serialize = "URIError")]
    Uri,
    /// Engine self-check failure.
    #[strum(serialize = "EvaluatorError")]
    Evaluator,
    /// A host-side error escaping through a bridged call.
    #[strum(serialize = "WrappedError")]
    Wrapped,
    /// Execution cancelled through the interrupt hook. Not script-catchable.
    #[strum(serialize = "Terminated")]
    Terminated,
    /// Generic `Error` constructed by script code.
    #[strum(serialize = "Error")]
    Plain,
}

/// An engine-raised error that has not yet been materialized as a script
/// object.
///
/// Most runtime errors never get caught, so the evaluator keeps them in this
/// cheap structured form and only builds a script `Error` object when a
/// `catch` clause actually binds the exception.
#[derive(Debug, Clone)]
pub(crate) struct NativeError {
    pub kind: ErrorKind,
    pub message: String,
    /// Source name of the raise site.
    pub source_name: Option<String>,
    /// Raise-site position.
    pub loc: Option<CodeLoc>,
    /// Text of the offending line, when the raiser had it at hand.
    pub line_source: Option<String>,
    /// Script stack captured at throw time, innermost frame first.
    pub stack: Vec<StackFrame>,
    /// Rendered form of the host-side cause for `Wrapped` errors.
    pub cause: Option<String>,
}

impl NativeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source_name: None,
            loc: None,
            line_source: None,
            stack: Vec::new(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Converts into the public exception form.
    pub fn into_exception(self) -> Exception {
        Exception::new(self.kind, self.message)
            .with_location(
                self.source_name,
                self.loc.map(|l| l.line),
                self.loc.map(|l| l.column),
                self.line_source,
            )
            .with_stack(self.stack)
    }
}

/// A value travelling the throw channel.
#[derive(Debug, Clone)]
pub(crate) enum Thrown {
    /// Arbitrary value thrown by script `throw expr`.
    Value(Value),
    /// Engine-raised error, materialized lazily.
    Native(NativeError),
}

/// Non-normal termination of evaluation, excluding structured completions.
///
/// `Throw` is catchable by script `try`/`catch`; `Terminated` propagates
/// through `finally` blocks but can never be caught by script code.
#[derive(Debug, Clone)]
pub(crate) enum RunError {
    Throw(Thrown),
    Terminated,
}

impl RunError {
    pub fn kind_error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Throw(Thrown::Native(NativeError::new(kind, message)))
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::kind_error(ErrorKind::Type, message)
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::kind_error(ErrorKind::Reference, message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::kind_error(ErrorKind::Range, message)
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::kind_error(ErrorKind::Syntax, message)
    }

    pub fn uri_error(message: impl Into<String>) -> Self {
        Self::kind_error(ErrorKind::Uri, message)
    }

    pub fn evaluator_error(message: impl Into<String>) -> Self {
        Self::kind_error(ErrorKind::Evaluator, message)
    }

    /// True when a script `catch` clause may intercept this error.
    pub fn is_catchable(&self) -> bool {
        matches!(self, Self::Throw(_))
    }
}

impl From<crate::resource::ResourceError> for RunError {
    fn from(err: crate::resource::ResourceError) -> Self {
        Self::Throw(Thrown::Native(err.into_native_error()))
    }
}
