use std::io::{self, Write as _};

/// Trait for handling output from the script `console` object.
///
/// Implement this trait to capture or redirect console output from embedded
/// scripts. The default implementation `StdConsole` writes to stdout, with
/// `warn`/`error` levels routed to stderr.
pub trait ConsoleWriter {
    /// Called once per `console.<level>(...)` call with the fully formatted
    /// line (arguments joined by single spaces, no trailing newline).
    fn write_line(&mut self, level: ConsoleLevel, line: &str);
}

/// Severity attached to a console call, named after the invoking method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLevel {
    Debug,
    Log,
    Info,
    Warn,
    Error,
}

impl ConsoleLevel {
    /// Method name on the script `console` object.
    pub fn method_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Log => "log",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Default `ConsoleWriter` backed by the process stdout/stderr.
#[derive(Debug, Default)]
pub struct StdConsole;

impl ConsoleWriter for StdConsole {
    fn write_line(&mut self, level: ConsoleLevel, line: &str) {
        match level {
            ConsoleLevel::Warn | ConsoleLevel::Error => {
                let _ = writeln!(io::stderr(), "{line}");
            }
            _ => {
                let _ = writeln!(io::stdout(), "{line}");
            }
        }
    }
}

/// A `ConsoleWriter` that collects all output into a string, one line per
/// console call.
///
/// Useful for testing or capturing console output programmatically.
#[derive(Debug, Default)]
pub struct CollectStringConsole(String);

impl CollectStringConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the collected output as a string slice.
    pub fn output(&self) -> &str {
        self.0.as_str()
    }

    /// Consumes the writer and returns the collected output.
    pub fn into_output(self) -> String {
        self.0
    }
}

impl ConsoleWriter for CollectStringConsole {
    fn write_line(&mut self, _level: ConsoleLevel, line: &str) {
        self.0.push_str(line);
        self.0.push('\n');
    }
}

/// `ConsoleWriter` that ignores all output.
#[derive(Debug, Default)]
pub struct NoConsole;

impl ConsoleWriter for NoConsole {
    fn write_line(&mut self, _level: ConsoleLevel, _line: &str) {}
}
