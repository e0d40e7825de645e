// ABOUTME: Destinations for the line-oriented output of running applications.
// ABOUTME: Provides null, tracing, stdio and capturing consoles.

use parking_lot::Mutex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamName {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamName::Stdout => f.write_str("out"),
            StreamName::Stderr => f.write_str("err"),
        }
    }
}

/// Receives every line an application writes to stdout or stderr.
pub trait ApplicationConsole: Send + Sync {
    fn write_line(&self, application: &str, stream: StreamName, line: &str);
}

/// Discards all output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullConsole;

impl ApplicationConsole for NullConsole {
    fn write_line(&self, _application: &str, _stream: StreamName, _line: &str) {}
}

/// Forwards output to tracing under the `foreman::console` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingConsole;

impl ApplicationConsole for TracingConsole {
    fn write_line(&self, application: &str, stream: StreamName, line: &str) {
        match stream {
            StreamName::Stdout => tracing::info!(target: "foreman::console", application, "{line}"),
            StreamName::Stderr => tracing::warn!(target: "foreman::console", application, "{line}"),
        }
    }
}

/// Prefixes each line with the application name and writes it to our own stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemConsole;

impl ApplicationConsole for SystemConsole {
    fn write_line(&self, application: &str, stream: StreamName, line: &str) {
        match stream {
            StreamName::Stdout => println!("[{application}:{stream}] {line}"),
            StreamName::Stderr => eprintln!("[{application}:{stream}] {line}"),
        }
    }
}

/// A captured output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedLine {
    pub application: String,
    pub stream: StreamName,
    pub line: String,
}

/// Keeps every line in memory, mostly for tests.
#[derive(Debug, Default)]
pub struct CapturingConsole {
    lines: Mutex<Vec<CapturedLine>>,
}

impl CapturingConsole {
    pub fn lines(&self) -> Vec<CapturedLine> {
        self.lines.lock().clone()
    }

    /// Lines written to one stream, in order.
    pub fn stream(&self, stream: StreamName) -> Vec<String> {
        self.lines
            .lock()
            .iter()
            .filter(|l| l.stream == stream)
            .map(|l| l.line.clone())
            .collect()
    }
}

impl ApplicationConsole for CapturingConsole {
    fn write_line(&self, application: &str, stream: StreamName, line: &str) {
        self.lines.lock().push(CapturedLine {
            application: application.to_string(),
            stream,
            line: line.to_string(),
        });
    }
}
