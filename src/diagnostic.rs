use std::fmt;
use log::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Message,
    Warning,
    Error,
    Fatal
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Message => "message",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        })
    }
}

/// One report raised while scanning or precompiling, tagged with where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file:     String,
    pub line:     u32,
    pub message:  String
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: file {}, line {}: {}", self.severity, self.file, self.line, self.message)
    }
}

/// Ordered sink for diagnostics. Every entry is also forwarded to the `log` facade.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>
}

impl Diagnostics {
    pub fn new() -> Self { Self::default() }

    pub fn emit<M: Into<String>>(&mut self, severity: Severity, file: &str, line: u32, message: M) {
        let diagnostic = Diagnostic {
            severity,
            file: file.to_string(),
            line,
            message: message.into(),
        };
        match severity {
            Severity::Message => info!("file {}, line {}: {}", file, line, diagnostic.message),
            Severity::Warning => warn!("file {}, line {}: {}", file, line, diagnostic.message),
            Severity::Error | Severity::Fatal => error!("file {}, line {}: {}", file, line, diagnostic.message),
        }
        self.entries.push(diagnostic);
    }

    #[inline]
    pub fn warning<M: Into<String>>(&mut self, file: &str, line: u32, message: M) {
        self.emit(Severity::Warning, file, line, message)
    }

    #[inline]
    pub fn error<M: Into<String>>(&mut self, file: &str, line: u32, message: M) {
        self.emit(Severity::Error, file, line, message)
    }

    /// Moves entries recorded elsewhere into this sink without logging them a second time.
    pub fn append(&mut self, other: Vec<Diagnostic>) { self.entries.extend(other) }

    #[inline]
    pub fn entries(&self) -> &[Diagnostic] { &self.entries }

    #[inline]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|entry| entry.severity == severity).count()
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|entry| entry.severity >= Severity::Error)
    }

    pub fn take(&mut self) -> Vec<Diagnostic> { std::mem::take(&mut self.entries) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order_and_drains() {
        let mut sink = Diagnostics::new();
        sink.warning("a.txt", 3, "redefinition of X");
        sink.error("a.txt", 9, "misplaced #endif");
        assert_eq!(sink.count(Severity::Warning), 1);
        assert!(sink.has_errors());
        assert_eq!(sink.entries()[1].to_string(), "error: file a.txt, line 9: misplaced #endif");

        let drained = sink.take();
        assert_eq!(drained.len(), 2);
        assert!(sink.is_empty());
    }
}
