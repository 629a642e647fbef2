//! Error model: error kinds, trace chain, and the payload EXPOSE/DETECT
//! matching operates on.

use std::fmt;

use crate::instruction::Pos;

/// One frame of accumulated trace, prepended whenever an error leaks across
/// an `InsSet::execute` boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFragment {
    pub scope_leader_pos: Pos,
    pub scope_leader_code: String,
    pub error_pos: Pos,
    pub error_code: String,
    /// Set when the error crossed a file boundary (LOADIN/LINK).
    pub file_change_banner: Option<String>,
}

impl fmt::Display for TraceFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(banner) = &self.file_change_banner {
            writeln!(f, "-- {banner} --")?;
        }
        writeln!(f, "  at {}: {}", self.scope_leader_pos, self.scope_leader_code)?;
        write!(f, "  at {}: {}", self.error_pos, self.error_code)
    }
}

/// The kinds of runtime error. No wire names are required, only
/// matching/printing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ErrorKind {
    SyntaxError,
    ArgumentError,
    ArgumentNumberError,
    ArgTypeMismatchError,
    DataTypeMismatchError,
    MemoryError,
    DuplicateKeyError,
    KeyNotFoundError,
    FieldNotFoundError,
    RangeError,
    LinkError,
    FileReadError,
    FileWriteError,
    DivideByZeroError,
    RuntimeError,
    ExposedError,
}

/// A fully-annotated runtime error, carrying a position, the offending raw
/// source line, detail/hint lines, and the accumulated trace chain.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {}", details.join("; "))]
pub struct RvmError {
    pub kind: ErrorKind,
    pub pos: Pos,
    pub raw_src: String,
    pub details: Vec<String>,
    pub hints: Vec<String>,
    pub trace: Vec<TraceFragment>,
}

impl RvmError {
    pub fn new(kind: ErrorKind, pos: Pos, raw_src: impl Into<String>, detail: impl Into<String>) -> Self {
        RvmError {
            kind,
            pos,
            raw_src: raw_src.into(),
            details: vec![detail.into()],
            hints: Vec::new(),
            trace: Vec::new(),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    /// Prepends a trace fragment as this error leaks across an outer
    /// `execute` boundary.
    pub fn push_trace(&mut self, fragment: TraceFragment) {
        self.trace.insert(0, fragment);
    }

    /// Full annotated rendering, used below the Release profile.
    pub fn render_full(&self) -> String {
        let mut out = format!("{}: {}\n  at {}: {}", self.kind, self.details.join("; "), self.pos, self.raw_src);
        for hint in &self.hints {
            out.push_str(&format!("\n  hint: {hint}"));
        }
        for fragment in &self.trace {
            out.push('\n');
            out.push_str(&fragment.to_string());
        }
        out
    }

    /// One-line rendering, used at the Release profile and above.
    pub fn render_summary(&self) -> String {
        format!("{}: {}", self.kind, self.details.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_fragments_prepend_in_leak_order() {
        let mut err = RvmError::new(ErrorKind::RuntimeError, Pos::unknown(), "ADD : a, b, c", "boom");
        err.push_trace(TraceFragment {
            scope_leader_pos: Pos::unknown(),
            scope_leader_code: "FUNI : f".into(),
            error_pos: Pos::unknown(),
            error_code: "ADD : a, b, c".into(),
            file_change_banner: None,
        });
        err.push_trace(TraceFragment {
            scope_leader_pos: Pos::unknown(),
            scope_leader_code: "CALL : f".into(),
            error_pos: Pos::unknown(),
            error_code: "IVOK : f, out".into(),
            file_change_banner: None,
        });
        assert_eq!(err.trace.len(), 2);
        assert!(err.trace[0].scope_leader_code.contains("CALL"));
    }
}
