use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Load,
    Introspect,
    Plan,
    Emit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DiagnosticCode {
    NGF0001ParseError,
    NGF0002EmptyPackage,
    NGF0003AmbiguousPackage,
    NGF0101UnknownArgument,
    NGF0102UnhandledArgument,
    NGF0103UnproducedArgument,
    NGF0104UnproducedArrayArgument,
    NGF0105UnproducedReceiver,
    NGF0106UnhandledResult,
    NGF0107ArrayResult,
    NGF0108BorrowedResult,
    NGF0109UnproducedType,
    NGF0110NoFusableFields,
    NGF0111UnsupportedGenerics,
    NGF0112UnhandledField,
    NGF0201CreateOutput,
}

impl DiagnosticCode {
    pub fn code_str(self) -> &'static str {
        match self {
            DiagnosticCode::NGF0001ParseError => "NGF0001",
            DiagnosticCode::NGF0002EmptyPackage => "NGF0002",
            DiagnosticCode::NGF0003AmbiguousPackage => "NGF0003",
            DiagnosticCode::NGF0101UnknownArgument => "NGF0101",
            DiagnosticCode::NGF0102UnhandledArgument => "NGF0102",
            DiagnosticCode::NGF0103UnproducedArgument => "NGF0103",
            DiagnosticCode::NGF0104UnproducedArrayArgument => "NGF0104",
            DiagnosticCode::NGF0105UnproducedReceiver => "NGF0105",
            DiagnosticCode::NGF0106UnhandledResult => "NGF0106",
            DiagnosticCode::NGF0107ArrayResult => "NGF0107",
            DiagnosticCode::NGF0108BorrowedResult => "NGF0108",
            DiagnosticCode::NGF0109UnproducedType => "NGF0109",
            DiagnosticCode::NGF0110NoFusableFields => "NGF0110",
            DiagnosticCode::NGF0111UnsupportedGenerics => "NGF0111",
            DiagnosticCode::NGF0112UnhandledField => "NGF0112",
            DiagnosticCode::NGF0201CreateOutput => "NGF0201",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            DiagnosticCode::NGF0001ParseError => "failed to parse source file",
            DiagnosticCode::NGF0002EmptyPackage => "no Rust sources in package",
            DiagnosticCode::NGF0003AmbiguousPackage => "expected exactly one package",
            DiagnosticCode::NGF0101UnknownArgument => "unrecognized argument type",
            DiagnosticCode::NGF0102UnhandledArgument => "unhandled argument type",
            DiagnosticCode::NGF0103UnproducedArgument => "argument type has no producer",
            DiagnosticCode::NGF0104UnproducedArrayArgument => "array argument type has no producer",
            DiagnosticCode::NGF0105UnproducedReceiver => "receiver type has no producer",
            DiagnosticCode::NGF0106UnhandledResult => "unhandled result type",
            DiagnosticCode::NGF0107ArrayResult => "array results are not stored",
            DiagnosticCode::NGF0108BorrowedResult => "borrowed results are not stored",
            DiagnosticCode::NGF0109UnproducedType => "type is consumed but never produced",
            DiagnosticCode::NGF0110NoFusableFields => "struct has no fusable fields",
            DiagnosticCode::NGF0111UnsupportedGenerics => "generic functions are not supported",
            DiagnosticCode::NGF0112UnhandledField => "unhandled struct field",
            DiagnosticCode::NGF0201CreateOutput => "failed to create output file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagnosticCode,
    pub phase: Phase,
    pub severity: Severity,
    pub message: String,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, phase: Phase, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            phase,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    pub fn warning(code: DiagnosticCode, phase: Phase, message: impl Into<String>) -> Self {
        Diagnostic {
            code,
            phase,
            severity: Severity::Warning,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {:?} {:?}: {}",
            self.code.code_str(),
            self.phase,
            self.severity,
            self.message
        )
    }
}

/// Print a drop-with-log diagnostic to stderr and keep going.
pub fn warn(code: DiagnosticCode, phase: Phase, message: impl Into<String>) {
    eprintln!("{}", Diagnostic::warning(code, phase, message));
}
