//! Error types and reporting
//!
//! Three layers, from the inside out:
//! - [`Defect`]: an internal invariant of the resolution context was violated.
//!   These are programming defects, never user errors, and are not retried.
//! - [`TranslateError`]: anything that stops translation, defects included.
//! - [`VerifyError`]: everything the pipeline and CLI can report.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ast::{NodeId, Span};

/// Result type alias
pub type Result<T> = std::result::Result<T, VerifyError>;

/// Internal invariant violation in the resolution context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Defect {
    #[error("duplicated contract: {name} ({id})")]
    DuplicateContract { name: String, id: NodeId },

    #[error("unknown contract: {0}")]
    UnknownContract(String),

    #[error("duplicated function signature in {contract}: {signature}")]
    DuplicateFunctionSignature { contract: String, signature: String },

    #[error("duplicated state variable in {contract}: {name}")]
    DuplicateStateVariable { contract: String, name: String },

    #[error("duplicated state mapping in {contract}: {name}")]
    DuplicateMapping { contract: String, name: String },

    #[error("duplicated state array in {contract}: {name}")]
    DuplicateArray { contract: String, name: String },

    #[error("duplicated event definition in {contract}: {name}")]
    DuplicateEvent { contract: String, name: String },

    #[error("multiple constructors are defined in {contract}")]
    MultipleConstructors { contract: String },

    #[error("{member} ({id}) is already owned by {owner}")]
    OwnershipConflict {
        member: String,
        id: NodeId,
        owner: String,
    },

    #[error("{name} is not {expected}")]
    CategoryMismatch { name: String, expected: &'static str },

    #[error("unknown {what}: {key}")]
    UnknownKey { what: &'static str, key: String },

    #[error("source location of {0} is already attributed")]
    SourceReattributed(NodeId),

    #[error("no source location attributed to {0}")]
    MissingSource(NodeId),

    #[error("inheritance hierarchy of {0} cannot be linearized")]
    InconsistentHierarchy(String),
}

impl Defect {
    pub fn unknown(what: &'static str, key: impl Into<String>) -> Self {
        Self::UnknownKey {
            what,
            key: key.into(),
        }
    }
}

/// Translation failure
#[derive(Debug, Clone, Error)]
pub enum TranslateError {
    #[error("internal invariant violated: {0}")]
    Defect(#[from] Defect),

    #[error("contract '{0}' not found in the program")]
    UnknownTargetContract(String),

    #[error("unsupported type '{ty}' for {name}")]
    UnsupportedType { name: String, ty: String },
}

/// A diagnostic reported by the front-end compiler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    /// Fully rendered message as the compiler printed it
    pub formatted: Option<String>,
    pub file: Option<PathBuf>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Diagnostic {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.formatted {
            Some(text) => write!(f, "{}", text.trim_end()),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Top-level verifier error
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Missing or malformed user input; the run aborts before any stage
    #[error("{0}")]
    Usage(String),

    #[error("cannot recognize OS platform for the solc binary")]
    UnsupportedPlatform,

    #[error("configuration error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("compilation error ({} diagnostics)", diagnostics.len())]
    Compilation { diagnostics: Vec<Diagnostic> },

    #[error("translation error: {0}")]
    Translation(#[from] TranslateError),

    #[error("failed to run {tool}: {message}")]
    Tool { tool: String, message: String },

    #[error("{tool} did not finish within {secs}s")]
    ToolTimeout { tool: String, secs: u64 },

    #[error("cannot find {}", path.display())]
    MissingAsset { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VerifyError {
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error. Compilation and translation
    /// failures share the "not verified" code; everything else is an
    /// environment or input problem.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Compilation { .. } | Self::Translation(_) => 1,
            _ => 2,
        }
    }
}

/// Print compiler diagnostics to stderr, verbatim, with a source snippet
/// when the location and text are known.
pub fn report_diagnostics(diagnostics: &[Diagnostic], source_text: impl Fn(&PathBuf) -> Option<String>) {
    use std::io::IsTerminal;

    let color = std::io::stderr().is_terminal();
    for diag in diagnostics {
        let located = diag
            .file
            .as_ref()
            .zip(diag.span)
            .and_then(|(file, span)| source_text(file).map(|text| (file, span, text)));

        let Some((file, span, text)) = located else {
            eprintln!("{diag}");
            continue;
        };

        if write_snippet(diag, file, span, &text, color, std::io::stderr()).is_err() {
            eprintln!("{diag}");
        }
    }
}

/// solc spans are byte offsets, so the report is indexed by byte
fn write_snippet(
    diag: &Diagnostic,
    file: &Path,
    span: Span,
    text: &str,
    color: bool,
    out: impl std::io::Write,
) -> std::io::Result<()> {
    use ariadne::{Color, Config, IndexType, Label, Report, ReportKind, Source};

    let filename = file.display().to_string();
    let kind = match diag.severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
        Severity::Info => ReportKind::Advice,
    };
    let range = span.start.min(text.len())..span.end.min(text.len());

    Report::build(kind, (filename.as_str(), range.clone()))
        .with_config(
            Config::default()
                .with_index_type(IndexType::Byte)
                .with_color(color),
        )
        .with_message(&diag.message)
        .with_label(
            Label::new((filename.as_str(), range))
                .with_message(&diag.message)
                .with_color(Color::Red),
        )
        .finish()
        .write((filename.as_str(), Source::from(text)), out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defect_messages() {
        let defect = Defect::MultipleConstructors {
            contract: "Token".to_string(),
        };
        assert_eq!(defect.to_string(), "multiple constructors are defined in Token");

        let defect = Defect::unknown("function signature", "f()");
        assert_eq!(defect.to_string(), "unknown function signature: f()");
    }

    #[test]
    fn test_translate_error_wraps_defect() {
        let err: TranslateError = Defect::UnknownContract("A".to_string()).into();
        assert_eq!(err.to_string(), "internal invariant violated: unknown contract: A");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(VerifyError::Compilation { diagnostics: vec![] }.exit_code(), 1);
        let translation: VerifyError =
            TranslateError::UnknownTargetContract("X".to_string()).into();
        assert_eq!(translation.exit_code(), 1);
        assert_eq!(VerifyError::UnsupportedPlatform.exit_code(), 2);
        assert_eq!(
            VerifyError::MissingAsset {
                path: PathBuf::from("viewer.exe")
            }
            .exit_code(),
            2
        );
    }

    #[test]
    fn test_diagnostic_display_prefers_formatted() {
        let diag = Diagnostic {
            severity: Severity::Error,
            message: "Expected ';'".to_string(),
            formatted: Some("ParserError: Expected ';'\n --> a.sol:3:1\n".to_string()),
            file: None,
            span: None,
        };
        assert_eq!(diag.to_string(), "ParserError: Expected ';'\n --> a.sol:3:1");
    }

    #[test]
    fn test_snippet_columns_count_bytes() {
        // the comment line holds multi-byte characters ahead of the span
        let text = "// é ü\ncontract C {}\n";
        let start = text.find("C {").unwrap();
        let span = Span::new(start, start + 1, Some(0));
        let diag = Diagnostic {
            severity: Severity::Warning,
            message: "unused contract".to_string(),
            formatted: None,
            file: Some(PathBuf::from("main.sol")),
            span: Some(span),
        };

        let mut out = Vec::new();
        write_snippet(&diag, Path::new("main.sol"), span, text, false, &mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("main.sol:2:10"), "{out}");
        assert!(out.contains("contract C {}"), "{out}");
    }
}
