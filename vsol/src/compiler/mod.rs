//! Front-end compiler adapter
//!
//! Runs `solc` in standard-JSON mode and turns its answer into
//! [`CompilerOutput`]: diagnostics plus, when compilation produced ASTs,
//! the typed [`Program`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use crate::ast::{Program, SourceUnit, Span};
use crate::error::{Diagnostic, Result, Severity, VerifyError, report_diagnostics};
use crate::pipeline::{Invocation, ProcessRunner, ToolRunner};

/// Parses one entry file into a program
pub trait FrontEnd {
    fn compile(&self, entry: &Path) -> Result<CompilerOutput>;
}

#[derive(Debug, Clone, Default)]
pub struct CompilerOutput {
    pub diagnostics: Vec<Diagnostic>,
    /// Absent when solc produced no AST
    pub program: Option<Program>,
}

impl CompilerOutput {
    pub fn contains_error(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    /// Print every error diagnostic to stderr
    pub fn print_errors(&self) {
        let errors: Vec<Diagnostic> = self.errors().cloned().collect();
        report_diagnostics(&errors, |path| std::fs::read_to_string(path).ok());
    }
}

/// File name of the bundled solc binary for the host platform
pub fn solc_name_for_platform() -> Result<&'static str> {
    if cfg!(target_os = "windows") {
        Ok("solc.exe")
    } else if cfg!(target_os = "linux") {
        Ok("solc-static-linux")
    } else if cfg!(target_os = "macos") {
        Ok("solc-mac")
    } else {
        Err(VerifyError::UnsupportedPlatform)
    }
}

/// `solc --standard-json`
pub struct SolcCompiler {
    solc: PathBuf,
    runner: Box<dyn ToolRunner>,
    timeout: Option<Duration>,
}

impl SolcCompiler {
    pub fn new(solc: impl Into<PathBuf>) -> Self {
        Self {
            solc: solc.into(),
            runner: Box::new(ProcessRunner),
            timeout: None,
        }
    }

    pub fn with_runner(mut self, runner: Box<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Standard-JSON request for one entry file, asking for ASTs only
    pub fn request(entry: &Path) -> serde_json::Value {
        let name = entry.display().to_string();
        let mut sources = serde_json::Map::new();
        sources.insert(name.clone(), json!({ "urls": [name] }));
        json!({
            "language": "Solidity",
            "sources": sources,
            "settings": {
                "outputSelection": { "*": { "": ["ast"] } }
            }
        })
    }
}

impl FrontEnd for SolcCompiler {
    fn compile(&self, entry: &Path) -> Result<CompilerOutput> {
        if !entry.is_file() {
            return Err(VerifyError::usage(format!(
                "cannot find Solidity file {}",
                entry.display()
            )));
        }
        let entry = entry.canonicalize()?;
        let source_dir = entry.parent().map(Path::to_path_buf).unwrap_or_default();

        let invocation = Invocation::new("solc", &self.solc)
            .args(["--standard-json", "--allow-paths"])
            .arg(source_dir.display().to_string())
            .stdin(Self::request(&entry).to_string())
            .timeout(self.timeout);
        let output = self.runner.run(&invocation)?;

        if output.stdout.trim().is_empty() {
            return Err(VerifyError::tool("solc", output.stderr.trim().to_string()));
        }
        parse_standard_json(&output.stdout, &source_dir)
    }
}

#[derive(Debug, Deserialize)]
struct StandardJsonOutput {
    #[serde(default)]
    errors: Vec<SolcError>,
    #[serde(default)]
    sources: BTreeMap<String, SolcSource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SolcError {
    severity: String,
    message: String,
    #[serde(default)]
    formatted_message: Option<String>,
    #[serde(default)]
    source_location: Option<SolcLocation>,
}

#[derive(Debug, Deserialize)]
struct SolcLocation {
    file: String,
    start: i64,
    end: i64,
}

#[derive(Debug, Deserialize)]
struct SolcSource {
    id: usize,
    #[serde(default)]
    ast: Option<SourceUnit>,
}

/// Parse solc's standard-JSON answer. Source text is read from disk for
/// line attribution; unreadable files simply carry no text.
pub fn parse_standard_json(stdout: &str, source_dir: &Path) -> Result<CompilerOutput> {
    let raw: StandardJsonOutput = serde_json::from_str(stdout)?;

    let diagnostics: Vec<Diagnostic> = raw.errors.into_iter().map(|e| to_diagnostic(e, source_dir)).collect();

    let mut program = Program::new(source_dir);
    for source in raw.sources.into_values() {
        let Some(unit) = source.ast else { continue };
        let path = resolve(source_dir, &unit.absolute_path);
        let text = std::fs::read_to_string(&path).ok();
        program.add_unit(source.id, text, unit);
    }

    let program = (!program.units.is_empty()).then_some(program);
    tracing::debug!(
        diagnostics = diagnostics.len(),
        units = program.as_ref().map_or(0, |p| p.units.len()),
        "solc output parsed"
    );
    Ok(CompilerOutput {
        diagnostics,
        program,
    })
}

fn to_diagnostic(error: SolcError, source_dir: &Path) -> Diagnostic {
    let severity = match error.severity.as_str() {
        "error" => Severity::Error,
        "warning" => Severity::Warning,
        _ => Severity::Info,
    };
    let (file, span) = match error.source_location {
        Some(loc) if loc.start >= 0 && loc.end >= loc.start => (
            Some(resolve(source_dir, &loc.file)),
            Some(Span::new(loc.start as usize, loc.end as usize, None)),
        ),
        Some(loc) => (Some(resolve(source_dir, &loc.file)), None),
        None => (None, None),
    };
    Diagnostic {
        severity,
        message: error.message,
        formatted: error.formatted_message,
        file,
        span,
    }
}

fn resolve(source_dir: &Path, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        source_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ToolOutput;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_parse_errors() {
        let stdout = r#"{
            "errors": [
                { "severity": "warning", "type": "Warning", "message": "Unused variable",
                  "formattedMessage": "Warning: Unused variable\n" },
                { "severity": "error", "type": "ParserError", "message": "Expected ';'",
                  "formattedMessage": "ParserError: Expected ';'\n --> a.sol:3:5:\n",
                  "sourceLocation": { "file": "a.sol", "start": 30, "end": 31 } }
            ]
        }"#;
        let output = parse_standard_json(stdout, Path::new("/work")).unwrap();
        assert!(output.contains_error());
        assert!(output.program.is_none());
        assert_eq!(output.errors().count(), 1);

        let error = output.errors().next().unwrap();
        assert_eq!(error.file, Some(PathBuf::from("/work/a.sol")));
        assert_eq!(error.span.map(|s| (s.start, s.end)), Some((30, 31)));
    }

    #[test]
    fn test_parse_sources() {
        let stdout = r#"{
            "errors": [ { "severity": "warning", "message": "SPDX license identifier not provided" } ],
            "sources": {
                "/work/token.sol": {
                    "id": 0,
                    "ast": {
                        "nodeType": "SourceUnit", "id": 20, "absolutePath": "/work/token.sol",
                        "nodes": [
                            { "nodeType": "PragmaDirective", "id": 1, "src": "0:23:0" },
                            { "nodeType": "ContractDefinition", "id": 19, "name": "Token",
                              "src": "25:100:0", "contractKind": "contract",
                              "linearizedBaseContracts": [19], "nodes": [] }
                        ]
                    }
                }
            }
        }"#;
        let output = parse_standard_json(stdout, Path::new("/work")).unwrap();
        assert!(!output.contains_error());

        let program = output.program.unwrap();
        let names: Vec<&str> = program.contracts().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Token"]);
        assert_eq!(program.sources[&0].path, PathBuf::from("/work/token.sol"));
    }

    #[test]
    fn test_malformed_output_is_json_error() {
        let err = parse_standard_json("not json", Path::new("/")).unwrap_err();
        assert!(matches!(err, VerifyError::Json(_)));
    }

    #[test]
    fn test_request_shape() {
        let request = SolcCompiler::request(Path::new("/work/a.sol"));
        assert_eq!(request["language"], "Solidity");
        assert_eq!(request["sources"]["/work/a.sol"]["urls"][0], "/work/a.sol");
        assert_eq!(request["settings"]["outputSelection"]["*"][""][0], "ast");
    }

    #[test]
    fn test_platform_name() {
        let name = solc_name_for_platform();
        if cfg!(target_os = "linux") {
            assert_eq!(name.unwrap(), "solc-static-linux");
        }
    }

    struct Recording {
        seen: Rc<RefCell<Vec<Invocation>>>,
    }

    impl ToolRunner for Recording {
        fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
            self.seen.borrow_mut().push(invocation.clone());
            Ok(ToolOutput {
                stdout: r#"{ "sources": {} }"#.to_string(),
                ..ToolOutput::default()
            })
        }
    }

    #[test]
    fn test_compile_invokes_solc_with_allow_paths() {
        let dir = tempfile::tempdir().unwrap();
        let entry = dir.path().join("a.sol");
        std::fs::write(&entry, "contract A {}").unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let compiler = SolcCompiler::new("solc").with_runner(Box::new(Recording { seen: seen.clone() }));
        let output = compiler.compile(&entry).unwrap();
        assert!(output.program.is_none());

        let seen = seen.borrow();
        assert_eq!(seen[0].args[0], "--standard-json");
        assert_eq!(seen[0].args[1], "--allow-paths");
        assert_eq!(
            PathBuf::from(&seen[0].args[2]),
            dir.path().canonicalize().unwrap()
        );
        assert!(seen[0].stdin.as_deref().unwrap().contains("\"urls\""));
    }

    #[test]
    fn test_missing_entry_is_usage_error() {
        let compiler = SolcCompiler::new("solc");
        let err = compiler.compile(Path::new("/no/such/file.sol")).unwrap_err();
        assert!(matches!(err, VerifyError::Usage(_)));
    }
}
