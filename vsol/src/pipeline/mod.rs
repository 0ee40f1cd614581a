//! Verification pipeline
//!
//! Sequences the whole run:
//!
//! ```text
//! Solidity → solc AST → resolution context → Boogie (.bpl)
//!                                              ↓
//!                          Boogie (proof) → Corral (counterexample)
//! ```
//!
//! A proof short-circuits the run. Otherwise Corral searches for a
//! counterexample up to the configured recursion bound.

mod process;
pub mod verdict;

pub use process::{Invocation, ProcessRunner, ToolOutput, ToolRunner};

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Deserialize;

use crate::compiler::{FrontEnd, SolcCompiler};
use crate::error::{Result, Severity, VerifyError};
use crate::translate::{
    BoogieTranslator, IgnoreList, TranslateOptions, Translator, corral_entry_name,
};

/// Translated program, overwritten on every run
pub const BOOGIE_ARTIFACT: &str = "__SolToBoogieTest_out.bpl";
/// Verifier transcript
pub const BOOGIE_LOG: &str = "boogie.txt";
/// Model checker transcript
pub const CORRAL_LOG: &str = "corral.txt";
/// Counterexample trace Corral leaves in its working directory
pub const CORRAL_TRACE: &str = "corral_out_trace.txt";

const DEFAULT_RECURSION_BOUND: u32 = 4;
/// Solidity has no concurrent interleavings
const CORRAL_CONTEXT_BOUND: u32 = 1;

/// When to look for the counterexample trace viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceViewer {
    /// Only on Windows, where the viewer ships
    #[default]
    Auto,
    Always,
    Never,
}

impl TraceViewer {
    pub fn enabled(self) -> bool {
        match self {
            TraceViewer::Auto => cfg!(windows),
            TraceViewer::Always => true,
            TraceViewer::Never => false,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct VerifyConfig {
    /// Solidity entry file
    pub entry: PathBuf,
    /// Contract whose harness is verified
    pub contract: String,
    pub solc: PathBuf,
    pub boogie: PathBuf,
    pub corral: PathBuf,
    /// Runs the .NET tools, e.g. `mono` or `dotnet`
    pub launcher: Option<PathBuf>,
    /// Depth of calls and reentrancy Corral explores
    pub recursion_bound: u32,
    pub ignore: IgnoreList,
    pub try_proof: bool,
    pub try_refutation: bool,
    /// Per-tool wall clock limit; `None` waits forever
    pub tool_timeout: Option<Duration>,
    /// Where the translated program and transcripts are written
    pub artifact_dir: PathBuf,
    pub trace_viewer: TraceViewer,
    /// Overrides `concurrencyExplorer/ConcurrencyExplorer.exe` next to the executable
    pub viewer_path: Option<PathBuf>,
}

impl VerifyConfig {
    pub fn new(entry: impl Into<PathBuf>, contract: impl Into<String>) -> Self {
        Self {
            entry: entry.into(),
            contract: contract.into(),
            solc: PathBuf::from("solc"),
            boogie: PathBuf::from("boogie"),
            corral: PathBuf::from("corral"),
            launcher: None,
            recursion_bound: DEFAULT_RECURSION_BOUND,
            ignore: IgnoreList::default(),
            try_proof: true,
            try_refutation: true,
            tool_timeout: None,
            artifact_dir: PathBuf::from("."),
            trace_viewer: TraceViewer::Auto,
            viewer_path: None,
        }
    }

    pub fn solc(mut self, path: impl Into<PathBuf>) -> Self {
        self.solc = path.into();
        self
    }

    pub fn boogie(mut self, path: impl Into<PathBuf>) -> Self {
        self.boogie = path.into();
        self
    }

    pub fn corral(mut self, path: impl Into<PathBuf>) -> Self {
        self.corral = path.into();
        self
    }

    pub fn launcher(mut self, launcher: Option<PathBuf>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn recursion_bound(mut self, bound: u32) -> Self {
        self.recursion_bound = bound;
        self
    }

    pub fn ignore(mut self, ignore: IgnoreList) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn try_proof(mut self, enabled: bool) -> Self {
        self.try_proof = enabled;
        self
    }

    pub fn try_refutation(mut self, enabled: bool) -> Self {
        self.try_refutation = enabled;
        self
    }

    pub fn tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = dir.into();
        self
    }

    pub fn trace_viewer(mut self, mode: TraceViewer) -> Self {
        self.trace_viewer = mode;
        self
    }

    pub fn viewer_path(mut self, path: Option<PathBuf>) -> Self {
        self.viewer_path = path;
        self
    }

    pub fn artifact(&self, name: &str) -> PathBuf {
        self.artifact_dir.join(name)
    }
}

/// Pipeline stage, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Translate,
    Proof,
    Refutation,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Compile => "compile",
            Stage::Translate => "translate",
            Stage::Proof => "proof",
            Stage::Refutation => "refutation",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofStage {
    Skipped,
    Proved,
    NotProved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefutationStage {
    Skipped,
    NoCounterexample,
    CounterexampleFound,
}

/// Error stream of one tool run, relayed to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolMessage {
    pub tool: String,
    pub stderr: String,
}

/// Result of a run that got past translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub proof: ProofStage,
    pub refutation: RefutationStage,
    /// Files written, in order
    pub artifacts: Vec<PathBuf>,
    pub tool_messages: Vec<ToolMessage>,
    /// How to view the counterexample, when a viewer is available
    pub trace_hint: Option<String>,
}

impl PipelineOutcome {
    pub fn verified(&self) -> bool {
        self.proof == ProofStage::Proved
            || self.refutation == RefutationStage::NoCounterexample
            || (self.proof == ProofStage::Skipped && self.refutation == RefutationStage::Skipped)
    }

    pub fn exit_code(&self) -> i32 {
        if self.verified() { 0 } else { 1 }
    }
}

/// The verification pipeline with its collaborators
pub struct Pipeline {
    config: VerifyConfig,
    front_end: Box<dyn FrontEnd>,
    translator: Box<dyn Translator>,
    runner: Box<dyn ToolRunner>,
}

impl Pipeline {
    /// Pipeline with the real compiler, translator and process runner
    pub fn new(config: VerifyConfig) -> Self {
        let front_end = SolcCompiler::new(&config.solc).with_timeout(config.tool_timeout);
        Self {
            config,
            front_end: Box::new(front_end),
            translator: Box::new(BoogieTranslator),
            runner: Box::new(ProcessRunner),
        }
    }

    pub fn with_front_end(mut self, front_end: Box<dyn FrontEnd>) -> Self {
        self.front_end = front_end;
        self
    }

    pub fn with_translator(mut self, translator: Box<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_runner(mut self, runner: Box<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn config(&self) -> &VerifyConfig {
        &self.config
    }

    /// Run every enabled stage. Compilation and translation failures come
    /// back as errors; verification verdicts come back in the outcome.
    pub fn run(&self) -> Result<PipelineOutcome> {
        let config = &self.config;
        let mut outcome = PipelineOutcome {
            proof: ProofStage::Skipped,
            refutation: RefutationStage::Skipped,
            artifacts: Vec::new(),
            tool_messages: Vec::new(),
            trace_hint: None,
        };

        let start = Instant::now();
        log_stage(Stage::Compile, config, start);
        let compiled = self.front_end.compile(&config.entry)?;
        for warning in compiled.diagnostics.iter().filter(|d| d.severity != Severity::Error) {
            tracing::warn!(target: "pipeline", stage = %Stage::Compile, "{warning}");
        }
        if compiled.contains_error() {
            compiled.print_errors();
            return Err(VerifyError::Compilation {
                diagnostics: compiled.errors().cloned().collect(),
            });
        }
        let program = compiled
            .program
            .ok_or_else(|| VerifyError::tool("solc", "no AST in compiler output"))?;

        log_stage(Stage::Translate, config, start);
        let options = TranslateOptions {
            target: Some(config.contract.clone()),
            ignore: config.ignore.clone(),
            honor_ignore: true,
        };
        let boogie = self.translator.translate(&program, &options).map_err(|e| {
            tracing::error!(target: "pipeline", stage = %Stage::Translate, error = %e, "translation failed");
            VerifyError::Translation(e)
        })?;

        std::fs::create_dir_all(&config.artifact_dir)?;
        let artifact = config.artifact(BOOGIE_ARTIFACT);
        write_artifact(&artifact, &format!("{}\n", boogie.render()), &mut outcome)?;

        if config.try_proof {
            log_stage(Stage::Proof, config, start);
            let stdout = self.run_tool(self.boogie_invocation(), &mut outcome)?;
            write_artifact(&config.artifact(BOOGIE_LOG), &stdout, &mut outcome)?;

            if verdict::is_proof(&stdout) {
                outcome.proof = ProofStage::Proved;
                log_done(&outcome, start);
                return Ok(outcome);
            }
            outcome.proof = ProofStage::NotProved;
        }

        if config.try_refutation {
            log_stage(Stage::Refutation, config, start);
            let stdout = self.run_tool(self.corral_invocation(), &mut outcome)?;
            write_artifact(&config.artifact(CORRAL_LOG), &stdout, &mut outcome)?;

            if verdict::is_bug_free(&stdout) {
                outcome.refutation = RefutationStage::NoCounterexample;
            } else {
                outcome.refutation = RefutationStage::CounterexampleFound;
                outcome.trace_hint = self.trace_hint()?;
            }
        }

        log_done(&outcome, start);
        Ok(outcome)
    }

    /// `boogie -doModSetAnalysis -inline:assert -noinfer -contractInfer -proc:BoogieEntry_* <bpl>`
    pub fn boogie_invocation(&self) -> Invocation {
        Invocation::new("boogie", &self.config.boogie)
            .args([
                "-doModSetAnalysis",
                "-inline:assert",
                "-noinfer",
                "-contractInfer",
                "-proc:BoogieEntry_*",
                BOOGIE_ARTIFACT,
            ])
            .launcher(self.config.launcher.clone())
            .current_dir(&self.config.artifact_dir)
            .timeout(self.config.tool_timeout)
    }

    /// `corral /recursionBound:<n> /k:1 /main:CorralEntry_<C> /tryCTrace /printDataValues:1 <bpl>`
    pub fn corral_invocation(&self) -> Invocation {
        Invocation::new("corral", &self.config.corral)
            .arg(format!("/recursionBound:{}", self.config.recursion_bound))
            .arg(format!("/k:{CORRAL_CONTEXT_BOUND}"))
            .arg(format!("/main:{}", corral_entry_name(&self.config.contract)))
            .args(["/tryCTrace", "/printDataValues:1", BOOGIE_ARTIFACT])
            .launcher(self.config.launcher.clone())
            .current_dir(&self.config.artifact_dir)
            .timeout(self.config.tool_timeout)
    }

    fn run_tool(&self, invocation: Invocation, outcome: &mut PipelineOutcome) -> Result<String> {
        let output = self.runner.run(&invocation)?;
        if !output.stderr.trim().is_empty() {
            tracing::warn!(target: "pipeline", tool = %invocation.tool, "{}", output.stderr.trim_end());
            outcome.tool_messages.push(ToolMessage {
                tool: invocation.tool.clone(),
                stderr: output.stderr,
            });
        }
        tracing::debug!(tool = %invocation.tool, status = ?output.status, "tool finished");
        Ok(output.stdout)
    }

    /// Locate the trace viewer when it is expected; a missing viewer is fatal
    fn trace_hint(&self) -> Result<Option<String>> {
        if !self.config.trace_viewer.enabled() {
            return Ok(None);
        }
        let viewer = match &self.config.viewer_path {
            Some(path) => path.clone(),
            None => default_viewer_path()?,
        };
        if !viewer.is_file() {
            return Err(VerifyError::MissingAsset { path: viewer });
        }
        Ok(Some(format!(
            "{} {}",
            viewer.display(),
            self.config.artifact(CORRAL_TRACE).display()
        )))
    }
}

fn default_viewer_path() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let dir = exe.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(dir.join("concurrencyExplorer").join("ConcurrencyExplorer.exe"))
}

fn write_artifact(path: &Path, contents: &str, outcome: &mut PipelineOutcome) -> Result<()> {
    std::fs::write(path, contents)?;
    tracing::debug!(target: "pipeline", path = %path.display(), bytes = contents.len(), "artifact written");
    outcome.artifacts.push(path.to_path_buf());
    Ok(())
}

fn log_stage(stage: Stage, config: &VerifyConfig, start: Instant) {
    tracing::info!(
        target: "pipeline",
        stage = %stage,
        contract = %config.contract,
        entry = %config.entry.display(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "stage started"
    );
}

fn log_done(outcome: &PipelineOutcome, start: Instant) {
    tracing::info!(
        target: "pipeline",
        stage = %Stage::Done,
        proof = ?outcome.proof,
        refutation = ?outcome.refutation,
        verified = outcome.verified(),
        elapsed_ms = start.elapsed().as_millis() as u64
    );
}
