//! vsol CLI

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use vsol::compiler::{FrontEnd, SolcCompiler, solc_name_for_platform};
use vsol::config::Config;
use vsol::logging::{LogLevel, init_logging};
use vsol::pipeline::{Pipeline, ProofStage, RefutationStage, VerifyConfig};
use vsol::translate::{BoogieTranslator, IgnoredMethod, TranslateOptions, Translator};
use vsol::{Program, Result, VerifyError};

#[derive(Parser)]
#[command(name = "vsol", version, about = "Solidity verifier: Boogie proofs and Corral counterexamples")]
struct Cli {
    /// Log verbosity (RUST_LOG overrides)
    #[arg(long, global = true, default_value = "warn")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify a contract: try a proof, then search for a counterexample
    Verify {
        /// Solidity entry file
        entry: PathBuf,
        /// Contract to verify
        contract: String,
        #[arg(long)]
        solc: Option<PathBuf>,
        #[arg(long)]
        boogie: Option<PathBuf>,
        #[arg(long)]
        corral: Option<PathBuf>,
        /// Runs the verifier binaries, e.g. mono or dotnet
        #[arg(long)]
        launcher: Option<PathBuf>,
        /// Transactions (and reentrancy depth) Corral explores
        #[arg(long)]
        recursion_bound: Option<u32>,
        /// Leave Contract.method out of the harness (repeatable)
        #[arg(long = "ignore", value_name = "CONTRACT.METHOD")]
        ignore: Vec<IgnoredMethod>,
        /// Skip the Boogie proof attempt
        #[arg(long)]
        no_proof: bool,
        /// Skip the Corral counterexample search
        #[arg(long)]
        no_refutation: bool,
        /// Kill a tool that runs longer than this
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Where the .bpl file and tool transcripts go
        #[arg(long)]
        artifact_dir: Option<PathBuf>,
        /// Configuration file (default: vsol.toml next to the entry file)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Translate a Solidity file to Boogie with the solc bundled in WORKDIR/Tool
    Translate {
        /// Solidity entry file
        entry: PathBuf,
        /// Directory containing Tool/<solc>
        workdir: PathBuf,
        /// Output .bpl file
        out: PathBuf,
        /// Use this solc instead of the bundled one
        #[arg(long)]
        solc: Option<PathBuf>,
    },
    /// Compile and dump the AST model (debug)
    Ast {
        /// Solidity entry file
        entry: PathBuf,
        #[arg(long, default_value = "solc")]
        solc: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let result = match cli.command {
        Command::Verify {
            entry,
            contract,
            solc,
            boogie,
            corral,
            launcher,
            recursion_bound,
            ignore,
            no_proof,
            no_refutation,
            timeout_secs,
            artifact_dir,
            config,
        } => {
            let overrides = Overrides {
                solc,
                boogie,
                corral,
                launcher,
                recursion_bound,
                ignore,
                no_proof,
                no_refutation,
                timeout_secs,
                artifact_dir,
            };
            verify(entry, contract, config.as_deref(), overrides)
        }
        Command::Translate {
            entry,
            workdir,
            out,
            solc,
        } => translate_file(&entry, &workdir, &out, solc),
        Command::Ast { entry, solc } => dump_ast(&entry, &solc),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(VerifyError::Compilation { .. }) => {
            // Diagnostics are already on stderr
            eprintln!("Error: compilation failed");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

/// Command-line settings that win over the configuration file
struct Overrides {
    solc: Option<PathBuf>,
    boogie: Option<PathBuf>,
    corral: Option<PathBuf>,
    launcher: Option<PathBuf>,
    recursion_bound: Option<u32>,
    ignore: Vec<IgnoredMethod>,
    no_proof: bool,
    no_refutation: bool,
    timeout_secs: Option<u64>,
    artifact_dir: Option<PathBuf>,
}

fn verify(entry: PathBuf, contract: String, config_path: Option<&Path>, cli: Overrides) -> Result<i32> {
    let file_config = match config_path {
        Some(path) => Some(Config::load(path)?),
        None => Config::discover(&entry)?,
    };

    let mut config = VerifyConfig::new(entry, contract);
    if let Some(file_config) = &file_config {
        config = file_config.apply(config)?;
    }

    if let Some(solc) = cli.solc {
        config = config.solc(solc);
    }
    if let Some(boogie) = cli.boogie {
        config = config.boogie(boogie);
    }
    if let Some(corral) = cli.corral {
        config = config.corral(corral);
    }
    if cli.launcher.is_some() {
        config = config.launcher(cli.launcher);
    }
    if let Some(bound) = cli.recursion_bound {
        config = config.recursion_bound(bound);
    }
    if cli.no_proof {
        config = config.try_proof(false);
    }
    if cli.no_refutation {
        config = config.try_refutation(false);
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.tool_timeout(Some(Duration::from_secs(secs)));
    }
    if let Some(dir) = cli.artifact_dir {
        config = config.artifact_dir(dir);
    }
    for method in cli.ignore {
        config.ignore.insert(method);
    }

    let recursion_bound = config.recursion_bound;
    let outcome = Pipeline::new(config).run()?;

    for message in &outcome.tool_messages {
        eprintln!("{}: {}", message.tool, message.stderr.trim_end());
    }
    match outcome.proof {
        ProofStage::Proved => println!("*** Proof found! Formal verification successful"),
        ProofStage::NotProved => println!("*** Did not find a proof"),
        ProofStage::Skipped => {}
    }
    match outcome.refutation {
        RefutationStage::NoCounterexample => println!(
            "*** Formal verification successful up to {recursion_bound} transactions"
        ),
        RefutationStage::CounterexampleFound => {
            println!("*** Found a counterexample (see corral_out_trace.txt)")
        }
        RefutationStage::Skipped => {}
    }
    if let Some(hint) = &outcome.trace_hint {
        println!("[To view the trace] {hint}");
    }
    for artifact in &outcome.artifacts {
        tracing::info!(path = %artifact.display(), "artifact");
    }

    Ok(outcome.exit_code())
}

fn compile(solc: &Path, entry: &Path) -> Result<Program> {
    let output = SolcCompiler::new(solc).compile(entry)?;
    if output.contains_error() {
        output.print_errors();
        return Err(VerifyError::Compilation {
            diagnostics: output.errors().cloned().collect(),
        });
    }
    output
        .program
        .ok_or_else(|| VerifyError::tool("solc", "no AST in compiler output"))
}

fn translate_file(entry: &Path, workdir: &Path, out: &Path, solc: Option<PathBuf>) -> Result<i32> {
    let solc = match solc {
        Some(path) => path,
        None => workdir.join("Tool").join(solc_name_for_platform()?),
    };
    if !solc.is_file() {
        return Err(VerifyError::MissingAsset { path: solc });
    }

    let program = compile(&solc, entry)?;
    let boogie = BoogieTranslator.translate(&program, &TranslateOptions::default())?;
    std::fs::write(out, format!("{}\n", boogie.render()))?;
    println!("Wrote {}", out.display());
    Ok(0)
}

fn dump_ast(entry: &Path, solc: &Path) -> Result<i32> {
    let program = compile(solc, entry)?;
    println!("{}", serde_json::to_string_pretty(&program)?);
    Ok(0)
}
