//! External tool execution

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{ChildStdin, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::{Result, VerifyError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One tool run: what to start and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Short name for logs and errors (`solc`, `boogie`, `corral`)
    pub tool: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Prepended to the command line when set, e.g. `mono` or `dotnet`
    pub launcher: Option<PathBuf>,
    pub current_dir: Option<PathBuf>,
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new(tool: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            tool: tool.into(),
            program: program.into(),
            args: Vec::new(),
            launcher: None,
            current_dir: None,
            stdin: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn launcher(mut self, launcher: Option<PathBuf>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full command line as it will be spawned
    pub fn command_line(&self) -> Vec<String> {
        let mut line = Vec::with_capacity(self.args.len() + 2);
        if let Some(launcher) = &self.launcher {
            line.push(launcher.display().to_string());
        }
        line.push(self.program.display().to_string());
        line.extend(self.args.iter().cloned());
        line
    }
}

/// Captured result of a finished tool
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the process was terminated by a signal
    pub status: Option<i32>,
}

/// Runs external tools. The pipeline only talks to tools through this seam.
pub trait ToolRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// Spawns real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        let mut cmd = match &invocation.launcher {
            Some(launcher) => {
                let mut cmd = Command::new(launcher);
                cmd.arg(&invocation.program);
                cmd
            }
            None => Command::new(&invocation.program),
        };
        cmd.args(&invocation.args)
            .stdin(if invocation.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.current_dir {
            cmd.current_dir(dir);
        }

        tracing::debug!(tool = %invocation.tool, command = ?invocation.command_line(), "spawning");
        let mut child = cmd
            .spawn()
            .map_err(|e| VerifyError::tool(&invocation.tool, format!("cannot start: {e}")))?;

        // Both pipes are drained while the child runs so neither can fill up,
        // and stdin is fed from its own thread so the deadline still applies
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let stdin = feed(child.stdin.take(), invocation.stdin.clone());

        let status = match invocation.timeout {
            None => child.wait()?,
            Some(limit) => match wait_with_deadline(&mut child, limit)? {
                Some(status) => status,
                None => {
                    tracing::warn!(tool = %invocation.tool, secs = limit.as_secs(), "timed out, killing");
                    child.kill()?;
                    child.wait()?;
                    return Err(VerifyError::ToolTimeout {
                        tool: invocation.tool.clone(),
                        secs: limit.as_secs(),
                    });
                }
            },
        };

        let output = ToolOutput {
            stdout: join(stdout, &invocation.tool)?,
            stderr: join(stderr, &invocation.tool)?,
            status: status.code(),
        };
        join(stdin, &invocation.tool)?;
        Ok(output)
    }
}

fn feed(pipe: Option<ChildStdin>, input: Option<String>) -> JoinHandle<io::Result<()>> {
    thread::spawn(move || {
        let (Some(mut pipe), Some(input)) = (pipe, input) else {
            return Ok(());
        };
        match pipe.write_all(input.as_bytes()) {
            // The tool exited without reading all of its input
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
            other => other,
        }
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> JoinHandle<io::Result<String>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    })
}

fn join<T>(handle: JoinHandle<io::Result<T>>, tool: &str) -> Result<T> {
    let value = handle
        .join()
        .map_err(|_| VerifyError::tool(tool, "pipe thread panicked"))??;
    Ok(value)
}

fn wait_with_deadline(
    child: &mut std::process::Child,
    limit: Duration,
) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
