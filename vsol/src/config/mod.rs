//! `vsol.toml` configuration
//!
//! ```toml
//! [tools]
//! solc = "tools/solc-static-linux"
//! boogie = "tools/BoogieDriver.dll"
//! corral = "tools/corral.dll"
//! launcher = "dotnet"
//!
//! [verification]
//! recursion_bound = 4
//! try_proof = true
//! try_refutation = true
//! timeout_secs = 600
//! trace_viewer = "auto"
//!
//! [artifacts]
//! dir = "."
//! ```
//!
//! Every key is optional. Relative tool and artifact paths are resolved
//! against the directory holding the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, VerifyError};
use crate::pipeline::{TraceViewer, VerifyConfig};

pub const CONFIG_FILE_NAME: &str = "vsol.toml";

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    pub solc: Option<PathBuf>,
    pub boogie: Option<PathBuf>,
    pub corral: Option<PathBuf>,
    pub launcher: Option<PathBuf>,
    pub viewer: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerificationConfig {
    pub recursion_bound: Option<u32>,
    pub try_proof: Option<bool>,
    pub try_refutation: Option<bool>,
    pub timeout_secs: Option<u64>,
    pub trace_viewer: Option<TraceViewer>,
    /// `Contract.method` entries left out of the harness
    #[serde(default)]
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactsConfig {
    pub dir: Option<PathBuf>,
}

impl Config {
    pub fn parse(text: &str, path: &Path) -> Result<Self> {
        let mut config: Config = toml::from_str(text).map_err(|e| VerifyError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if let Some(base) = path.parent() {
            config.rebase(base);
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| VerifyError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&text, path)
    }

    /// `vsol.toml` next to the entry file, if there is one
    pub fn discover(entry: &Path) -> Result<Option<Self>> {
        let dir = entry.parent().unwrap_or(Path::new("."));
        let candidate = dir.join(CONFIG_FILE_NAME);
        if !candidate.is_file() {
            return Ok(None);
        }
        tracing::debug!(path = %candidate.display(), "using configuration file");
        Self::load(&candidate).map(Some)
    }

    /// Fill every setting the file names into `config`. Callers apply
    /// command-line overrides afterwards.
    pub fn apply(&self, mut config: VerifyConfig) -> Result<VerifyConfig> {
        let tools = &self.tools;
        if let Some(solc) = &tools.solc {
            config = config.solc(solc);
        }
        if let Some(boogie) = &tools.boogie {
            config = config.boogie(boogie);
        }
        if let Some(corral) = &tools.corral {
            config = config.corral(corral);
        }
        if tools.launcher.is_some() {
            config = config.launcher(tools.launcher.clone());
        }
        if tools.viewer.is_some() {
            config = config.viewer_path(tools.viewer.clone());
        }

        let verification = &self.verification;
        if let Some(bound) = verification.recursion_bound {
            config = config.recursion_bound(bound);
        }
        if let Some(enabled) = verification.try_proof {
            config = config.try_proof(enabled);
        }
        if let Some(enabled) = verification.try_refutation {
            config = config.try_refutation(enabled);
        }
        if let Some(secs) = verification.timeout_secs {
            config = config.tool_timeout(Some(Duration::from_secs(secs)));
        }
        if let Some(mode) = verification.trace_viewer {
            config = config.trace_viewer(mode);
        }
        for entry in &verification.ignore {
            let method = entry.parse().map_err(VerifyError::Usage)?;
            config.ignore.insert(method);
        }

        if let Some(dir) = &self.artifacts.dir {
            config = config.artifact_dir(dir);
        }
        Ok(config)
    }

    fn rebase(&mut self, base: &Path) {
        let rebase = |p: &mut Option<PathBuf>| {
            if let Some(path) = p {
                // Bare names are looked up on PATH
                if path.is_relative() && path.components().count() > 1 {
                    *path = base.join(&*path);
                }
            }
        };
        rebase(&mut self.tools.solc);
        rebase(&mut self.tools.boogie);
        rebase(&mut self.tools.corral);
        rebase(&mut self.tools.launcher);
        rebase(&mut self.tools.viewer);

        if let Some(dir) = &mut self.artifacts.dir {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}
