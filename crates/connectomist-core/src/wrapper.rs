//! Command execution: the Connectomist executable and the PTK tools.
//!
//! Every external call goes through a [`CommandRunner`], so the preprocessing
//! and tractography steps can be driven by a real process runner in
//! production and by a scripted runner in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::{Arc, LazyLock};
//! use connectomist_core::{Connectomist, ProcessRunner};
//!
//! let runner = Arc::new(ProcessRunner::new());
//! let connectomist = Connectomist::connect("/opt/ptk/bin/connectomist", runner).await?;
//! connectomist.run_tab("DWI-Outlier-Detection", &parameters, &outdir).await?;
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;

use crate::error::{Error, Result};
use crate::params::{ParameterSet, create_parameter_file};

/// Location of the Connectomist launcher on the NeuroSpin cluster.
pub const DEFAULT_CONNECTOMIST_PATH: &str = "/i2bm/local/Ubuntu-14.04-x86_64/ptk/bin/connectomist";

/// The PTK release the wrappers were validated against.
pub const SUPPORTED_PTK_RELEASE: &str = "5.0";

static PTK_RELEASE_RE: LazyLock<std::result::Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"PTK_RELEASE=(.*)\n"));

/// Algorithm name reported in errors raised by PTK tools.
pub const PTK_ALGORITHM: &str = "PTK";

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// A successful run with the given standard output.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and standard error.
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Returns `true` when the command exited with status 0.
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` to completion and captures its output.
    ///
    /// A non-zero exit status is not an error at this level; an error means
    /// the program could not be started at all.
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// Runs commands as child processes of the current one.
///
/// Children inherit the current environment, plus any variables added with
/// [`with_env`](Self::with_env).
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    env: BTreeMap<String, String>,
}

impl ProcessRunner {
    /// Creates a runner inheriting the current environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an environment variable for every spawned command.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Adds several environment variables.
    pub fn with_envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env
            .extend(vars.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        tracing::debug!(program, ?args, "Spawning command");
        let output = tokio::process::Command::new(program)
            .args(args)
            .envs(&self.env)
            .output()
            .await?;
        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads the PTK release declared by a Connectomist launcher script.
///
/// The launcher must be a file with a `PTK_RELEASE=<version>` line. A release
/// other than [`SUPPORTED_PTK_RELEASE`] is accepted with a warning.
pub fn connectomist_version(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(Error::config(format!(
            "'{}' is not a valid file, can't configure Connectomist.",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
    let release_re = (*PTK_RELEASE_RE)
        .as_ref()
        .map_err(|e| Error::config(e.to_string()))?;
    let version = release_re
        .captures(&content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            Error::config(format!(
                "Can't detect 'PTK_RELEASE' version from configuration file '{}'. \
                 You have not provided a valid configuration file.",
                path.display()
            ))
        })?;
    if version != SUPPORTED_PTK_RELEASE {
        tracing::warn!(
            installed = %version,
            supported = SUPPORTED_PTK_RELEASE,
            "Installed Connectomist version not tested"
        );
    }
    Ok(version)
}

/// A configured Connectomist installation.
#[derive(Clone)]
pub struct Connectomist {
    path: PathBuf,
    release: String,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for Connectomist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connectomist")
            .field("path", &self.path)
            .field("release", &self.release)
            .finish_non_exhaustive()
    }
}

impl Connectomist {
    /// Checks the launcher at `path` and makes sure it answers `--help`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the launcher has no PTK release and
    /// [`Error::CommandNotFound`] when it cannot be executed.
    pub async fn connect(
        path: impl Into<PathBuf>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self> {
        let path = path.into();
        let release = connectomist_version(&path)?;
        let program = path.to_string_lossy().into_owned();
        let configured = runner
            .run(&program, &["--help".to_string()])
            .await
            .map(|out| out.is_success())
            .unwrap_or(false);
        if !configured {
            return Err(Error::CommandNotFound { command: program });
        }
        tracing::debug!(path = %path.display(), release = %release, "Connectomist configured");
        Ok(Self {
            path,
            release,
            runner,
        })
    }

    /// Path of the launcher.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// PTK release declared by the launcher.
    pub fn release(&self) -> &str {
        &self.release
    }

    /// The runner used for Connectomist and PTK calls.
    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    /// PTK tools sharing this installation's runner.
    pub fn ptk(&self) -> Ptk {
        Ptk::new(self.runner())
    }

    /// Runs a tab from an existing parameter file.
    pub async fn run(&self, algorithm: &str, parameter_file: &Path) -> Result<CommandOutput> {
        let program = self.path.to_string_lossy().into_owned();
        let args = vec![
            "-p".to_string(),
            algorithm.to_string(),
            "-f".to_string(),
            parameter_file.to_string_lossy().into_owned(),
        ];
        tracing::info!(algorithm, parameter_file = %parameter_file.display(), "Running Connectomist");
        let output = self.runner.run(&program, &args).await?;
        if !output.is_success() {
            return Err(Error::Runtime {
                algorithm: algorithm.to_string(),
                command: command_line(&program, &args),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// Writes the parameter file of a tab in `outdir` and runs it.
    ///
    /// Returns the path of the parameter file.
    pub async fn run_tab(
        &self,
        algorithm: &str,
        parameters: &ParameterSet,
        outdir: &Path,
    ) -> Result<PathBuf> {
        let parameter_file = create_parameter_file(algorithm, parameters, outdir)?;
        self.run(algorithm, &parameter_file).await?;
        Ok(parameter_file)
    }
}

/// Runner for the PTK command line tools (`PtkCat`, `PtkSubVolume`, ...).
#[derive(Clone)]
pub struct Ptk {
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for Ptk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ptk").finish_non_exhaustive()
    }
}

impl Ptk {
    /// Creates PTK tools backed by `runner`.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Checks that the tool is on the `PATH`.
    pub async fn locate(&self, tool: &str) -> Result<()> {
        let found = self
            .runner
            .run("which", &[tool.to_string()])
            .await
            .map(|out| out.is_success())
            .unwrap_or(false);
        if found {
            Ok(())
        } else {
            Err(Error::CommandNotFound {
                command: tool.to_string(),
            })
        }
    }

    /// Locates `tool` and runs it with `args`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CommandNotFound`] when the tool is not installed and
    /// [`Error::Runtime`] when it exits with a non-zero status.
    pub async fn run(&self, tool: &str, args: &[String]) -> Result<CommandOutput> {
        self.locate(tool).await?;
        tracing::debug!(tool, "Running PTK tool");
        let output = self.runner.run(tool, args).await?;
        if !output.is_success() {
            return Err(Error::Runtime {
                algorithm: PTK_ALGORITHM.to_string(),
                command: command_line(tool, args),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }
}
