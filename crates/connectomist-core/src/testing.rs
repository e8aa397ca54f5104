//! A scripted [`CommandRunner`] for tests.
//!
//! The runner records every invocation and answers with a successful empty
//! output unless a rule matches. Rules can create the files the real tool
//! would have written, so the wrappers' follow-up steps can run.
//!
//! ```rust,ignore
//! let runner = ScriptedRunner::new()
//!     .without_tool("PtkCat")
//!     .on_args("-p", |_, args| {
//!         std::fs::write(arg_after(args, "-f").unwrap().replace(".py", ".done"), "")?;
//!         Ok(CommandOutput::success(""))
//!     });
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::wrapper::{CommandOutput, CommandRunner};

type Handler = Box<dyn Fn(&str, &[String]) -> Result<CommandOutput> + Send + Sync>;

enum Matcher {
    Program(String),
    Arg(String),
}

impl Matcher {
    fn matches(&self, program: &str, args: &[String]) -> bool {
        match self {
            Matcher::Program(name) => program == name,
            Matcher::Arg(arg) => args.iter().any(|a| a == arg),
        }
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program name or path
    pub program: String,
    /// Arguments, in order
    pub args: Vec<String>,
}

/// Records commands and replays scripted answers.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Vec<(Matcher, Handler)>,
    missing_tools: BTreeSet<String>,
    calls: Mutex<Vec<Invocation>>,
}

impl std::fmt::Debug for ScriptedRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedRunner")
            .field("rules", &self.rules.len())
            .field("missing_tools", &self.missing_tools)
            .finish_non_exhaustive()
    }
}

impl ScriptedRunner {
    /// Creates a runner where every command succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers calls to `program` with `handler`.
    pub fn on_program<F>(mut self, program: &str, handler: F) -> Self
    where
        F: Fn(&str, &[String]) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        self.rules
            .push((Matcher::Program(program.to_string()), Box::new(handler)));
        self
    }

    /// Answers calls having `arg` among their arguments with `handler`.
    pub fn on_args<F>(mut self, arg: &str, handler: F) -> Self
    where
        F: Fn(&str, &[String]) -> Result<CommandOutput> + Send + Sync + 'static,
    {
        self.rules
            .push((Matcher::Arg(arg.to_string()), Box::new(handler)));
        self
    }

    /// Makes `which <tool>` fail.
    pub fn without_tool(mut self, tool: &str) -> Self {
        self.missing_tools.insert(tool.to_string());
        self
    }

    /// Every call made so far.
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Calls made to `program`.
    pub fn calls_to(&self, program: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|call| call.program == program)
            .collect()
    }

    /// Connectomist tabs run so far, in order (the value after `-p`).
    pub fn algorithms(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|call| arg_after(&call.args, "-p").map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(Invocation {
                program: program.to_string(),
                args: args.to_vec(),
            });
        }
        if program == "which" {
            let missing = args.iter().any(|tool| self.missing_tools.contains(tool));
            return Ok(if missing {
                CommandOutput::failure(1, "")
            } else {
                CommandOutput::success(args.join("\n"))
            });
        }
        match self
            .rules
            .iter()
            .find(|(matcher, _)| matcher.matches(program, args))
        {
            Some((_, handler)) => handler(program, args),
            None => Ok(CommandOutput::success("")),
        }
    }
}

/// The argument following `flag`, if any.
pub fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Writes a minimal single-file NIfTI-1 header (`n+1`, float32) with the
/// given dimensions and no voxel data.
pub fn write_nifti_header(path: &Path, dims: &[u16]) -> Result<()> {
    let mut bytes = vec![0u8; 352];
    bytes[0..4].copy_from_slice(&348i32.to_le_bytes());
    let mut dim = [1u16; 8];
    dim[0] = dims.len() as u16;
    for (i, d) in dims.iter().take(7).enumerate() {
        dim[i + 1] = *d;
    }
    for (i, d) in dim.iter().enumerate() {
        bytes[40 + 2 * i..42 + 2 * i].copy_from_slice(&d.to_le_bytes());
    }
    // datatype float32, 32 bits per voxel
    bytes[70..72].copy_from_slice(&16i16.to_le_bytes());
    bytes[72..74].copy_from_slice(&32i16.to_le_bytes());
    for i in 0..8 {
        bytes[76 + 4 * i..80 + 4 * i].copy_from_slice(&1.0f32.to_le_bytes());
    }
    bytes[108..112].copy_from_slice(&352.0f32.to_le_bytes());
    bytes[344..348].copy_from_slice(b"n+1\0");
    std::fs::write(path, bytes).map_err(|e| Error::io_with_path(e, path))
}
