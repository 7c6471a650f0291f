//! Builder for executing external tool commands with timeout support.
//!
//! Arguments are kept as a vector and handed to the OS verbatim; nothing is
//! ever interpolated through a shell. [`ToolCommand::render`] exists only for
//! logs and error messages.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

/// Default command timeout: 5 minutes.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    /// A successful output with the given stdout and stderr.
    pub fn ok(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    /// A failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human-readable exit status.
    pub fn status(&self) -> String {
        match self.code {
            Some(code) => format!("exit status: {code}"),
            None => "terminated by signal".to_string(),
        }
    }

    /// Everything the process printed, stderr last (ffmpeg writes its
    /// diagnostics there).
    pub fn diagnostics(&self) -> String {
        let mut text = String::with_capacity(self.stdout.len() + self.stderr.len() + 1);
        text.push_str(&self.stdout);
        if !self.stdout.is_empty() && !self.stdout.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use wm_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> wm_core::Result<()> {
/// let output = ToolCommand::new(PathBuf::from("ffprobe"))
///     .arg("/path/to/video.mkv")
///     .args(["-loglevel", "error"])
///     .args(["-select_streams", "a:0"])
///     .args(["-show_entries", "stream=channels"])
///     .args(["-of", "default=nw=1:nk=1"])
///     .execute()
///     .await?;
/// println!("{}", output.stdout.trim());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append a path argument.
    pub fn path_arg(&mut self, p: &Path) -> &mut Self {
        self.args.push(p.to_string_lossy().into_owned());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The program this command runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The argument vector, in order.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Short program name used in error messages.
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string())
    }

    /// Render the command line for logs, quoting arguments that contain
    /// whitespace or quotes.
    pub fn render(&self) -> String {
        let mut out = quote(&self.program.to_string_lossy());
        for a in &self.args {
            out.push(' ');
            out.push_str(&quote(a));
        }
        out
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// A non-zero exit is *not* an error here: callers decide how to classify
    /// it and need the captured diagnostics to do so.
    ///
    /// # Errors
    ///
    /// - Returns [`wm_core::Error::Tool`] if spawning the process fails.
    /// - Returns [`wm_core::Error::Tool`] if the process times out (message
    ///   includes the timeout duration). The child is killed.
    pub async fn execute(&self) -> wm_core::Result<ToolOutput> {
        let program_name = self.program_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(std::process::Stdio::null());
        cmd.stdout(std::process::Stdio::piped());
        cmd.stderr(std::process::Stdio::piped());
        cmd.kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| wm_core::Error::Tool {
            tool: program_name.clone(),
            message: format!("failed to spawn: {e}"),
        })?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output()).await;

        match result {
            Ok(Ok(output)) => Ok(ToolOutput {
                code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            }),
            Ok(Err(e)) => Err(wm_core::Error::Tool {
                tool: program_name,
                message: format!("I/O error waiting for process: {e}"),
            }),
            // The dropped future owns the child; kill_on_drop reaps it.
            Err(_elapsed) => Err(wm_core::Error::Tool {
                tool: program_name,
                message: format!("timed out after {:?}", self.timeout),
            }),
        }
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn quote(arg: &str) -> String {
    if !arg.is_empty()
        && !arg
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '"' || c == '|' || c == ';')
    {
        return arg.to_string();
    }
    format!("'{}'", arg.replace('\'', r"'\''"))
}

/// Seam between the pipeline and real processes.
///
/// The pipeline never spawns directly; it hands fully built commands to a
/// runner. Tests substitute a scripted runner.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run the command to completion and return what it printed.
    async fn run(&self, cmd: &ToolCommand) -> wm_core::Result<ToolOutput>;
}

/// [`ProcessRunner`] that spawns real processes through [`ToolCommand::execute`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, cmd: &ToolCommand) -> wm_core::Result<ToolOutput> {
        tracing::debug!("spawn: {}", cmd.render());
        cmd.execute().await
    }
}
