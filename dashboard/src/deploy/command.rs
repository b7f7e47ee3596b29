//! Command executor
//!
//! Every external program the dashboard runs (git, npm, pm2, tail, ...) goes
//! through a [`CommandRunner`]. The rendered command line is checked against
//! an allow-list and a set of shell metacharacters before anything runs, and
//! the program itself is spawned with an argument vector, never via a shell.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::storage::settings::ExecutorSettings;

/// Substrings rejected anywhere in a command line
pub const DANGEROUS_PATTERNS: [&str; 6] = [";", "&&", "||", "|", "`", "$("];

/// A program invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub required_prefix: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            required_prefix: None,
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

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// The command line must start with `prefix`
    pub fn require_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.required_prefix = Some(prefix.into());
        self
    }

    /// `program arg1 arg2 ...`
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Outcome of a command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub error: Option<String>,
}

impl ExecResult {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Best description of a failure: the error, else stderr
    pub fn diagnostic(&self) -> Option<String> {
        self.error
            .clone()
            .or_else(|| non_empty(&self.stderr))
    }

    /// Like [`diagnostic`](Self::diagnostic) but falls back to stdout, which
    /// is where build tools tend to print their errors
    pub fn verbose_diagnostic(&self) -> Option<String> {
        self.diagnostic().or_else(|| non_empty(&self.stdout))
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Check a command line before it is run
pub fn validate_command_line(
    line: &str,
    required_prefix: Option<&str>,
    allowed: &[String],
) -> Result<(), String> {
    let line = line.trim();
    let first = line.split_whitespace().next().unwrap_or("");

    if let Some(prefix) = required_prefix {
        if !line.starts_with(prefix) {
            return Err(format!("Command must start with {}", prefix));
        }
    }

    if !allowed.iter().any(|c| c == first) && !first.starts_with("sudo") {
        return Err(format!("Command '{}' is not allowed", first));
    }

    for pattern in DANGEROUS_PATTERNS {
        let allowed_by_prefix = required_prefix.is_some_and(|p| p.contains(pattern));
        if line.contains(pattern) && !allowed_by_prefix {
            return Err("Command contains potentially dangerous characters".to_string());
        }
    }

    Ok(())
}

/// Runs external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> ExecResult;
}

/// Executor limits
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    pub timeout: Duration,
    pub max_output_bytes: usize,
    pub allowed_commands: Vec<String>,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        ExecutorSettings::default().into()
    }
}

impl From<ExecutorSettings> for ExecutorOptions {
    fn from(settings: ExecutorSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_secs),
            max_output_bytes: settings.max_output_bytes,
            allowed_commands: settings.allowed_commands,
        }
    }
}

/// [`CommandRunner`] backed by real processes
#[derive(Debug, Clone, Default)]
pub struct CommandExecutor {
    options: ExecutorOptions,
}

enum CollectError {
    Io(std::io::Error),
    OutputLimit(&'static str),
}

struct Collected {
    status: std::process::ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl CommandExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl CommandRunner for CommandExecutor {
    async fn run(&self, spec: &CommandSpec) -> ExecResult {
        let line = spec.command_line();

        if let Err(reason) = validate_command_line(
            &line,
            spec.required_prefix.as_deref(),
            &self.options.allowed_commands,
        ) {
            warn!("Rejected command `{}`: {}", line, reason);
            return ExecResult::failed(reason);
        }

        debug!("Running `{}`", line);

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => return ExecResult::failed(format!("Failed to run {}: {}", line, e)),
        };

        let outcome = timeout(
            self.options.timeout,
            collect(&mut child, self.options.max_output_bytes),
        )
        .await;

        match outcome {
            Err(_) => {
                let _ = child.start_kill();
                ExecResult::failed(format!(
                    "Command timed out after {}s: {}",
                    self.options.timeout.as_secs(),
                    line
                ))
            }
            Ok(Err(CollectError::OutputLimit(stream))) => {
                let _ = child.start_kill();
                ExecResult::failed(format!("{} maxBuffer length exceeded: {}", stream, line))
            }
            Ok(Err(CollectError::Io(e))) => {
                let _ = child.start_kill();
                ExecResult::failed(format!("Failed to run {}: {}", line, e))
            }
            Ok(Ok(collected)) => {
                let stdout = String::from_utf8_lossy(&collected.stdout).trim().to_string();
                let stderr = String::from_utf8_lossy(&collected.stderr).trim().to_string();
                if collected.status.success() {
                    ExecResult {
                        success: true,
                        stdout,
                        stderr,
                        error: None,
                    }
                } else {
                    let mut error = format!("Command failed: {}", line);
                    if !stderr.is_empty() {
                        error.push('\n');
                        error.push_str(&stderr);
                    }
                    ExecResult {
                        success: false,
                        stdout,
                        stderr,
                        error: Some(error),
                    }
                }
            }
        }
    }
}

async fn collect(child: &mut Child, limit: usize) -> Result<Collected, CollectError> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr) = tokio::join!(read_capped(stdout, limit), read_capped(stderr, limit));
    let (stdout, stdout_over) = stdout.map_err(CollectError::Io)?;
    let (stderr, stderr_over) = stderr.map_err(CollectError::Io)?;
    if stdout_over {
        return Err(CollectError::OutputLimit("stdout"));
    }
    if stderr_over {
        return Err(CollectError::OutputLimit("stderr"));
    }

    let status = child.wait().await.map_err(CollectError::Io)?;
    Ok(Collected {
        status,
        stdout,
        stderr,
    })
}

/// Read at most `limit` bytes; the flag reports whether more were available
async fn read_capped<R>(pipe: Option<R>, limit: usize) -> std::io::Result<(Vec<u8>, bool)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        pipe.take((limit as u64).saturating_add(1)).read_to_end(&mut buf).await?;
    }
    let over = buf.len() > limit;
    buf.truncate(limit);
    Ok((buf, over))
}
