use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::types::ExecutionResult;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Runs proposed commands one at a time. The working directory is owned by
/// the executor so `cd` affects every later command of the session.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    working_directory: PathBuf,
    timeout: Duration,
    shell: String,
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolExecutor {
    pub fn new() -> Self {
        Self {
            working_directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/")),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            shell: detect_shell(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn set_working_directory(&mut self, path: PathBuf) {
        self.working_directory = path;
        info!("Changed working directory to: {}", self.working_directory.display());
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Executes one command. Failures are reported in the returned text and
    /// status, never as an error.
    pub async fn execute(&mut self, command: &str) -> ExecutionResult {
        let command = command.trim();

        if let Some(target) = cd_target(command) {
            return self.change_directory(command, target);
        }

        self.run_shell_command(command).await
    }

    fn change_directory(&mut self, command: &str, target: &str) -> ExecutionResult {
        let target = if target.is_empty() { "~" } else { target };

        match self.resolve_directory(target) {
            Ok(dir) => {
                self.set_working_directory(dir);
                ExecutionResult::success(
                    command,
                    format!(
                        "(Working directory changed to: {})",
                        self.working_directory.display()
                    ),
                )
            }
            Err(e) => {
                warn!("cd to '{}' failed: {}", target, e);
                ExecutionResult::warning(command, format!("Error in 'cd': {}", e))
            }
        }
    }

    fn resolve_directory(&self, target: &str) -> std::io::Result<PathBuf> {
        let expanded = expand_tilde(target)?;
        let candidate = if expanded.is_absolute() {
            expanded
        } else {
            self.working_directory.join(expanded)
        };

        let resolved = std::fs::canonicalize(&candidate).map_err(|e| {
            std::io::Error::new(e.kind(), format!("{}: {}", candidate.display(), e))
        })?;

        if !resolved.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("{}: Not a directory", candidate.display()),
            ));
        }

        // Entering a directory needs search permission; probing it here keeps
        // the working directory unchanged when the shell could not use it.
        std::fs::read_dir(&resolved).map_err(|e| {
            std::io::Error::new(e.kind(), format!("{}: {}", candidate.display(), e))
        })?;

        Ok(resolved)
    }

    async fn run_shell_command(&self, command: &str) -> ExecutionResult {
        info!("Executing shell command: {}", command);

        let mut cmd = TokioCommand::new(&self.shell);
        cmd.args(shell_args(&self.shell))
            .arg(command)
            .current_dir(&self.working_directory)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("Failed to spawn '{}' via {}: {}", command, self.shell, e);
                return ExecutionResult::warning(command, format!("Execution error: {}", e));
            }
        };

        // Dropping the pending future on timeout drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Waiting for '{}' failed: {}", command, e);
                return ExecutionResult::warning(command, format!("Execution error: {}", e));
            }
            Err(_) => {
                warn!("Command '{}' timed out after {:?}", command, self.timeout);
                return ExecutionResult::timeout(command);
            }
        };

        let stdout = strip_ansi_codes(&String::from_utf8_lossy(&output.stdout));
        let stderr = strip_ansi_codes(&String::from_utf8_lossy(&output.stderr));
        let combined = format!("{}\n{}", stdout.trim(), stderr.trim());
        let combined = combined.trim();

        debug!(
            "Command '{}' exited with {:?}, {} bytes of output",
            command,
            output.status.code(),
            combined.len()
        );

        if combined.is_empty() {
            ExecutionResult::success(command, "(Command executed, no output)")
        } else {
            ExecutionResult::ok(command, combined)
        }
    }
}

/// Returns the directory argument when the command is the `cd` pseudo-command.
fn cd_target(command: &str) -> Option<&str> {
    if command == "cd" {
        return Some("");
    }
    command.strip_prefix("cd ").map(str::trim)
}

fn expand_tilde(path: &str) -> std::io::Result<PathBuf> {
    let rest = if path == "~" {
        ""
    } else if let Some(rest) = path.strip_prefix("~/") {
        rest
    } else {
        return Ok(PathBuf::from(path));
    };

    let home = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "home directory is not known")
    })?;
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

fn detect_shell() -> String {
    if cfg!(target_os = "windows") {
        return "cmd".to_string();
    }
    std::env::var("SHELL")
        .ok()
        .filter(|shell| !shell.trim().is_empty())
        .unwrap_or_else(|| "sh".to_string())
}

fn shell_args(shell: &str) -> &'static [&'static str] {
    let name = Path::new(shell)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(shell);
    match name {
        "cmd" => &["/C"],
        "powershell" | "pwsh" => &["-NoProfile", "-Command"],
        _ => &["-c"],
    }
}

pub fn strip_ansi_codes(text: &str) -> String {
    static ANSI_REGEX: OnceLock<Regex> = OnceLock::new();

    let regex = ANSI_REGEX.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]|\x1b\][^\x07]*\x07").expect("static regex is valid")
    });

    regex.replace_all(text, "").to_string()
}
