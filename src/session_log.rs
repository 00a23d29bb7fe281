use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const LOG_FILE_NAME: &str = "session_log.txt";

/// Receives every executed command together with what it printed.
pub trait CommandLog {
    fn record(&mut self, cwd: &Path, command: &str, output: &str) -> Result<()>;
}

/// Appends commands to `<log_dir>/session_log.txt`.
#[derive(Debug, Clone)]
pub struct FileCommandLog {
    path: PathBuf,
}

impl FileCommandLog {
    pub fn open(log_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Could not create log directory {}", log_dir.display()))?;
        Ok(Self {
            path: log_dir.join(LOG_FILE_NAME),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CommandLog for FileCommandLog {
    fn record(&mut self, cwd: &Path, command: &str, output: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Could not open {}", self.path.display()))?;

        write!(file, "[{}] > {}\n{}\n---\n", cwd.display(), command, output)
            .with_context(|| format!("Could not write to {}", self.path.display()))?;

        debug!("Logged command '{}' to {}", command, self.path.display());
        Ok(())
    }
}

/// Discards everything; used when no log directory is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCommandLog;

impl CommandLog for NullCommandLog {
    fn record(&mut self, _cwd: &Path, _command: &str, _output: &str) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_log_appends_entries() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");
        let mut log = FileCommandLog::open(&log_dir).unwrap();

        log.record(Path::new("/home/me"), "ls", "a\nb").unwrap();
        log.record(Path::new("/tmp"), "pwd", "/tmp").unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            content,
            "[/home/me] > ls\na\nb\n---\n[/tmp] > pwd\n/tmp\n---\n"
        );
    }

    #[test]
    fn test_unwritable_log_reports_error() {
        let temp_dir = TempDir::new().unwrap();
        let mut log = FileCommandLog::open(temp_dir.path()).unwrap();
        // a directory where the log file should be makes every write fail
        std::fs::create_dir(log.path()).unwrap();

        assert!(log.record(Path::new("/"), "ls", "x").is_err());
    }
}
