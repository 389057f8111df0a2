//! Remote command execution.
//!
//! A `RemoteExecutor` runs a target's command and hands back stdout, the exit
//! status and stderr. A failing remote command is reported through the exit
//! status only; `Err` is reserved for failing to launch the local process.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

use crate::sample::Target;

/// Exit status used when a process was terminated by a signal.
pub const SIGNAL_EXIT_STATUS: i32 = -1;

/// Raw output of one remote command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub status: i32,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Runs a command against a remote target and blocks until it completes.
pub trait RemoteExecutor: Send + Sync {
    fn execute(&self, target: &Target) -> io::Result<CommandOutput> {
        self.run(&target.name, &target.command)
    }

    /// Runs an arbitrary command on behalf of `target_name`.
    fn run(&self, target_name: &str, command: &str) -> io::Result<CommandOutput>;
}

/// Executes commands through the local shell (`sh -c`), which in turn reaches
/// the remote side through `ssh`, `docker`, `rancher` or similar.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: PathBuf,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
        }
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl RemoteExecutor for ShellExecutor {
    fn run(&self, target_name: &str, command: &str) -> io::Result<CommandOutput> {
        debug!("Running command for {}: {}", target_name, command);

        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .output()?;

        Ok(CommandOutput {
            stdout: output.stdout,
            status: output.status.code().unwrap_or(SIGNAL_EXIT_STATUS),
            stderr: output.stderr,
        })
    }
}

/// Maps a target name to a file name usable inside a replay directory.
pub fn replay_file_name(target_name: &str) -> String {
    let safe: String = target_name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}.out")
}

/// Serves previously captured output from `<dir>/<target>.out` instead of
/// contacting remote hosts.
#[derive(Debug, Clone)]
pub struct ReplayExecutor {
    dir: PathBuf,
}

impl ReplayExecutor {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, target_name: &str) -> PathBuf {
        self.dir.join(replay_file_name(target_name))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RemoteExecutor for ReplayExecutor {
    fn run(&self, target_name: &str, _command: &str) -> io::Result<CommandOutput> {
        let path = self.path_for(target_name);
        debug!("Replaying output for {} from {}", target_name, path.display());

        match fs::read(&path) {
            Ok(stdout) => Ok(CommandOutput {
                stdout,
                status: 0,
                stderr: Vec::new(),
            }),
            Err(e) => Ok(CommandOutput {
                stdout: Vec::new(),
                status: 1,
                stderr: format!("cannot read {}: {}", path.display(), e).into_bytes(),
            }),
        }
    }
}
