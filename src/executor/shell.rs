//! Shell execution
//!
//! Runs commands through `sh -c` (or a program with explicit arguments),
//! capturing output and mapping nonzero exits to [`CommandError`].
//!
//! ## Variable Expansion
//!
//! Variables are expanded using the `${VAR}` syntax before the command is
//! handed to the shell:
//!
//! ```rust
//! use std::collections::HashMap;
//! use groovylint_ci::expand_variables;
//!
//! let env = HashMap::from([("WORKSPACE".to_string(), "/src".to_string())]);
//! assert_eq!(expand_variables("ls ${WORKSPACE}", &env), "ls /src");
//! ```
//!
//! ## Pipeline Variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `WORKSPACE` | Repository checkout directory |
//! | `BRANCH_NAME` | Normalized branch being built |
//! | `BUILD_ID` | Run identifier (UUID) |

use crate::pipeline::CommandError;
use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Shell execution configuration
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Working directory
    pub cwd: PathBuf,

    /// Environment variables
    pub env: HashMap<String, String>,

    /// Shell to use (default: sh)
    pub shell: String,

    /// Timeout for commands (None = no timeout)
    pub timeout: Option<Duration>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            cwd: env::current_dir().unwrap_or_default(),
            env: HashMap::new(),
            shell: "sh".to_string(),
            timeout: None,
        }
    }
}

/// Result of shell command execution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellResult {
    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Exit code
    pub exit_code: i32,

    /// Duration of execution
    pub duration: Duration,
}

impl ShellResult {
    /// Returns true if command succeeded (exit code 0)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Builder for shell commands
#[derive(Debug, Clone)]
pub struct ShellCommand<'a> {
    config: &'a ShellConfig,
    env_override: HashMap<String, String>,
}

impl<'a> ShellCommand<'a> {
    /// Creates a new shell command builder
    #[must_use]
    pub fn new(config: &'a ShellConfig) -> Self {
        Self {
            config,
            env_override: HashMap::new(),
        }
    }

    /// Adds environment variables for this command only
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_override.insert(key.into(), value.into());
        self
    }

    /// Executes a command line through the configured shell
    ///
    /// # Errors
    ///
    /// Returns [`CommandError`] if the shell cannot be started, the
    /// command exits nonzero, or the timeout elapses.
    pub async fn execute(&self, command: &str) -> Result<ShellResult, CommandError> {
        let expanded = expand_variables(command, &self.merged_env());

        let mut cmd = Command::new(&self.config.shell);
        cmd.arg("-c").arg(&expanded);

        self.run(cmd, expanded).await
    }

    /// Executes a program with explicit arguments, bypassing the shell
    ///
    /// # Errors
    ///
    /// Same as [`ShellCommand::execute`].
    pub async fn exec<S: AsRef<str>>(
        &self,
        program: &str,
        args: &[S],
    ) -> Result<ShellResult, CommandError> {
        let mut cmd = Command::new(program);
        cmd.args(args.iter().map(AsRef::as_ref));

        let command_line = std::iter::once(program)
            .chain(args.iter().map(AsRef::as_ref))
            .collect::<Vec<_>>();
        self.run(cmd, shell_words::join(command_line)).await
    }

    fn merged_env(&self) -> HashMap<String, String> {
        self.config
            .env
            .iter()
            .chain(self.env_override.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    async fn run(&self, mut cmd: Command, command_line: String) -> Result<ShellResult, CommandError> {
        cmd.current_dir(&self.config.cwd)
            .envs(self.merged_env())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(command = %command_line, cwd = %self.config.cwd.display(), "Executing command");

        let start = Instant::now();
        let child = cmd.output();

        let output = match self.config.timeout {
            Some(limit) => match tokio::time::timeout(limit, child).await {
                Ok(output) => output,
                Err(_) => {
                    return Err(CommandError::Timeout {
                        command: command_line,
                        duration: limit,
                    });
                }
            },
            None => child.await,
        }
        .map_err(|e| CommandError::Spawn {
            command: command_line.clone(),
            reason: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        if !stdout.is_empty() {
            print!("{stdout}");
        }
        if !stderr.is_empty() {
            eprint!("{stderr}");
        }

        if exit_code != 0 {
            return Err(CommandError::Failed {
                command: command_line,
                code: exit_code,
                stderr,
            });
        }

        Ok(ShellResult {
            stdout,
            stderr,
            exit_code,
            duration: start.elapsed(),
        })
    }
}

/// Expands environment variables in a command string
///
/// Variables are expanded using the `${VAR_NAME}` syntax.
/// If a variable is not found, it remains unchanged in the output.
pub fn expand_variables(input: &str, env: &HashMap<String, String>) -> String {
    static VAR_PATTERN: once_cell::sync::Lazy<Regex> =
        once_cell::sync::Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

    VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = caps.get(1).map_or("", |m| m.as_str());
            match env.get(var_name) {
                Some(value) => value.clone(),
                None => caps
                    .get(0)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default(),
            }
        })
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config_in(dir: &std::path::Path) -> ShellConfig {
        ShellConfig {
            cwd: dir.to_path_buf(),
            env: HashMap::from([("GREETING".to_string(), "hello".to_string())]),
            ..ShellConfig::default()
        }
    }

    #[test]
    fn test_expand_variables() {
        let env = HashMap::from([
            ("BUILD_ID".to_string(), "789".to_string()),
            ("FOO".to_string(), "bar".to_string()),
        ]);

        let expanded = expand_variables("${BUILD_ID} and ${UNKNOWN} and ${FOO}", &env);
        assert_eq!(expanded, "789 and ${UNKNOWN} and bar");
    }

    #[test]
    fn test_expand_variables_no_vars() {
        let env = HashMap::new();
        assert_eq!(expand_variables("echo hello world", &env), "echo hello world");
    }

    #[tokio::test]
    async fn test_execute_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let result = ShellCommand::new(&config)
            .execute("echo ${GREETING}")
            .await
            .unwrap();

        assert!(result.is_success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_execute_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let result = ShellCommand::new(&config)
            .env("GREETING", "bye")
            .execute("echo $GREETING")
            .await
            .unwrap();

        assert_eq!(result.stdout.trim(), "bye");
    }

    #[tokio::test]
    async fn test_execute_nonzero_exit_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let err = ShellCommand::new(&config)
            .execute("echo oops >&2; exit 3")
            .await
            .unwrap_err();

        match err {
            CommandError::Failed { code, stderr, .. } => {
                assert_eq!(code, 3);
                assert_eq!(stderr.trim(), "oops");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_execute_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        config.timeout = Some(Duration::from_millis(50));

        let err = ShellCommand::new(&config)
            .execute("sleep 5")
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_exec_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let err = ShellCommand::new(&config)
            .exec("definitely-not-a-real-program-xyz", &["--version"])
            .await
            .unwrap_err();

        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_exec_passes_arguments_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());

        let result = ShellCommand::new(&config)
            .exec("echo", &["${GREETING}", "two words"])
            .await
            .unwrap();

        assert_eq!(result.stdout.trim(), "${GREETING} two words");
    }
}
