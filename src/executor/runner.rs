/**
 * ============================================================================
 * COMMAND RUNNER
 * ============================================================================
 *
 * PURPOSE: Spawn one OS process and collect its output
 *
 * The executor never touches tokio::process directly; it goes through the
 * CommandRunner trait so a fake host can stand in during tests.
 *
 * SECRET HANDLING:
 * - The administrator password is written to `sudo -S` stdin followed by a
 *   newline, then stdin is closed
 * - argv never contains the secret, so argv is what gets recorded
 *
 * ============================================================================
 */

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::io;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/**
 * Program plus arguments, and an optional secret to feed on stdin
 */
#[derive(Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Arc<SecretString>>,
}

impl CommandSpec {
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            stdin: None,
        }
    }

    /**
     * Wrap in sudo reading the password from stdin
     * -k drops sudo's own timestamp so the cached password is checked every time
     */
    pub fn elevated(self, secret: Arc<SecretString>) -> Self {
        let mut args = vec![
            "-k".to_string(),
            "-S".to_string(),
            "-p".to_string(),
            String::new(),
            "--".to_string(),
            self.program,
        ];
        args.extend(self.args);

        Self {
            program: "sudo".to_string(),
            args,
            stdin: Some(secret),
        }
    }

    pub fn is_elevated(&self) -> bool {
        self.stdin.is_some()
    }

    /// Program and arguments, safe to log.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().cloned())
            .collect()
    }
}

impl fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("stdin", &self.stdin.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput>;
}

/**
 * Production runner backed by tokio::process
 * The child is killed if the future is dropped (e.g. on timeout)
 */
#[derive(Debug, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        // Parsers expect untranslated service manager output
        cmd.env("LC_ALL", "C");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn()?;

        if let (Some(secret), Some(mut stdin)) = (&spec.stdin, child.stdin.take()) {
            write_ignoring_closed(&mut stdin, secret.expose_secret().as_bytes()).await?;
            write_ignoring_closed(&mut stdin, b"\n").await?;
        }

        let output = child.wait_with_output().await?;
        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

// A child that exits before reading stdin is reported through its exit code
async fn write_ignoring_closed(stdin: &mut tokio::process::ChildStdin, bytes: &[u8]) -> io::Result<()> {
    match stdin.write_all(bytes).await {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}
