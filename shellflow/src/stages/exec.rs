//! The process stage.
//!
//! A process stage spawns its child, hands the child's live standard output
//! to the rest of the chain and only then waits for the child to exit. The
//! child and its downstream consumer therefore run concurrently, with the OS
//! pipe buffer providing backpressure. Chaining process stages gives a shell
//! pipeline: each stage's standard input is the previous stage's output.

use super::{BoxStage, Stage};
use crate::context::{RunContext, SilencePolicy};
use crate::errors::{Error, Result};
use crate::value::{BoxReader, Value};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

/// Runs an external program as a pipeline stage.
#[derive(Debug, Clone)]
pub struct ExecStage {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    inherit_stdin: bool,
}

impl ExecStage {
    /// Creates a process stage.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            envs: Vec::new(),
            inherit_stdin: false,
        }
    }

    /// Adds an argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets an environment variable for the child, on top of the inherited
    /// environment.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// Lets the child read the host's standard input when no value flows in.
    ///
    /// Without this the child reads from the null device.
    #[must_use]
    pub fn stdin_inherit(mut self) -> Self {
        self.inherit_stdin = true;
        self
    }

    /// Returns the program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Boxes the stage.
    #[must_use]
    pub fn into_stage(self) -> BoxStage {
        Box::new(self)
    }

    fn command(&self, ctx: &RunContext, piped_stdin: bool) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(ctx.workdir())
            .stdout(Stdio::piped())
            .kill_on_drop(true);

        cmd.stdin(if piped_stdin {
            Stdio::piped()
        } else if self.inherit_stdin {
            Stdio::inherit()
        } else {
            Stdio::null()
        });

        cmd.stderr(match ctx.silence_policy() {
            SilencePolicy::Live => Stdio::piped(),
            SilencePolicy::SpawnTime if ctx.is_silent() => Stdio::null(),
            SilencePolicy::SpawnTime => Stdio::inherit(),
        });
        cmd
    }
}

#[async_trait]
impl Stage for ExecStage {
    fn name(&self) -> &str {
        &self.program
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        if self.program.is_empty() {
            return Err(Error::Config("program name is required".to_string()));
        }
        let source = if input.is_nil() {
            None
        } else {
            Some(input.into_reader()?)
        };

        ctx.tracer().trace(&self.program, &self.args);

        let mut child = self
            .command(ctx, source.is_some())
            .spawn()
            .map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })?;
        debug!(program = %self.program, pid = ?child.id(), "process started");

        // The child is killed on drop, so early returns cannot leak it.
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Config("process stdout was not captured".to_string()))?;
        let feed = source.zip(child.stdin.take());
        let stderr = child.stderr.take().map(|err| (err, ctx.silent_flag()));

        let token = ctx.cancellation().clone();
        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::Cancelled(token.reason().unwrap_or_default())),
            result = drive(ctx, stdout, feed, stderr) => result,
        };

        let value = match outcome {
            Ok(value) => value,
            Err(e) => {
                terminate(&mut child, &self.program).await;
                return Err(e);
            }
        };

        let waited = tokio::select! {
            biased;
            () = token.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = waited else {
            terminate(&mut child, &self.program).await;
            return Err(Error::Cancelled(token.reason().unwrap_or_default()));
        };
        let status = status
            .map_err(|e| Error::io(format!("failed to wait for `{}`", self.program), e))?;
        debug!(program = %self.program, %status, "process exited");

        if status.success() {
            Ok(value)
        } else {
            Err(Error::ProcessExit {
                program: self.program.clone(),
                status,
            })
        }
    }
}

/// Runs the remainder of the chain on the child's output while feeding its
/// input and forwarding its error stream.
async fn drive(
    ctx: &mut RunContext,
    stdout: ChildStdout,
    feed: Option<(BoxReader, ChildStdin)>,
    stderr: Option<(ChildStderr, Arc<AtomicBool>)>,
) -> Result<Value> {
    let feeding = async move {
        let Some((mut reader, mut stdin)) = feed else {
            return Ok(());
        };
        let copied = tokio::io::copy(&mut reader, &mut stdin).await;
        let closed = stdin.shutdown().await;
        drop(stdin);
        match copied.and(closed) {
            Ok(_) => Ok(()),
            // The child stopped reading, as `head` does.
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
            Err(e) => Err(Error::io("failed to write process stdin", e)),
        }
    };
    let forwarding = async move {
        if let Some((mut err, silent)) = stderr {
            forward_stderr(&mut err, &silent).await;
        }
    };
    let downstream = async move {
        let value = ctx.next(Value::reader(stdout)).await?;
        // A still-live stdout must be drained before the child is awaited.
        value.materialize().await
    };

    tokio::pin!(feeding, forwarding, downstream);
    let mut fed = None;
    let mut forwarded = false;
    let value = loop {
        tokio::select! {
            result = &mut downstream => break result?,
            result = &mut feeding, if fed.is_none() => fed = Some(result),
            () = &mut forwarding, if !forwarded => forwarded = true,
        }
    };

    let fed = match fed {
        Some(result) => result,
        None => feeding.await,
    };
    if !forwarded {
        forwarding.await;
    }
    fed?;
    Ok(value)
}

async fn forward_stderr(err: &mut ChildStderr, silent: &AtomicBool) {
    let mut host = tokio::io::stderr();
    let mut chunk = [0u8; 4096];
    loop {
        match err.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if !silent.load(Ordering::SeqCst) {
                    let _ = host.write_all(&chunk[..n]).await;
                }
            }
        }
    }
    let _ = host.flush().await;
}

async fn terminate(child: &mut Child, program: &str) {
    if let Err(e) = child.start_kill() {
        // Already exited; still reap it below.
        debug!(program, error = %e, "kill skipped");
    } else {
        warn!(program, pid = ?child.id(), "terminating process");
    }
    if let Err(e) = child.wait().await {
        warn!(program, error = %e, "failed to reap process");
    }
}

/// Runs `program` with `args`.
pub fn exec<I, S>(program: impl Into<String>, args: I) -> BoxStage
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Box::new(ExecStage::new(program, args))
}

struct ExecLineStage {
    line: String,
}

#[async_trait]
impl Stage for ExecLineStage {
    fn name(&self) -> &str {
        "execs"
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        let words = shell_words::split(&self.line)
            .map_err(|e| Error::Config(format!("failed to parse command `{}`: {e}", self.line)))?;
        let Some((program, args)) = words.split_first() else {
            return Err(Error::Config("command line is empty".to_string()));
        };
        ExecStage::new(program.clone(), args.iter().cloned())
            .handle(ctx, input)
            .await
    }
}

/// Runs a shell-like command line, split into words with shell quoting rules.
///
/// No shell is involved: pipes, globs and variables are not interpreted.
pub fn execs(line: impl Into<String>) -> BoxStage {
    Box::new(ExecLineStage { line: line.into() })
}

/// Builds one process stage per command, piped in order.
pub fn pipe<I, C, S>(commands: I) -> Result<Vec<BoxStage>>
where
    I: IntoIterator<Item = C>,
    C: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut stages = Vec::new();
    for (i, command) in commands.into_iter().enumerate() {
        let mut words = command.into_iter().map(Into::into);
        let program: String = words
            .next()
            .filter(|p: &String| !p.is_empty())
            .ok_or_else(|| Error::Config(format!("command #{i} is empty")))?;
        stages.push(exec(program, words));
    }
    if stages.is_empty() {
        return Err(Error::Config("no command provided".to_string()));
    }
    Ok(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Shell;

    #[tokio::test]
    async fn test_exec_as_last_stage_returns_output() {
        let out = Shell::new().run([exec("echo", ["hello"])]).await.unwrap();
        assert!(matches!(out, Value::Bytes(_)));
        assert_eq!(out.into_text().await.unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn test_execs_splits_quoted_words() {
        let out = Shell::new()
            .run([execs("echo 'hello world'")])
            .await
            .unwrap();
        assert_eq!(out.into_text().await.unwrap(), "hello world\n");
    }

    #[tokio::test]
    async fn test_execs_rejects_bad_quoting() {
        let err = Shell::new().run([execs("echo 'unterminated")]).await.unwrap_err();
        assert!(matches!(err.root(), Error::Config(_)));
    }

    #[tokio::test]
    async fn test_empty_program_is_config_error() {
        let err = Shell::new()
            .run([exec("", Vec::<String>::new())])
            .await
            .unwrap_err();
        assert!(matches!(err.root(), Error::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_spawn() {
        let err = Shell::new()
            .run([exec("shellflow-definitely-missing", ["x"])])
            .await
            .unwrap_err();
        assert!(matches!(err.root(), Error::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_reported() {
        let err = Shell::new()
            .run([exec("sh", ["-c", "exit 3"])])
            .await
            .unwrap_err();
        match err.root() {
            Error::ProcessExit { program, status } => {
                assert_eq!(program, "sh");
                assert_eq!(status.code(), Some(3));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_env_is_passed() {
        let out = Shell::new()
            .run([ExecStage::new("sh", ["-c", "printf %s \"$GREETING\""])
                .env("GREETING", "hi")
                .into_stage()])
            .await
            .unwrap();
        assert_eq!(out.into_text().await.unwrap(), "hi");
    }

    #[test]
    fn test_pipe_validates_commands() {
        assert_eq!(pipe([["ls", "-l"], ["wc", "-l"]]).unwrap().len(), 2);
        assert!(pipe(Vec::<Vec<String>>::new()).is_err());
        assert!(pipe([vec!["ls"], vec![]]).is_err());
    }
}
