use crate::compiler::CompiledCommand;
use crate::error::{Result, ScaffoldError};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Instant;

const SHELL: &str = "sh";

#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_seconds: f64,
}

/// Where echoed child output goes; opened once per stream per run.
type EchoSink = fn() -> Box<dyn Write + Send>;

fn terminal_stdout() -> Box<dyn Write + Send> {
    Box::new(io::stdout())
}

fn terminal_stderr() -> Box<dyn Write + Send> {
    Box::new(io::stderr())
}

/// Runs compiled commands through `sh -c`, echoing and capturing both
/// output streams as they arrive.
pub struct ProcessRunner {
    stdout_echo: Option<EchoSink>,
    stderr_echo: Option<EchoSink>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            stdout_echo: Some(terminal_stdout),
            stderr_echo: Some(terminal_stderr),
        }
    }
}

impl ProcessRunner {
    pub fn quiet() -> Self {
        Self {
            stdout_echo: None,
            stderr_echo: None,
        }
    }

    #[cfg(test)]
    pub(crate) fn echoing_to(stdout_echo: EchoSink, stderr_echo: EchoSink) -> Self {
        Self {
            stdout_echo: Some(stdout_echo),
            stderr_echo: Some(stderr_echo),
        }
    }

    pub fn run(&self, command: &CompiledCommand) -> Result<RunOutcome> {
        let start_time = Instant::now();

        let mut child = Command::new(SHELL)
            .arg("-c")
            .arg(&command.display)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ScaffoldError::Spawn {
                program: SHELL.to_string(),
                source,
            })?;

        // Both are piped above, so take() always yields them.
        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                let _ = child.kill();
                child.wait()?;
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "child output was not captured").into());
            }
        };

        let stdout_echo = self.stdout_echo.map(|open| open());
        let stderr_echo = self.stderr_echo.map(|open| open());
        let stdout_handle = thread::spawn(move || drain(stdout, stdout_echo, "stdout"));
        let stderr_handle = thread::spawn(move || drain(stderr, stderr_echo, "stderr"));

        // Both pipes must hit end-of-stream before the exit status counts,
        // and the child is reaped even when a reader failed.
        let stdout_result = join_reader(stdout_handle, "stdout");
        let stderr_result = join_reader(stderr_handle, "stderr");
        let status = child.wait()?;
        let elapsed = start_time.elapsed();

        let stdout_bytes = stdout_result?;
        let stderr_bytes = stderr_result?;
        Ok(RunOutcome {
            returncode: status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
            elapsed_seconds: elapsed.as_secs_f64(),
        })
    }
}

/// Reads `pipe` to end-of-stream line by line. Echo failures only stop the
/// echo; capture carries on.
fn drain(pipe: impl Read, mut echo: Option<Box<dyn Write + Send>>, name: &str) -> io::Result<Vec<u8>> {
    let mut reader = BufReader::new(pipe);
    let mut collected = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let bytes_read = reader.read_until(b'\n', &mut line)?;
        if bytes_read == 0 {
            break;
        }
        collected.extend_from_slice(&line);
        if let Some(sink) = echo.as_mut() {
            if let Err(e) = sink.write_all(&line).and_then(|_| sink.flush()) {
                log::warn!("could not echo child {} ({}), still capturing it", name, e);
                echo = None;
            }
        }
    }
    Ok(collected)
}

// Echo target that fails every write, like a terminal on a full disk.
#[cfg(test)]
struct FullDisk;

#[cfg(test)]
impl Write for FullDisk {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "no space left on device"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn full_disk_sink() -> Box<dyn Write + Send> {
    Box::new(FullDisk)
}

fn join_reader(handle: thread::JoinHandle<io::Result<Vec<u8>>>, name: &str) -> Result<Vec<u8>> {
    let bytes = handle
        .join()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, format!("{} reader panicked", name)))??;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(display: &str) -> CompiledCommand {
        CompiledCommand {
            tokens: display.split_whitespace().map(str::to_string).collect(),
            display: display.to_string(),
        }
    }

    #[test]
    fn captures_stdout_and_zero_exit() -> anyhow::Result<()> {
        let outcome = ProcessRunner::quiet().run(&command("echo hi"))?;
        assert_eq!(outcome.returncode, 0);
        assert_eq!(outcome.stdout, "hi\n");
        assert_eq!(outcome.stderr, "");
        assert!(outcome.elapsed_seconds >= 0.0);
        Ok(())
    }

    #[test]
    fn streams_are_captured_separately() -> anyhow::Result<()> {
        let outcome = ProcessRunner::quiet().run(&command("echo out; echo err 1>&2; echo out2"))?;
        assert_eq!(outcome.stdout, "out\nout2\n");
        assert_eq!(outcome.stderr, "err\n");
        Ok(())
    }

    #[test]
    fn nonzero_exit_is_reported_not_raised() -> anyhow::Result<()> {
        let outcome = ProcessRunner::quiet().run(&command("echo partial; exit 3"))?;
        assert_eq!(outcome.returncode, 3);
        assert_eq!(outcome.stdout, "partial\n");
        Ok(())
    }

    #[test]
    fn output_without_trailing_newline_is_kept() -> anyhow::Result<()> {
        let outcome = ProcessRunner::quiet().run(&command("printf 'no newline'"))?;
        assert_eq!(outcome.stdout, "no newline");
        Ok(())
    }

    #[test]
    fn stderr_past_pipe_capacity_does_not_stall_stdout() -> anyhow::Result<()> {
        // 200 KB on stderr is several pipe buffers; stdout only writes after it.
        let script = "head -c 200000 /dev/zero | tr '\\0' e 1>&2; echo done";
        let outcome = ProcessRunner::quiet().run(&command(script))?;
        assert_eq!(outcome.returncode, 0);
        assert_eq!(outcome.stdout, "done\n");
        assert_eq!(outcome.stderr.len(), 200_000);
        assert!(outcome.stderr.bytes().all(|b| b == b'e'));
        Ok(())
    }

    #[test]
    fn stdout_past_pipe_capacity_does_not_stall_stderr() -> anyhow::Result<()> {
        let script = "i=0; while [ $i -lt 20000 ]; do echo line$i; i=$((i+1)); done; echo tail 1>&2";
        let outcome = ProcessRunner::quiet().run(&command(script))?;
        assert_eq!(outcome.stdout.lines().count(), 20000);
        assert_eq!(outcome.stdout.lines().last(), Some("line19999"));
        assert_eq!(outcome.stderr, "tail\n");
        Ok(())
    }

    #[test]
    fn failing_echo_keeps_capturing() -> anyhow::Result<()> {
        let runner = ProcessRunner::echoing_to(full_disk_sink, full_disk_sink);
        let outcome = runner.run(&command("echo hi; echo more; echo err 1>&2; exit 2"))?;
        assert_eq!(outcome.returncode, 2);
        assert_eq!(outcome.stdout, "hi\nmore\n");
        assert_eq!(outcome.stderr, "err\n");
        Ok(())
    }

    #[test]
    fn drain_survives_sink_errors() -> anyhow::Result<()> {
        let input = "a\nb\nno newline";
        let collected = drain(input.as_bytes(), Some(full_disk_sink()), "stdout")?;
        assert_eq!(collected, input.as_bytes());
        Ok(())
    }

    #[test]
    fn elapsed_time_covers_the_run() -> anyhow::Result<()> {
        let outcome = ProcessRunner::quiet().run(&command("sleep 0.2"))?;
        assert!(outcome.elapsed_seconds >= 0.2);
        Ok(())
    }
}
