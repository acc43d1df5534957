use std::io::{stderr, stdout, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;

use colored::Colorize;

use super::Error;

/// Keep at most this much of each captured stream in error messages.
const MAX_CAPTURE_CHARS: usize = 8 * 1024;

/// Output captured from a finished subprocess.
#[derive(Debug, Default)]
pub struct Captured {
    pub stdout: String,
    pub stderr: String,
}

/// Command line as it would be typed in a shell, for logging.
fn command_line(cmd: &Command) -> String {
    let mut line = cmd.get_program().to_string_lossy().into_owned();
    for arg in cmd.get_args() {
        line.push(' ');
        line.push_str(&arg.to_string_lossy());
    }
    line
}

/// Run a subprocess to completion, capturing its stdout and stderr.
/// If `echo` is set, both streams are also passed through to ours as they arrive.
/// Based on:
/// <https://stackoverflow.com/questions/66060139/how-to-tee-stdout-stderr-from-a-subprocess-in-rust>
pub fn run_cmd(cmd: &mut Command, echo: bool) -> Result<Captured, Error> {
    let line = command_line(cmd);
    log::info!("{} {}", "Running".magenta(), line.replace(" --", "\n\t--"));

    let mut child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| Error::Spawn {
            program: cmd.get_program().to_string_lossy().into_owned(),
            source,
        })?;

    supervise(&mut child, &line, echo.then(stdout), echo.then(stderr))
}

/// Drain `child`'s output into optional sinks and wait for it to exit.
/// If either stream can't be followed to the end, the child is killed and reaped.
fn supervise<O, E>(
    child: &mut Child,
    line: &str,
    out_sink: Option<O>,
    err_sink: Option<E>,
) -> Result<Captured, Error>
where
    O: Write + Send + 'static,
    E: Write + Send + 'static,
{
    let child_out = child
        .stdout
        .take()
        .ok_or_else(|| Error::OutputStream(line.to_owned()));
    let child_err = child
        .stderr
        .take()
        .ok_or_else(|| Error::OutputStream(line.to_owned()));
    let (child_out, child_err) = match (child_out, child_err) {
        (Ok(out), Ok(err)) => (out, err),
        (Err(e), _) | (_, Err(e)) => {
            stop(child, line);
            return Err(e);
        }
    };

    let thread_out = thread::spawn(move || communicate(child_out, out_sink));
    let thread_err = thread::spawn(move || communicate(child_err, err_sink));

    // kill before joining stderr, which only ends once the child closes it:
    let out = join(thread_out, line);
    if out.is_err() {
        stop(child, line);
    }
    let err = join(thread_err, line);
    let (out, err) = match (out, err) {
        (Ok(out), Ok(err)) => (out, err),
        (Err(e), _) => return Err(e),
        (Ok(_), Err(e)) => {
            stop(child, line);
            return Err(e);
        }
    };

    let status = child.wait().map_err(|source| Error::Spawn {
        program: line.to_owned(),
        source,
    })?;
    log::debug!("{} with {status}", "Process finished".green());

    let captured = Captured {
        stdout: String::from_utf8_lossy(&out).into_owned(),
        stderr: String::from_utf8_lossy(&err).into_owned(),
    };
    if status.success() {
        Ok(captured)
    } else {
        Err(Error::CommandFailed {
            command: line.to_owned(),
            status,
            stdout: util::tail(&captured.stdout, MAX_CAPTURE_CHARS),
            stderr: util::tail(&captured.stderr, MAX_CAPTURE_CHARS),
        })
    }
}

/// Kill and reap a child whose output we can no longer follow.
fn stop(child: &mut Child, line: &str) {
    log::error!("stopping {line}");
    if let Err(e) = child.kill() {
        log::error!("could not kill child process: {e}");
    }
    if let Err(e) = child.wait() {
        log::error!("could not wait for child process: {e}");
    }
}

fn join(
    handle: thread::JoinHandle<std::io::Result<Vec<u8>>>,
    line: &str,
) -> Result<Vec<u8>, Error> {
    match handle.join() {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(e)) => {
            log::error!("error reading child output: {e}");
            Err(Error::OutputStream(line.to_owned()))
        }
        Err(_) => Err(Error::OutputStream(line.to_owned())),
    }
}

fn communicate<R: Read, W: Write>(mut stream: R, mut output: Option<W>) -> std::io::Result<Vec<u8>> {
    let mut captured = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let num_read = stream.read(&mut buf)?;
        if num_read == 0 {
            break;
        }

        let buf = &buf[..num_read];
        captured.extend_from_slice(buf);
        if let Some(output) = output.as_mut() {
            output.write_all(buf)?;
        }
    }

    Ok(captured)
}
