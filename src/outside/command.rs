use std::{
    io::{BufRead, BufReader},
    process::{Child, Command, ExitStatus, Output, Stdio},
    time::{Duration, Instant},
};

use bitflags::bitflags;
use crossbeam_channel::{unbounded, RecvTimeoutError};
use tracing::{debug, trace, Level};

use crate::result::{bail, Result};

pub const FFXXX_DEFAULT_ARGS: [&str; 3] = ["-hide_banner", "-loglevel", "error"];

/// Delay between two checks of a watched program exit
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capture: u8 {
        const STDIN = 0b0000001;
        const STDOUT = 0b0000010;
        const STDERR = 0b0000100;
    }
}

/// Run a command, returning its raw output handle.
///
/// IO handles will be captured only if the caller required it or if the log level is Debug.
/// In that last case, `stdout` and `stderr` will be logged.
///
/// The function returns an error only if the command failed to execute.
/// If the program runs but returns a non-0 status code, it will not trigger an error.
pub fn run_command<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
    capture: Capture,
) -> Result<Output> {
    let is_debug = tracing::enabled!(Level::DEBUG);
    let get_io = |capture| {
        if capture {
            Stdio::piped()
        } else {
            Stdio::null()
        }
    };

    let mut cmd = Command::new(program);
    let cmd = f(&mut cmd)
        .stdin(get_io(capture.contains(Capture::STDIN)))
        .stdout(get_io(is_debug || capture.contains(Capture::STDOUT)))
        .stderr(get_io(is_debug || capture.contains(Capture::STDERR)));

    debug!("Executing command: {cmd:?}");
    let res = cmd.output()?;

    if is_debug {
        debug!("status: {}", res.status);
        debug!("stdout: {} bytes long", res.stdout.len());
        trace!("stdout: {:?}", String::from_utf8_lossy(&res.stdout));
        debug!("stderr: {} bytes long", res.stderr.len());
        trace!("stderr: {:?}", String::from_utf8_lossy(&res.stderr));
    }

    Ok(res)
}

/// Run the command and verify that it has returned a success status code.
pub fn assert_success_command<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
) -> Result<()> {
    let res = run_command(program, f, Capture::STDERR)?;
    if res.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&res.stderr);
        bail(format!(
            "{program} did run but was not successful ({}): {}",
            res.status,
            stderr.trim()
        ))
    }
}

/// How a watched command ended
#[derive(Debug)]
pub enum Watched {
    /// The program exited by itself
    Exited { status: ExitStatus, stderr: String },
    /// The program printed a fatal line and was killed
    Aborted { line: String },
    /// The program ran for too long and was killed
    TimedOut,
}

/// Run a long command while reading its stderr line by line.
///
/// The program is killed as soon as one of its stderr lines contains one of
/// `abort_markers`, or when it runs for longer than `timeout`.
/// Every stderr line is logged at the Debug level.
pub fn run_watched<F: FnOnce(&mut Command) -> &mut Command>(
    program: &str,
    f: F,
    timeout: Duration,
    abort_markers: &[&str],
) -> Result<Watched> {
    let mut cmd = Command::new(program);
    let cmd = f(&mut cmd)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    debug!("Executing command: {cmd:?}");
    let mut child = cmd.spawn()?;

    let Some(stderr) = child.stderr.take() else {
        kill(&mut child);
        return bail("Could not capture the command stderr");
    };

    // Reading a pipe blocks, so a helper thread forwards the lines
    // to be able to stop waiting at the deadline
    let (send, receive) = unbounded();
    std::thread::Builder::new()
        .name(format!("{program}-stderr"))
        .spawn(move || {
            // Tools may print invalid UTF-8, which must not stop the reading
            let mut reader = BufReader::new(stderr);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(&buf).trim_end().to_owned();
                        if send.send(line).is_err() {
                            break;
                        }
                    }
                }
            }
        })?;

    let deadline = Instant::now() + timeout;
    let mut lines = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match receive.recv_timeout(remaining) {
            Ok(line) => {
                debug!("{program}: {line}");
                if abort_markers.iter().any(|m| line.contains(m)) {
                    kill(&mut child);
                    return Ok(Watched::Aborted { line });
                }
                lines.push(line);
            }
            Err(RecvTimeoutError::Timeout) => {
                kill(&mut child);
                return Ok(Watched::TimedOut);
            }
            // The stderr is closed, the program is exiting
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // The stderr may be closed before the exit, the deadline still holds
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            kill(&mut child);
            return Ok(Watched::TimedOut);
        }
        std::thread::sleep(EXIT_POLL_INTERVAL);
    };
    debug!("status: {status}");

    Ok(Watched::Exited {
        status,
        stderr: lines.join("\n"),
    })
}

fn kill(child: &mut Child) {
    if let Err(err) = child.kill() {
        debug!("Could not kill the child process: {err}");
    }
    // Reap it to not leave a zombie behind
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn watched_success() {
        let res = run_watched(
            "sh",
            |cmd| cmd.args(["-c", "echo progress >&2; exit 0"]),
            Duration::from_secs(10),
            &["FATAL"],
        )
        .unwrap();

        match res {
            Watched::Exited { status, stderr } => {
                assert!(status.success());
                assert_eq!(stderr, "progress");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn watched_abort_marker_kills() {
        let start = Instant::now();
        let res = run_watched(
            "sh",
            |cmd| cmd.args(["-c", "echo 'ERROR: FATAL thing' >&2; sleep 30"]),
            Duration::from_secs(60),
            &["FATAL"],
        )
        .unwrap();

        assert!(matches!(res, Watched::Aborted { ref line } if line.contains("FATAL")));
        assert!(start.elapsed() < Duration::from_secs(20));
    }

    #[test]
    fn watched_timeout_kills() {
        let res = run_watched(
            "sh",
            |cmd| cmd.args(["-c", "sleep 30"]),
            Duration::from_millis(200),
            &[],
        )
        .unwrap();

        assert!(matches!(res, Watched::TimedOut));
    }

    #[test]
    fn invalid_utf8_keeps_the_watch() {
        let start = Instant::now();
        let res = run_watched(
            "sh",
            |cmd| cmd.args(["-c", "printf 'bad \\377 byte\\n' >&2; sleep 8"]),
            Duration::from_millis(500),
            &[],
        )
        .unwrap();

        assert!(matches!(res, Watched::TimedOut));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn invalid_utf8_line_is_kept() {
        let res = run_watched(
            "sh",
            |cmd| cmd.args(["-c", "printf 'bad \\377 byte\\nFATAL\\n' >&2; sleep 8"]),
            Duration::from_secs(30),
            &["FATAL"],
        )
        .unwrap();

        assert!(matches!(res, Watched::Aborted { .. }));
    }

    #[test]
    fn closed_stderr_does_not_lift_the_deadline() {
        let start = Instant::now();
        let res = run_watched(
            "sh",
            |cmd| cmd.args(["-c", "exec 2>&-; sleep 8"]),
            Duration::from_millis(500),
            &[],
        )
        .unwrap();

        assert!(matches!(res, Watched::TimedOut));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn failing_command_is_an_error() {
        assert!(assert_success_command("sh", |cmd| cmd.args(["-c", "exit 3"])).is_err());
        assert!(assert_success_command("sh", |cmd| cmd.args(["-c", "exit 0"])).is_ok());
    }

    #[test]
    fn missing_program_is_an_error() {
        assert!(run_command("definitely-not-a-program-xyz", |cmd| cmd, Capture::empty()).is_err());
    }
}
