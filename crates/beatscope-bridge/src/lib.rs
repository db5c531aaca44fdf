//! Runs an external analyzer as a child process.
//!
//! The waveform is written to the child's stdin as JSON and a
//! [`BridgeOutput`] is read back from its stdout. The configured timeout
//! bounds the whole call, pipe draining included; a child still running at
//! the deadline is killed.

use beatscope_lib::{
    bridge::{BridgeOutput, ExternalAnalyzer},
    config::BridgeConfig,
    error::BridgeError,
    signal::WaveformData,
};
use log::debug;
use std::io::{ErrorKind, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandAnalyzer {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(config.command.clone(), config.args.clone(), config.timeout())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn spawn(&self) -> Result<Child, BridgeError> {
        Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| BridgeError::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

impl ExternalAnalyzer for CommandAnalyzer {
    fn analyze(&self, waveform: &WaveformData) -> Result<BridgeOutput, BridgeError> {
        let payload = serde_json::to_vec(waveform)?;
        let deadline = Instant::now() + self.timeout;
        let mut child = self.spawn()?;
        debug!(
            "spawned external analyzer `{}` (pid {}), {} byte request",
            self.program,
            child.id(),
            payload.len()
        );

        // Pipes are serviced on their own threads so a chatty child cannot
        // block on a full pipe while we wait for it. Descendants may inherit
        // the pipes, so every worker is awaited against the same deadline.
        let stdin = child.stdin.take();
        let writer = background(move || match stdin {
            Some(mut stdin) => stdin.write_all(&payload),
            None => Ok(()),
        });
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = wait_until(&mut child, deadline, self.timeout)?;

        match settle(&writer, deadline, self.timeout) {
            Err(BridgeError::Io(err)) if err.kind() == ErrorKind::BrokenPipe => {}
            other => other?,
        }
        let stdout = settle(&stdout, deadline, self.timeout)?;
        let stderr = settle(&stderr, deadline, self.timeout)?;

        if !status.success() {
            return Err(BridgeError::Failed {
                status: status.to_string(),
                stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
            });
        }
        Ok(serde_json::from_slice(&stdout)?)
    }
}

type Pending<T> = Receiver<std::io::Result<T>>;

fn background<T, F>(task: F) -> Pending<T>
where
    T: Send + 'static,
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(task());
    });
    rx
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Pending<Vec<u8>> {
    background(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

/// Result of a pipe worker, or `Timeout` once `deadline` passes. A worker
/// still blocked at that point is left detached.
fn settle<T>(pending: &Pending<T>, deadline: Instant, timeout: Duration) -> Result<T, BridgeError> {
    match pending.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
        Ok(result) => result.map_err(BridgeError::from),
        Err(RecvTimeoutError::Timeout) => Err(BridgeError::Timeout(timeout.as_millis() as u64)),
        Err(RecvTimeoutError::Disconnected) => Err(BridgeError::Io(std::io::Error::new(
            ErrorKind::Other,
            "pipe worker panicked",
        ))),
    }
}

fn wait_until(
    child: &mut Child,
    deadline: Instant,
    timeout: Duration,
) -> Result<ExitStatus, BridgeError> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(BridgeError::Timeout(timeout.as_millis() as u64));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use beatscope_lib::signal::PeakSet;

    fn sh(script: &str, timeout: Duration) -> CommandAnalyzer {
        CommandAnalyzer::new("sh", vec!["-c".into(), script.into()], timeout)
    }

    fn waveform() -> WaveformData {
        WaveformData::new(5_000, vec![0.0, 1.0, 0.0, 2.0, 0.0]).unwrap()
    }

    #[test]
    fn reads_partial_response() {
        let analyzer = sh(
            r#"cat > /dev/null; echo '{"peaks":[1,3]}'"#,
            Duration::from_secs(5),
        );
        let out = analyzer.analyze(&waveform()).unwrap();
        assert_eq!(out.peaks, Some(PeakSet::from_indices(vec![1, 3])));
        assert!(out.filtered_data.is_none());
        assert!(out.anomalies.is_none());
    }

    #[test]
    fn child_receives_serialized_waveform() {
        // Echo the request's sampling rate back through the error field.
        let analyzer = sh(
            r#"grep -o '"sampling_rate":[0-9]*' | head -n1 | sed 's/.*:\(.*\)/{"error":"rate \1"}/'"#,
            Duration::from_secs(5),
        );
        let out = analyzer.analyze(&waveform()).unwrap();
        assert_eq!(out.error.as_deref(), Some("rate 5000"));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let analyzer = CommandAnalyzer::new(
            "/nonexistent/beatscope-analyzer",
            Vec::new(),
            Duration::from_secs(1),
        );
        assert!(matches!(
            analyzer.analyze(&waveform()),
            Err(BridgeError::Spawn { .. })
        ));
    }

    #[test]
    fn non_zero_exit_is_failure() {
        let analyzer = sh("cat > /dev/null; echo oops >&2; exit 3", Duration::from_secs(5));
        match analyzer.analyze(&waveform()) {
            Err(BridgeError::Failed { stderr, .. }) => assert_eq!(stderr, "oops"),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn garbage_output_is_malformed() {
        let analyzer = sh("cat > /dev/null; echo not-json", Duration::from_secs(5));
        assert!(matches!(
            analyzer.analyze(&waveform()),
            Err(BridgeError::Malformed(_))
        ));
    }

    #[test]
    fn hung_child_times_out() {
        let analyzer = sh("sleep 5", Duration::from_millis(200));
        let started = Instant::now();
        assert!(matches!(
            analyzer.analyze(&waveform()),
            Err(BridgeError::Timeout(200))
        ));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn lingering_descendant_cannot_outlast_timeout() {
        // The shell exits at once but a background sleep keeps stdout open.
        let analyzer = sh(
            r#"cat > /dev/null; echo '{}'; sleep 4 &"#,
            Duration::from_millis(200),
        );
        let started = Instant::now();
        assert!(matches!(
            analyzer.analyze(&waveform()),
            Err(BridgeError::Timeout(200))
        ));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn child_ignoring_stdin_is_fine() {
        let analyzer = sh(r#"echo '{}'"#, Duration::from_secs(5));
        let out = analyzer.analyze(&waveform()).unwrap();
        assert_eq!(out, BridgeOutput::default());
    }

    #[test]
    fn builds_from_config() {
        let config = BridgeConfig {
            enabled: true,
            command: "python3".into(),
            args: vec!["ecg_analyzer.py".into()],
            timeout_ms: 250,
        };
        let analyzer = CommandAnalyzer::from_config(&config);
        assert_eq!(analyzer.program(), "python3");
        assert_eq!(analyzer.timeout, Duration::from_millis(250));
    }
}
