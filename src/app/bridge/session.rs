use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::app::bridge::classify::LineClassifier;
use crate::app::bridge::timing::PollPolicy;
use crate::app::error::BridgeError;

/// One scoped subprocess lifecycle for a single logical operation. The
/// session owns a persistent platform shell started in the bridge tool's
/// install directory; commands are written to its stdin one line at a time
/// and every line of combined stdout/stderr is collected as it arrives.
/// Sessions are never reused across unrelated operations, so significant
/// lines from one request cannot leak into the next.
#[derive(Debug)]
pub struct CommandSession {
    trace_id: String,
    child: Arc<Mutex<Child>>,
    stdin: Arc<Mutex<ChildStdin>>,
    lines: Arc<Mutex<SessionLines>>,
    stop_flag: Arc<AtomicBool>,
    readers: Vec<JoinHandle<()>>,
    closed: bool,
}

#[derive(Debug, Default)]
struct SessionLines {
    raw: Vec<String>,
    significant: Vec<String>,
}

impl CommandSession {
    pub fn open(working_dir: &str, trace_id: &str) -> Result<Self, BridgeError> {
        let classifier = LineClassifier::new(working_dir);
        Self::open_with_classifier(working_dir, classifier, trace_id)
    }

    pub fn open_with_classifier(
        working_dir: &str,
        classifier: LineClassifier,
        trace_id: &str,
    ) -> Result<Self, BridgeError> {
        let (program, args): (&str, &[&str]) = if cfg!(windows) {
            ("cmd.exe", &["/Q", "/K"])
        } else {
            ("sh", &[])
        };

        let mut child = Command::new(program)
            .args(args)
            .current_dir(working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                BridgeError::process_start(
                    format!("Failed to start bridge shell: {err}"),
                    trace_id,
                )
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::process_start("Failed to capture stdin", trace_id))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::process_start("Failed to capture stdout", trace_id))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BridgeError::process_start("Failed to capture stderr", trace_id))?;

        // Suppress command echo so the shell's own chatter stays out of the
        // output channel; sh does not echo piped input to begin with.
        if cfg!(windows) {
            let _ = stdin.write_all(b"@echo off\n");
            let _ = stdin.flush();
        }

        let lines: Arc<Mutex<SessionLines>> = Arc::new(Mutex::new(SessionLines::default()));
        let stop_flag = Arc::new(AtomicBool::new(false));

        let mut readers = Vec::with_capacity(2);
        for stream in [ReaderStream::Stdout(stdout), ReaderStream::Stderr(stderr)] {
            let lines = Arc::clone(&lines);
            let stop = Arc::clone(&stop_flag);
            let classifier = classifier.clone();
            let trace = trace_id.to_string();
            readers.push(std::thread::spawn(move || {
                stream.drain(lines, stop, classifier, trace)
            }));
        }

        Ok(Self {
            trace_id: trace_id.to_string(),
            child: Arc::new(Mutex::new(child)),
            stdin: Arc::new(Mutex::new(stdin)),
            lines,
            stop_flag,
            readers,
            closed: false,
        })
    }

    /// Writes one command line and flushes. Fire-and-forget: effects are
    /// observed only through delivered output lines.
    pub fn send(&self, command: &str) -> Result<(), BridgeError> {
        debug!(trace_id = %self.trace_id, command = %command, "sending bridge command");
        let mut guard = self
            .stdin
            .lock()
            .map_err(|_| BridgeError::system("stdin lock poisoned", &self.trace_id))?;
        guard
            .write_all(command.as_bytes())
            .and_then(|_| guard.write_all(b"\n"))
            .and_then(|_| guard.flush())
            .map_err(|err| {
                BridgeError::system(format!("Failed to write command: {err}"), &self.trace_id)
            })
    }

    /// Fixed-delay synchronization for short deterministic commands.
    pub fn wait_settled(&self, delay: Duration) {
        std::thread::sleep(delay);
    }

    /// Baseline for `poll_significant`: how many significant lines have been
    /// observed so far.
    pub fn significant_count(&self) -> usize {
        self.lines
            .lock()
            .map(|guard| guard.significant.len())
            .unwrap_or(0)
    }

    /// Polls every `policy.interval` for significant lines past `baseline`,
    /// returning the first non-empty batch or an empty vec once
    /// `policy.bound` elapses. An empty result means "nothing found", not an
    /// error.
    pub fn poll_significant(&self, baseline: usize, policy: PollPolicy) -> Vec<String> {
        let start = Instant::now();
        loop {
            if let Ok(guard) = self.lines.lock() {
                if guard.significant.len() > baseline {
                    return guard.significant[baseline..].to_vec();
                }
            }
            if start.elapsed() >= policy.bound {
                return Vec::new();
            }
            std::thread::sleep(policy.interval);
        }
    }

    pub fn significant_lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|guard| guard.significant.clone())
            .unwrap_or_default()
    }

    /// Significant lines observed after `baseline`, without waiting.
    pub fn significant_since(&self, baseline: usize) -> Vec<String> {
        self.lines
            .lock()
            .map(|guard| {
                if guard.significant.len() > baseline {
                    guard.significant[baseline..].to_vec()
                } else {
                    Vec::new()
                }
            })
            .unwrap_or_default()
    }

    /// Every observed line, kept for diagnostics.
    pub fn raw_lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|guard| guard.raw.clone())
            .unwrap_or_default()
    }

    /// Blocks until the subprocess terminates or the timeout elapses. On
    /// timeout the child is force-killed and `ERR_TIMEOUT` is returned.
    pub fn await_exit(&mut self, timeout: Duration) -> Result<Option<i32>, BridgeError> {
        let start = Instant::now();
        loop {
            let status = {
                let mut guard = self
                    .child
                    .lock()
                    .map_err(|_| BridgeError::system("child lock poisoned", &self.trace_id))?;
                guard.try_wait().map_err(|err| {
                    BridgeError::system(
                        format!("Failed to poll bridge shell: {err}"),
                        &self.trace_id,
                    )
                })?
            };
            if let Some(status) = status {
                self.finish_readers();
                self.closed = true;
                return Ok(status.code());
            }
            if start.elapsed() > timeout {
                self.close();
                return Err(BridgeError::timeout(
                    "Bridge shell did not exit within bound",
                    &self.trace_id,
                ));
            }
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    /// Guarantees subprocess termination and resource release; safe to call
    /// more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Ok(mut guard) = self.child.lock() {
            let _ = guard.kill();
            let _ = guard.wait();
        }
        self.finish_readers();
    }

    fn finish_readers(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        for join in self.readers.drain(..) {
            let _ = join.join();
        }
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        self.close();
    }
}

enum ReaderStream {
    Stdout(std::process::ChildStdout),
    Stderr(std::process::ChildStderr),
}

impl ReaderStream {
    fn drain(
        self,
        lines: Arc<Mutex<SessionLines>>,
        stop: Arc<AtomicBool>,
        classifier: LineClassifier,
        trace_id: String,
    ) {
        match self {
            ReaderStream::Stdout(stdout) => {
                drain_lines(BufReader::new(stdout), lines, stop, classifier, trace_id)
            }
            ReaderStream::Stderr(stderr) => {
                drain_lines(BufReader::new(stderr), lines, stop, classifier, trace_id)
            }
        }
    }
}

fn drain_lines<R: BufRead>(
    reader: R,
    lines: Arc<Mutex<SessionLines>>,
    stop: Arc<AtomicBool>,
    classifier: LineClassifier,
    trace_id: String,
) {
    for line in reader.lines() {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                warn!(trace_id = %trace_id, error = %err, "failed to read bridge shell output");
                break;
            }
        };
        let trimmed = line.trim_end_matches(['\r', '\n']).to_string();
        let significant = classifier.is_significant(&trimmed);
        if let Ok(mut guard) = lines.lock() {
            guard.raw.push(trimmed.clone());
            if significant {
                guard.significant.push(trimmed);
            }
        }
    }
}
