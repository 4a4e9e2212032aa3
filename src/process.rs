//! Running an external program with captured standard streams.
//!
//! Every invocation gets its own child process. Stdout and stderr are drained by
//! one reader thread each, so a child blocked on a full pipe can never stall the
//! other stream. The calling thread coordinates: it waits for two independent
//! facts, the exit status and the closing of every output stream, and only
//! produces an [`InvocationResult`] once both are known.

use crate::config::Config;
use crate::decode::LineDecoder;
use crate::error::ImageMagickError;
use crate::utils::command_line;
use log::{debug, trace, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const READ_CHUNK_SIZE: usize = 8192;
/// After killing a child that timed out, how long to wait for its pipes to close.
const KILL_DRAIN_GRACE: Duration = Duration::from_millis(100);

/// A single external program run: what to start and what to feed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<String>,
    input: Option<Vec<u8>>,
    timeout: Option<Duration>,
    current_dir: Option<PathBuf>,
    envs: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            input: None,
            timeout: None,
            current_dir: None,
            envs: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends arguments. Order is kept exactly as given.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Bytes written to the child's stdin, which is then closed.
    pub fn input(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.input = Some(data.into());
        self
    }

    /// Kills the child if it has not completed within `timeout`. Zero means no limit.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.timeout_opt(Some(timeout))
    }

    pub fn timeout_opt(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    pub fn get_program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_input(&self) -> Option<&[u8]> {
        self.input.as_deref()
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn command_line(&self) -> String {
        command_line(&self.program, &self.args)
    }
}

/// Captured outcome of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationResult {
    exit_code: Option<i32>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    command_args: String,
}

impl InvocationResult {
    /// Exit code, or `None` if the process was ended by a signal.
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    pub fn command_line(&self) -> &str {
        &self.command_args
    }

    pub fn into_stdout(self) -> Vec<u8> {
        self.stdout
    }

    /// Turns a non-zero exit into [`ImageMagickError::NonZeroExit`].
    pub fn into_success(self) -> Result<Self, ImageMagickError> {
        if self.success() {
            return Ok(self);
        }
        let stderr = self.stderr_text();
        Err(ImageMagickError::NonZeroExit {
            code: self.exit_code,
            stdout: self.stdout,
            stderr,
            command_args: self.command_args,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => f.write_str("stdout"),
            StreamKind::Stderr => f.write_str("stderr"),
        }
    }
}

/// Tracks the two conditions an invocation needs before it is complete.
///
/// The exit status and the end of the output streams are reported by different
/// sources and may arrive in either order.
#[derive(Debug, Default)]
struct Completion {
    exit: Option<ExitStatus>,
    stdout_closed: bool,
    stderr_closed: bool,
}

impl Completion {
    fn exited(&mut self, status: ExitStatus) {
        trace!("completion: exited with {}", status);
        self.exit = Some(status);
    }

    fn stream_closed(&mut self, kind: StreamKind) {
        trace!("completion: {} closed", kind);
        match kind {
            StreamKind::Stdout => self.stdout_closed = true,
            StreamKind::Stderr => self.stderr_closed = true,
        }
    }

    fn streams_closed(&self) -> bool {
        self.stdout_closed && self.stderr_closed
    }

    fn open_streams(&self) -> usize {
        usize::from(!self.stdout_closed) + usize::from(!self.stderr_closed)
    }

    fn is_done(&self) -> bool {
        self.exit.is_some() && self.streams_closed()
    }
}

type SharedBuffer = Arc<Mutex<Vec<u8>>>;

fn take_buffer(buffer: &SharedBuffer) -> Vec<u8> {
    std::mem::take(&mut *buffer.lock().unwrap_or_else(PoisonError::into_inner))
}

/// Spawns external programs and collects their output.
///
/// Working directory and environment set here apply to every invocation; an
/// [`Invocation`] can override them.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    current_dir: Option<PathBuf>,
    envs: BTreeMap<String, String>,
    poll_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            current_dir: None,
            envs: BTreeMap::new(),
            poll_interval: POLL_INTERVAL,
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            current_dir: config.current_dir.clone(),
            envs: config.envs.clone(),
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Runs the invocation to completion.
    pub fn run(&self, invocation: Invocation) -> Result<InvocationResult, ImageMagickError> {
        self.spawn(invocation)?.wait()
    }

    /// Starts the child and its stream threads without waiting for it.
    pub fn spawn(&self, invocation: Invocation) -> Result<PendingInvocation, ImageMagickError> {
        let Invocation {
            program,
            args,
            input,
            timeout,
            current_dir,
            envs,
        } = invocation;
        let command_args = command_line(&program, &args);
        debug!("Spawning: {}", command_args);

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .envs(&self.envs)
            .envs(&envs);
        if let Some(dir) = current_dir.as_ref().or(self.current_dir.as_ref()) {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .map_err(|source| ImageMagickError::ProgramNotFound {
                program: program.to_string_lossy().into_owned(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("Failed to capture stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("Failed to capture stderr"))?;

        if let Some(data) = input {
            let stdin = child
                .stdin
                .take()
                .ok_or_else(|| std::io::Error::other("Failed to capture stdin"))?;
            spawn_writer(stdin, data);
        }

        let stdout_buffer = SharedBuffer::default();
        let stderr_buffer = SharedBuffer::default();
        let (events_sender, events) = mpsc::channel();
        let readers = vec![
            spawn_reader(
                StreamKind::Stdout,
                stdout,
                Arc::clone(&stdout_buffer),
                events_sender.clone(),
            ),
            spawn_reader(
                StreamKind::Stderr,
                stderr,
                Arc::clone(&stderr_buffer),
                events_sender,
            ),
        ];

        Ok(PendingInvocation {
            child,
            command_args,
            timeout,
            started: Instant::now(),
            poll_interval: self.poll_interval,
            events,
            stdout: stdout_buffer,
            stderr: stderr_buffer,
            readers,
        })
    }
}

fn spawn_writer(mut stdin: ChildStdin, data: Vec<u8>) {
    thread::spawn(move || {
        match stdin.write_all(&data).and_then(|()| stdin.flush()) {
            Ok(()) => {}
            // The child may exit without consuming all of its input.
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!("Child closed stdin after accepting part of {} bytes", data.len());
            }
            Err(e) => warn!("Failed writing {} bytes to stdin: {}", data.len(), e),
        }
        // Dropping stdin closes it.
    });
}

fn spawn_reader<R>(
    kind: StreamKind,
    mut stream: R,
    buffer: SharedBuffer,
    events: Sender<StreamKind>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut lines = (kind == StreamKind::Stderr).then(LineDecoder::default);
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    buffer
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .extend_from_slice(&chunk[..n]);
                    if let Some(lines) = lines.as_mut() {
                        for line in lines.push(&chunk[..n]) {
                            debug!("{}: {}", kind, line);
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    debug!("Stopped reading {}: {}", kind, e);
                    break;
                }
            }
        }
        if let Some(line) = lines.and_then(LineDecoder::finish) {
            debug!("{}: {}", kind, line);
        }
        // The receiver is gone if the invocation already timed out.
        let _ = events.send(kind);
    })
}

/// A child that has been started but not yet waited for.
///
/// Dropping it without calling [`wait`](Self::wait) kills the child.
#[derive(Debug)]
pub struct PendingInvocation {
    child: Child,
    command_args: String,
    timeout: Option<Duration>,
    started: Instant,
    poll_interval: Duration,
    events: Receiver<StreamKind>,
    stdout: SharedBuffer,
    stderr: SharedBuffer,
    readers: Vec<JoinHandle<()>>,
}

impl PendingInvocation {
    /// OS process id of the child.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    pub fn command_line(&self) -> &str {
        &self.command_args
    }

    /// Blocks until the child has exited and both output streams are closed,
    /// or until the timeout kills it.
    pub fn wait(mut self) -> Result<InvocationResult, ImageMagickError> {
        let deadline = self.timeout.map(|t| self.started + t);
        let mut completion = Completion::default();

        loop {
            if completion.exit.is_none() {
                if let Some(status) = self.child.try_wait()? {
                    completion.exited(status);
                }
            }
            if completion.is_done() {
                break;
            }

            let mut wait_for = self.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(self.kill_after_timeout(&completion));
                }
                wait_for = wait_for.min(deadline - now);
            }

            match self.events.recv_timeout(wait_for) {
                Ok(kind) => completion.stream_closed(kind),
                Err(RecvTimeoutError::Timeout) => {}
                // Both readers have reported and hung up.
                Err(RecvTimeoutError::Disconnected) => {
                    completion.stream_closed(StreamKind::Stdout);
                    completion.stream_closed(StreamKind::Stderr);
                }
            }
        }

        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }

        let exit_code = completion.exit.and_then(|status| status.code());
        debug!(
            "Finished with exit code {:?} in {:?}: {}",
            exit_code,
            self.started.elapsed(),
            self.command_args
        );
        Ok(InvocationResult {
            exit_code,
            stdout: take_buffer(&self.stdout),
            stderr: take_buffer(&self.stderr),
            command_args: std::mem::take(&mut self.command_args),
        })
    }

    fn kill_after_timeout(&mut self, completion: &Completion) -> ImageMagickError {
        let timeout = self.timeout.unwrap_or_default();
        warn!("Killing process after {:?}: {}", timeout, self.command_args);
        // Fails only if the child already exited, which is fine.
        let _ = self.child.kill();
        let _ = self.child.wait();

        // Let the readers pick up whatever the child wrote before it died. A
        // grandchild holding the pipes open must not keep us here.
        let grace_deadline = Instant::now() + KILL_DRAIN_GRACE;
        let mut open = completion.open_streams();
        while open > 0 {
            let remaining = grace_deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(_) => open -= 1,
                Err(_) => break,
            }
        }

        ImageMagickError::Timeout {
            timeout,
            stdout: take_buffer(&self.stdout),
            stderr: take_buffer(&self.stderr),
            command_args: self.command_args.clone(),
        }
    }
}

impl Drop for PendingInvocation {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
