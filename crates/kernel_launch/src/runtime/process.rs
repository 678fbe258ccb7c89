//! Child process handles and the signals used to control them

use std::fmt;
use std::io;
use std::path::Path;
use std::process::{Child, Command, ExitStatus};
use std::time::{Duration, Instant};

#[cfg(target_os = "linux")]
use crate::runtime::sys;
#[cfg(target_os = "linux")]
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

/// Sleep granularity of the `try_wait` loop used when no pidfd is available
const POLL_STEP: Duration = Duration::from_millis(10);

/// Signals the launcher sends to its children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Graceful termination request (SIGTERM)
    Terminate,
    /// Forced termination (SIGKILL)
    Kill,
    /// User interrupt (SIGINT)
    Interrupt,
}

#[cfg(unix)]
impl From<Signal> for nix::sys::signal::Signal {
    fn from(signal: Signal) -> Self {
        match signal {
            Signal::Terminate => nix::sys::signal::Signal::SIGTERM,
            Signal::Kill => nix::sys::signal::Signal::SIGKILL,
            Signal::Interrupt => nix::sys::signal::Signal::SIGINT,
        }
    }
}

/// How a child process terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exit {
    /// Exit code, if the process exited on its own
    pub code: Option<i32>,
    /// Number of the signal that killed the process, if any
    pub signal: Option<i32>,
}

impl Exit {
    /// Exit with the given code
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Death by the given signal number
    pub fn signaled(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// Check if the process exited with code 0
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for Exit {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for Exit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "signal {}", signal),
            (None, None) => write!(f, "unknown status"),
        }
    }
}

/// A spawned child process.
///
/// Implemented by [`OsProcess`] for real children and by test doubles that
/// record the signals they receive.
pub trait ProcessHandle: Send {
    /// OS process id
    fn id(&self) -> u32;

    /// Deliver `signal` to the process
    fn send_signal(&mut self, signal: Signal) -> io::Result<()>;

    /// Block up to `timeout` (forever when `None`) for the process to exit.
    ///
    /// Returns `Ok(None)` if the process is still running once the bound
    /// elapses. Once an exit has been observed every later call returns it
    /// again without blocking.
    fn wait_timeout(&mut self, timeout: Option<Duration>) -> io::Result<Option<Exit>>;

    /// Descriptor that becomes readable once the process exits
    #[cfg(target_os = "linux")]
    fn exit_fd(&self) -> Option<RawFd> {
        None
    }
}

/// Creates child processes for launchables
pub trait Spawner: Send + Sync {
    fn spawn(&self, program: &Path, args: &[String]) -> io::Result<Box<dyn ProcessHandle>>;
}

/// Spawns real OS processes, each in a session of its own
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSpawner;

impl Spawner for OsSpawner {
    fn spawn(&self, program: &Path, args: &[String]) -> io::Result<Box<dyn ProcessHandle>> {
        let mut cmd = Command::new(program);
        cmd.args(args);

        // A new session keeps terminal-generated signals aimed at the
        // launcher (Ctrl+C) away from the child.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;

            // SAFETY: setsid() is async-signal-safe and touches no memory
            // shared with the parent.
            unsafe {
                cmd.pre_exec(|| {
                    nix::unistd::setsid()
                        .map(|_| ())
                        .map_err(io::Error::from)
                });
            }
        }

        let child = cmd.spawn()?;
        Ok(Box::new(OsProcess::new(child)))
    }
}

/// A real child process
pub struct OsProcess {
    child: Child,
    exit: Option<Exit>,
    #[cfg(target_os = "linux")]
    pidfd: Option<OwnedFd>,
}

impl OsProcess {
    /// Wrap a freshly spawned child
    pub fn new(child: Child) -> Self {
        #[cfg(target_os = "linux")]
        let pidfd = match sys::pidfd_open(child.id()) {
            Ok(fd) => Some(fd),
            Err(e) => {
                log::debug!(
                    "pidfd_open({}) failed, falling back to polling: {}",
                    child.id(),
                    e
                );
                None
            }
        };

        Self {
            child,
            exit: None,
            #[cfg(target_os = "linux")]
            pidfd,
        }
    }

    /// Non-blocking check that records the exit once seen
    fn reap(&mut self) -> io::Result<Option<Exit>> {
        if self.exit.is_none() {
            if let Some(status) = self.child.try_wait()? {
                self.exit = Some(Exit::from(status));
            }
        }
        Ok(self.exit)
    }

    /// Block for at most `remaining`, waking early when the child exits
    #[cfg(target_os = "linux")]
    fn pause(&self, remaining: Duration) -> io::Result<()> {
        match &self.pidfd {
            Some(fd) => sys::poll_readable(&[fd.as_raw_fd()], Some(remaining)).map(|_| ()),
            None => {
                std::thread::sleep(remaining.min(POLL_STEP));
                Ok(())
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn pause(&self, remaining: Duration) -> io::Result<()> {
        std::thread::sleep(remaining.min(POLL_STEP));
        Ok(())
    }
}

impl ProcessHandle for OsProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn send_signal(&mut self, signal: Signal) -> io::Result<()> {
        // A reaped pid may already belong to someone else
        if self.exit.is_some() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{self, kill};
            use nix::unistd::Pid;

            kill(
                Pid::from_raw(self.child.id() as i32),
                signal::Signal::from(signal),
            )
            .map_err(io::Error::from)
        }

        #[cfg(not(unix))]
        {
            match signal {
                Signal::Interrupt => Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "interrupting a child is not supported on this platform",
                )),
                Signal::Terminate | Signal::Kill => self.child.kill(),
            }
        }
    }

    fn wait_timeout(&mut self, timeout: Option<Duration>) -> io::Result<Option<Exit>> {
        if let Some(exit) = self.reap()? {
            return Ok(Some(exit));
        }

        let Some(timeout) = timeout else {
            let exit = Exit::from(self.child.wait()?);
            self.exit = Some(exit);
            return Ok(Some(exit));
        };

        let deadline = Instant::now() + timeout;
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            self.pause(deadline - now)?;
            if let Some(exit) = self.reap()? {
                return Ok(Some(exit));
            }
        }
    }

    #[cfg(target_os = "linux")]
    fn exit_fd(&self) -> Option<RawFd> {
        if self.exit.is_some() {
            return None;
        }
        self.pidfd.as_ref().map(|fd| fd.as_raw_fd())
    }
}
