//! Launchable backends and the lifecycle of their process

use crate::runtime::process::{Exit, OsSpawner, ProcessHandle, Signal, Spawner};
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(target_os = "linux")]
use std::os::fd::RawFd;

/// Port the kernel UART is forwarded to unless configured otherwise
pub const DEFAULT_UART_PORT: u16 = 8000;

/// Port of the emulator or board GDB stub unless configured otherwise
pub const DEFAULT_GDB_PORT: u16 = 1234;

/// How long `stop` waits after SIGTERM before sending SIGKILL
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(200);

/// Parameters handed to [`Backend::configure`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchParams {
    /// Kernel image to run
    pub image: PathBuf,
    /// Extra kernel command line
    pub args: String,
    /// Pause the target until a debugger attaches
    pub debug: bool,
    /// TCP port the UART is forwarded to
    pub uart_port: u16,
    /// TCP port of the GDB stub
    pub gdb_port: u16,
}

impl LaunchParams {
    pub fn new(image: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            args: String::new(),
            debug: false,
            uart_port: DEFAULT_UART_PORT,
            gdb_port: DEFAULT_GDB_PORT,
        }
    }

    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = args.into();
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_uart_port(mut self, port: u16) -> Self {
        self.uart_port = port;
        self
    }

    pub fn with_gdb_port(mut self, port: u16) -> Self {
        self.gdb_port = port;
        self
    }
}

/// A resolved program and its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// One kind of external execution backend (emulator, board loader, debugger)
pub trait Backend: Send {
    /// Check whether the backend is usable on this host.
    ///
    /// Inspection only: no state may change and nothing may be spawned.
    fn probe(&self) -> bool;

    /// Validate `params` and build the command line that runs them
    fn configure(&self, params: &LaunchParams) -> Result<CommandLine, LaunchError>;
}

/// Lifecycle state of a launchable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchStatus {
    /// Nothing configured yet
    Idle,
    /// A command line is stored but nothing runs
    Configured,
    /// A process is running
    Running,
    /// The process terminated on its own and was reaped by `wait`
    Exited(Exit),
    /// The process was terminated by `stop`
    Stopped,
}

impl LaunchStatus {
    /// Check if a process is running
    pub fn is_running(&self) -> bool {
        matches!(self, LaunchStatus::Running)
    }
}

/// A controllable external backend owning at most one live process
pub struct Launchable {
    name: String,
    backend: Box<dyn Backend>,
    spawner: Arc<dyn Spawner>,
    command: Option<CommandLine>,
    process: Option<Box<dyn ProcessHandle>>,
    status: LaunchStatus,
    grace_period: Duration,
}

impl Launchable {
    /// Create a launchable for `backend` that spawns real OS processes
    pub fn new(name: impl Into<String>, backend: impl Backend + 'static) -> Self {
        Self {
            name: name.into(),
            backend: Box::new(backend),
            spawner: Arc::new(OsSpawner),
            command: None,
            process: None,
            status: LaunchStatus::Idle,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Replace the process spawner
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Set how long `stop` waits between SIGTERM and SIGKILL
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configured command line, if any
    pub fn command(&self) -> Option<&CommandLine> {
        self.command.as_ref()
    }

    pub fn status(&self) -> LaunchStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.process.is_some()
    }

    /// Process id of the running process
    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(|p| p.id())
    }

    /// Check whether the backend can be used on this host
    pub fn probe(&self) -> bool {
        self.backend.probe()
    }

    /// Build and store the command line for `params`. The last call wins.
    pub fn configure(&mut self, params: &LaunchParams) -> Result<(), LaunchError> {
        let command = self.backend.configure(params)?;
        log::debug!("[{}] Configured: {}", self.name, command);
        self.command = Some(command);
        if self.process.is_none() {
            self.status = LaunchStatus::Configured;
        }
        Ok(())
    }

    /// Spawn the configured command. Does nothing when unconfigured.
    pub fn start(&mut self) -> Result<(), LaunchError> {
        let Some(command) = &self.command else {
            log::debug!("[{}] Not configured, nothing to start", self.name);
            return Ok(());
        };

        if self.process.is_some() {
            return Err(LaunchError::AlreadyRunning(self.name.clone()));
        }

        log::info!("[{}] Starting: {}", self.name, command);
        let process = self
            .spawner
            .spawn(&command.program, &command.args)
            .map_err(|source| {
                log::error!("[{}] Failed to spawn process: {}", self.name, source);
                LaunchError::SpawnFailed {
                    name: self.name.clone(),
                    source,
                }
            })?;

        log::info!("[{}] Process started with PID: {}", self.name, process.id());
        self.process = Some(process);
        self.status = LaunchStatus::Running;
        Ok(())
    }

    /// Wait up to `timeout` (forever when `None`) for the process to exit.
    ///
    /// Returns `Ok(false)` when nothing is running and `Ok(true)` once the
    /// process has terminated, in which case the handle is released. A bound
    /// that elapses first yields [`LaunchError::Timeout`] and keeps the
    /// handle.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<bool, LaunchError> {
        let Some(process) = self.process.as_mut() else {
            return Ok(false);
        };

        match process.wait_timeout(timeout) {
            Ok(Some(exit)) => {
                log::info!("[{}] Process exited with {}", self.name, exit);
                self.process = None;
                self.status = LaunchStatus::Exited(exit);
                Ok(true)
            }
            Ok(None) => Err(LaunchError::Timeout {
                name: self.name.clone(),
                timeout: timeout.unwrap_or_default(),
            }),
            Err(source) => Err(LaunchError::WaitFailed {
                name: self.name.clone(),
                source,
            }),
        }
    }

    /// Terminate the process: SIGTERM, then SIGKILL once the grace period
    /// elapses.
    ///
    /// The handle is released either way. If even SIGKILL does not reap the
    /// process within another grace period a warning is logged, but the
    /// launchable still reports itself idle.
    pub fn stop(&mut self) {
        let Some(mut process) = self.process.take() else {
            log::debug!("[{}] Not running, nothing to stop", self.name);
            return;
        };

        log::info!("[{}] Stopping process {}...", self.name, process.id());

        if let Err(e) = process.send_signal(Signal::Terminate) {
            log::warn!("[{}] Failed to send SIGTERM: {}", self.name, e);
        }

        let exit = match process.wait_timeout(Some(self.grace_period)) {
            Ok(Some(exit)) => Some(exit),
            Ok(None) => self.force_kill(process.as_mut()),
            Err(e) => {
                log::warn!("[{}] Error waiting for process: {}", self.name, e);
                self.force_kill(process.as_mut())
            }
        };

        if let Some(exit) = exit {
            log::info!("[{}] Process stopped with {}", self.name, exit);
        }
        self.status = LaunchStatus::Stopped;
    }

    fn force_kill(&self, process: &mut dyn ProcessHandle) -> Option<Exit> {
        log::warn!(
            "[{}] Process did not exit gracefully, forcing kill",
            self.name
        );
        if let Err(e) = process.send_signal(Signal::Kill) {
            log::warn!("[{}] Failed to send SIGKILL: {}", self.name, e);
        }

        match process.wait_timeout(Some(self.grace_period)) {
            Ok(Some(exit)) => Some(exit),
            Ok(None) => {
                log::warn!(
                    "[{}] Process {} still alive after SIGKILL",
                    self.name,
                    process.id()
                );
                None
            }
            Err(e) => {
                log::warn!("[{}] Error waiting for killed process: {}", self.name, e);
                None
            }
        }
    }

    /// Send SIGINT to the running process. Does nothing when idle.
    pub fn interrupt(&mut self) -> Result<(), LaunchError> {
        let Some(process) = self.process.as_mut() else {
            return Ok(());
        };

        log::debug!("[{}] Interrupting process {}", self.name, process.id());
        process
            .send_signal(Signal::Interrupt)
            .map_err(|source| LaunchError::SignalFailed {
                name: self.name.clone(),
                source,
            })
    }

    #[cfg(target_os = "linux")]
    pub(crate) fn exit_fd(&self) -> Option<RawFd> {
        self.process.as_ref().and_then(|p| p.exit_fd())
    }
}

impl Drop for Launchable {
    fn drop(&mut self) {
        if self.process.is_some() {
            self.stop();
        }
    }
}

impl fmt::Debug for Launchable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Launchable")
            .field("name", &self.name)
            .field("command", &self.command)
            .field("status", &self.status)
            .field("pid", &self.pid())
            .finish()
    }
}

/// Errors that can occur while launching or supervising backends
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("'{name}' did not terminate within {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("'{0}' is already running")]
    AlreadyRunning(String),

    #[error("Failed to spawn '{name}': {source}")]
    SpawnFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for '{name}': {source}")]
    WaitFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to signal '{name}': {source}")]
    SignalFailed {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Kernel image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    #[error("Invalid configuration for '{name}': {reason}")]
    InvalidConfig { name: String, reason: String },

    #[error("No backend is available on this host")]
    NoBackendAvailable,

    #[error("Backend '{}' is not available (available: {})", .name, .available.join(", "))]
    Unavailable { name: String, available: Vec<String> },

    #[error("None of the given launchables is running")]
    NothingRunning,

    #[error("Cross toolchain '{0}' not found on PATH")]
    ToolchainMissing(String),
}

impl LaunchError {
    /// Check if this is a bounded wait that elapsed
    pub fn is_timeout(&self) -> bool {
        matches!(self, LaunchError::Timeout { .. })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_start_unconfigured_is_noop() {
        let spawner = FakeSpawner::new(Behavior::Graceful);
        let mut launchable =
            Launchable::new("qemu", FakeBackend::new(true)).with_spawner(spawner.clone());

        launchable.start().unwrap();

        assert_eq!(spawner.spawn_count(), 0);
        assert!(!launchable.is_running());
        assert_eq!(launchable.pid(), None);
        assert_eq!(launchable.status(), LaunchStatus::Idle);
    }

    #[test]
    fn test_start_spawns_configured_command() {
        let spawner = FakeSpawner::new(Behavior::Graceful);
        let mut launchable = fake_launchable("qemu", &spawner);

        launchable.start().unwrap();

        assert!(launchable.is_running());
        assert_eq!(launchable.status(), LaunchStatus::Running);
        let spawned = spawner.journal.spawned.lock().unwrap().clone();
        assert_eq!(
            spawned,
            vec![(PathBuf::from("fake"), vec!["qemu.elf".to_string()])]
        );
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let spawner = FakeSpawner::new(Behavior::Graceful);
        let mut launchable = fake_launchable("qemu", &spawner);

        launchable.start().unwrap();
        let result = launchable.start();

        assert!(matches!(result, Err(LaunchError::AlreadyRunning(_))));
        assert_eq!(spawner.spawn_count(), 1);
    }

    #[test]
    fn test_configure_last_call_wins() {
        let mut launchable = Launchable::new("qemu", FakeBackend::new(true));
        launchable.configure(&LaunchParams::new("first.elf")).unwrap();
        launchable.configure(&LaunchParams::new("second.elf")).unwrap();

        let command = launchable.command().unwrap();
        assert_eq!(command.args, vec!["second.elf".to_string()]);
        assert_eq!(launchable.status(), LaunchStatus::Configured);
    }

    #[test]
    fn test_stop_graceful_sends_one_signal() {
        let spawner = FakeSpawner::new(Behavior::Graceful);
        let mut launchable = fake_launchable("qemu", &spawner);
        launchable.start().unwrap();

        launchable.stop();

        assert_eq!(spawner.signals(), vec![Signal::Terminate]);
        assert!(!launchable.is_running());
        assert_eq!(launchable.status(), LaunchStatus::Stopped);
    }

    #[test]
    fn test_stop_escalates_to_kill() {
        let spawner = FakeSpawner::new(Behavior::Stubborn);
        let mut launchable = fake_launchable("qemu", &spawner);
        launchable.start().unwrap();

        launchable.stop();

        assert_eq!(spawner.signals(), vec![Signal::Terminate, Signal::Kill]);
        assert!(!launchable.is_running());
        assert_eq!(launchable.pid(), None);
    }

    #[test]
    fn test_stop_clears_handle_even_if_kill_is_ignored() {
        let spawner = FakeSpawner::new(Behavior::Unkillable);
        let mut launchable = fake_launchable("qemu", &spawner);
        launchable.start().unwrap();

        launchable.stop();

        assert_eq!(spawner.signals(), vec![Signal::Terminate, Signal::Kill]);
        assert!(!launchable.is_running());
        assert_eq!(launchable.status(), LaunchStatus::Stopped);
    }

    #[test]
    fn test_stop_unconfigured_is_noop() {
        let spawner = FakeSpawner::new(Behavior::Graceful);
        let mut launchable =
            Launchable::new("qemu", FakeBackend::new(true)).with_spawner(spawner.clone());

        launchable.stop();

        assert!(spawner.signals().is_empty());
        assert_eq!(launchable.status(), LaunchStatus::Idle);
    }

    #[test]
    fn test_restart_after_stop() {
        let spawner = FakeSpawner::new(Behavior::Graceful);
        let mut launchable = fake_launchable("qemu", &spawner);

        launchable.start().unwrap();
        launchable.stop();
        launchable.start().unwrap();

        assert!(launchable.is_running());
        assert_eq!(spawner.spawn_count(), 2);
    }

    #[test]
    fn test_wait_without_process_is_noop() {
        let mut launchable = Launchable::new("qemu", FakeBackend::new(true));
        assert!(!launchable.wait(Some(Duration::from_millis(10))).unwrap());
        assert!(!launchable.wait(None).unwrap());
    }

    #[test]
    fn test_wait_timeout_keeps_handle() {
        let spawner = FakeSpawner::new(Behavior::Stubborn);
        let mut launchable = fake_launchable("qemu", &spawner);
        launchable.start().unwrap();

        let err = launchable.wait(Some(Duration::from_millis(10))).unwrap_err();

        assert!(err.is_timeout());
        assert!(launchable.is_running());
    }

    #[test]
    fn test_wait_reaps_exited_process() {
        let spawner = FakeSpawner::new(Behavior::Exited(3));
        let mut launchable = fake_launchable("qemu", &spawner);
        launchable.start().unwrap();

        assert!(launchable.wait(Some(Duration::ZERO)).unwrap());

        assert!(!launchable.is_running());
        assert_eq!(launchable.status(), LaunchStatus::Exited(Exit::code(3)));
        // A reaped launchable has nothing left to wait for
        assert!(!launchable.wait(None).unwrap());
    }

    #[test]
    fn test_interrupt_sends_sigint_only_when_running() {
        let spawner = FakeSpawner::new(Behavior::Stubborn);
        let mut launchable = fake_launchable("gdb", &spawner);

        launchable.interrupt().unwrap();
        assert!(spawner.signals().is_empty());

        launchable.start().unwrap();
        launchable.interrupt().unwrap();
        assert_eq!(spawner.signals(), vec![Signal::Interrupt]);
        assert!(launchable.is_running());
    }

    #[test]
    fn test_drop_stops_running_process() {
        let spawner = FakeSpawner::new(Behavior::Graceful);
        {
            let mut launchable = fake_launchable("qemu", &spawner);
            launchable.start().unwrap();
        }
        assert_eq!(spawner.signals(), vec![Signal::Terminate]);
    }

    #[test]
    fn test_command_line_display() {
        let command = CommandLine::new("/usr/bin/qemu-system-mipsel")
            .arg("-kernel")
            .args(["kernel.elf", "-S"]);
        assert_eq!(
            command.to_string(),
            "/usr/bin/qemu-system-mipsel -kernel kernel.elf -S"
        );
    }

    #[test]
    fn test_error_display() {
        let err = LaunchError::Unavailable {
            name: "ovpsim".to_string(),
            available: vec!["qemu".to_string(), "openocd".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Backend 'ovpsim' is not available (available: qemu, openocd)"
        );
        assert!(!err.is_timeout());
    }
}
