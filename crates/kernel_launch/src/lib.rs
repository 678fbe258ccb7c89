//! Kernel Launch
//!
//! Runs a freshly built kernel image on whichever execution backend the host
//! offers, optionally with a debugger attached, and supervises the result.
//!
//! # Overview
//!
//! - Backends (emulator, board loader, debugger) are probed in preference
//!   order; the first usable one becomes the default
//! - Each selected backend is configured from the kernel image, kernel
//!   arguments, debug flag and port numbers, then started in its own session
//! - The launcher blocks until any of them exits, forwarding Ctrl+C to the
//!   debugger while one is attached
//! - Shutdown sends SIGTERM, escalating to SIGKILL after a short grace period
//!
//! # Example Configuration
//!
//! ```yaml
//! kernel:
//!   image: sys/kernel.elf
//!   args: "init=/bin/ksh"
//!   debug: true
//!
//! emulators: [qemu, openocd]
//! debuggers: [cgdb, gdb]
//!
//! board:
//!   script: boards/pic32mz.cfg
//! ```

pub mod backends;
pub mod config;
pub mod runtime;
pub mod toolchain;

pub use backends::BackendKind;
pub use config::{ConfigError, LauncherConfig};
pub use runtime::{
    find_available, poll_any, wait_any, Backend, CommandLine, Exit, LaunchError, LaunchParams,
    LaunchStatus, Launchable, OsSpawner, Outcome, ProcessHandle, Registry, Session, Signal,
    Spawner,
};
pub use toolchain::{find_program, find_toolchain};
