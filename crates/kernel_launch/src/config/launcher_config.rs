//! Launcher configuration YAML schema

use crate::backends::BackendKind;
use crate::runtime::{
    LaunchParams, DEFAULT_GDB_PORT, DEFAULT_GRACE_PERIOD, DEFAULT_UART_PORT, POLL_INTERVAL,
};
use crate::toolchain::DEFAULT_TRIPLET;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root launcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Cross toolchain target triplet
    pub triplet: String,

    /// TCP port the kernel UART is forwarded to
    pub uart_port: u16,

    /// TCP port of the GDB stub
    pub gdb_port: u16,

    /// Delay between SIGTERM and SIGKILL when stopping a backend
    pub grace_period_ms: u64,

    /// How long each supervision pass blocks
    pub poll_interval_ms: u64,

    /// What to run
    pub kernel: KernelConfig,

    /// Emulators and board loaders, most desirable first
    pub emulators: Vec<BackendKind>,

    /// Debuggers, most desirable first
    pub debuggers: Vec<BackendKind>,

    /// Explicit emulator choice (default: first available)
    pub emulator: Option<String>,

    /// Explicit debugger choice (default: first available)
    pub debugger: Option<String>,

    /// QEMU settings
    pub qemu: QemuConfig,

    /// Board loader settings
    pub board: BoardConfig,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            triplet: DEFAULT_TRIPLET.to_string(),
            uart_port: DEFAULT_UART_PORT,
            gdb_port: DEFAULT_GDB_PORT,
            grace_period_ms: DEFAULT_GRACE_PERIOD.as_millis() as u64,
            poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
            kernel: KernelConfig::default(),
            emulators: vec![BackendKind::Qemu, BackendKind::Openocd],
            debuggers: vec![BackendKind::Cgdb, BackendKind::Gdb],
            emulator: None,
            debugger: None,
            qemu: QemuConfig::default(),
            board: BoardConfig::default(),
        }
    }
}

/// Kernel image and how to boot it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Path to the kernel image
    pub image: PathBuf,
    /// Extra kernel command line
    pub args: String,
    /// Pause the target and attach a debugger
    pub debug: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            image: PathBuf::from("sys/kernel.elf"),
            args: String::new(),
            debug: false,
        }
    }
}

/// QEMU settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QemuConfig {
    pub program: PathBuf,
    pub machine: String,
    pub cpu: String,
    pub memory: String,
}

impl Default for QemuConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("qemu-system-mipsel"),
            machine: "malta".to_string(),
            cpu: "24Kf".to_string(),
            memory: "128M".to_string(),
        }
    }
}

/// OpenOCD board loader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub program: PathBuf,
    /// Board script passed with `-f`; the loader is unavailable without one
    pub script: Option<PathBuf>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("openocd"),
            script: None,
        }
    }
}

impl LauncherConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: LauncherConfig = serde_yaml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grace_period_ms == 0 {
            return Err(ConfigError::Validation(
                "'grace_period_ms' must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "'poll_interval_ms' must be greater than zero".to_string(),
            ));
        }

        for (field, kinds) in [("emulators", &self.emulators), ("debuggers", &self.debuggers)] {
            let mut seen = HashSet::new();
            for kind in kinds {
                if !seen.insert(kind) {
                    return Err(ConfigError::Validation(format!(
                        "'{}' lists '{}' more than once",
                        field, kind
                    )));
                }
            }
        }

        for (field, choice, kinds) in [
            ("emulator", &self.emulator, &self.emulators),
            ("debugger", &self.debugger, &self.debuggers),
        ] {
            if let Some(choice) = choice {
                if !kinds.iter().any(|k| k.name() == choice.as_str()) {
                    return Err(ConfigError::Validation(format!(
                        "'{}: {}' is not in '{}s'",
                        field, choice, field
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Parameters every backend is configured with
    pub fn launch_params(&self) -> LaunchParams {
        LaunchParams::new(&self.kernel.image)
            .with_args(self.kernel.args.as_str())
            .with_debug(self.kernel.debug)
            .with_uart_port(self.uart_port)
            .with_gdb_port(self.gdb_port)
    }
}

/// Errors that can occur when loading the configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
