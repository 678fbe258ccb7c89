//! Concrete backends: emulator, board loader and debugger front-ends

mod gdb;
mod openocd;
mod qemu;

pub use gdb::{Debugger, Frontend};
pub use openocd::OpenOcd;
pub use qemu::Qemu;

use crate::config::LauncherConfig;
use crate::runtime::{LaunchError, Launchable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Backend kinds known to the launcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// QEMU system emulator
    Qemu,
    /// OpenOCD flashing a physical board
    Openocd,
    /// Plain GDB
    Gdb,
    /// CGDB curses front-end driving GDB
    Cgdb,
}

impl BackendKind {
    /// Name the backend is selected by
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Qemu => "qemu",
            BackendKind::Openocd => "openocd",
            BackendKind::Gdb => "gdb",
            BackendKind::Cgdb => "cgdb",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the launchable for `kind` from the launcher configuration
pub fn launchable(kind: BackendKind, config: &LauncherConfig) -> Launchable {
    let launchable = match kind {
        BackendKind::Qemu => Launchable::new(kind.name(), Qemu::new(config.qemu.clone())),
        BackendKind::Openocd => Launchable::new(
            kind.name(),
            OpenOcd::new(&config.board.program, config.board.script.clone()),
        ),
        BackendKind::Gdb => Launchable::new(kind.name(), Debugger::gdb(&config.triplet)),
        BackendKind::Cgdb => Launchable::new(kind.name(), Debugger::cgdb(&config.triplet)),
    };
    launchable.with_grace_period(config.grace_period())
}

/// Build launchables for a preference list, keeping its order
pub fn launchables(kinds: &[BackendKind], config: &LauncherConfig) -> Vec<Launchable> {
    kinds.iter().map(|&kind| launchable(kind, config)).collect()
}

fn require_image(image: &Path) -> Result<(), LaunchError> {
    if image.is_file() {
        Ok(())
    } else {
        Err(LaunchError::ImageNotFound(image.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launchables_keep_preference_order() {
        let config = LauncherConfig::default();
        let list = launchables(&[BackendKind::Cgdb, BackendKind::Gdb], &config);
        let names: Vec<_> = list.iter().map(|l| l.name()).collect();
        assert_eq!(names, vec!["cgdb", "gdb"]);
    }

    #[test]
    fn test_backend_kind_names_match_serde() {
        for kind in [
            BackendKind::Qemu,
            BackendKind::Openocd,
            BackendKind::Gdb,
            BackendKind::Cgdb,
        ] {
            let yaml = serde_yaml::to_string(&kind).unwrap();
            assert_eq!(yaml.trim(), kind.name());
        }
    }
}
