//! Physical board loader driven through OpenOCD

use super::require_image;
use crate::runtime::{Backend, CommandLine, LaunchError, LaunchParams};
use crate::toolchain::find_program;
use std::path::{Path, PathBuf};

/// Flashes the kernel onto a board and keeps its GDB server running when
/// debugging
#[derive(Debug, Clone)]
pub struct OpenOcd {
    program: PathBuf,
    script: Option<PathBuf>,
}

impl OpenOcd {
    pub fn new(program: impl AsRef<Path>, script: Option<PathBuf>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            script,
        }
    }
}

impl Backend for OpenOcd {
    fn probe(&self) -> bool {
        let has_script = self.script.as_deref().is_some_and(Path::is_file);
        has_script && find_program(&self.program).is_some()
    }

    fn configure(&self, params: &LaunchParams) -> Result<CommandLine, LaunchError> {
        require_image(&params.image)?;

        let script = self.script.as_ref().ok_or_else(|| LaunchError::InvalidConfig {
            name: "openocd".to_string(),
            reason: "no board script configured".to_string(),
        })?;

        if !params.args.is_empty() {
            log::warn!(
                "[openocd] Kernel arguments cannot be passed to a board, ignoring '{}'",
                params.args
            );
        }

        let program = find_program(&self.program).unwrap_or_else(|| self.program.clone());
        let mut command = CommandLine::new(program)
            .arg("-f")
            .arg(script.to_string_lossy())
            .arg("-c")
            .arg(format!("gdb_port {}", params.gdb_port))
            .args(["-c", "init"])
            .arg("-c")
            .arg(format!("program {{{}}} verify", params.image.display()));

        command = if params.debug {
            command.args(["-c", "reset halt"])
        } else {
            command.args(["-c", "reset run", "-c", "shutdown"])
        };

        Ok(command)
    }
}
