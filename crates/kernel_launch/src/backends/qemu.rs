//! QEMU system emulator

use super::require_image;
use crate::config::QemuConfig;
use crate::runtime::{Backend, CommandLine, LaunchError, LaunchParams};
use crate::toolchain::find_program;

/// Runs the kernel on an emulated board
#[derive(Debug, Clone)]
pub struct Qemu {
    config: QemuConfig,
}

impl Qemu {
    pub fn new(config: QemuConfig) -> Self {
        Self { config }
    }
}

impl Backend for Qemu {
    fn probe(&self) -> bool {
        find_program(&self.config.program).is_some()
    }

    fn configure(&self, params: &LaunchParams) -> Result<CommandLine, LaunchError> {
        require_image(&params.image)?;

        let program = find_program(&self.config.program)
            .unwrap_or_else(|| self.config.program.clone());

        let mut command = CommandLine::new(program)
            .args(["-nodefaults", "-nographic"])
            .args(["-machine", self.config.machine.as_str()])
            .args(["-cpu", self.config.cpu.as_str()])
            .args(["-m", self.config.memory.as_str()])
            .args(["-icount", "shift=3"])
            .arg("-kernel")
            .arg(params.image.to_string_lossy())
            .arg("-gdb")
            .arg(format!("tcp:127.0.0.1:{}", params.gdb_port))
            .args(["-serial", "none"])
            .arg("-serial")
            .arg(format!("tcp:127.0.0.1:{},server,nowait", params.uart_port));

        if !params.args.is_empty() {
            command = command.arg("-append").arg(params.args.as_str());
        }
        if params.debug {
            command = command.arg("-S");
        }

        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> tempfile::NamedTempFile {
        tempfile::NamedTempFile::new().unwrap()
    }

    #[test]
    fn test_command_line() {
        let image = image();
        let qemu = Qemu::new(QemuConfig::default());
        let params = LaunchParams::new(image.path())
            .with_args("init=/bin/ksh")
            .with_uart_port(8123);

        let command = qemu.configure(&params).unwrap();
        let args = command.args.join(" ");

        assert!(args.contains("-machine malta -cpu 24Kf"));
        assert!(args.contains(&format!("-kernel {}", image.path().display())));
        assert!(args.contains("-gdb tcp:127.0.0.1:1234"));
        assert!(args.contains("-serial tcp:127.0.0.1:8123,server,nowait"));
        assert!(args.ends_with("-append init=/bin/ksh"));
        assert!(!command.args.contains(&"-S".to_string()));
    }

    #[test]
    fn test_debug_pauses_cpu() {
        let image = image();
        let qemu = Qemu::new(QemuConfig::default());
        let params = LaunchParams::new(image.path()).with_debug(true);

        let command = qemu.configure(&params).unwrap();

        assert_eq!(command.args.last().map(String::as_str), Some("-S"));
        assert!(!command.args.contains(&"-append".to_string()));
    }

    #[test]
    fn test_missing_image_is_rejected() {
        let qemu = Qemu::new(QemuConfig::default());
        let result = qemu.configure(&LaunchParams::new("/nonexistent/kernel.elf"));
        assert!(matches!(result, Err(LaunchError::ImageNotFound(_))));
    }

    #[test]
    fn test_probe_fails_without_binary() {
        let qemu = Qemu::new(QemuConfig {
            program: "/nonexistent/qemu-system-mipsel".into(),
            ..QemuConfig::default()
        });
        assert!(!qemu.probe());
    }
}
