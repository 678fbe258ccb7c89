//! Debugger front-ends attaching to the GDB stub of the target

use super::require_image;
use crate::runtime::{Backend, CommandLine, LaunchError, LaunchParams};
use crate::toolchain::find_program;
use std::path::PathBuf;

/// Which user interface drives the cross GDB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frontend {
    Gdb,
    Cgdb,
}

/// An interactive debugger session against the running kernel
#[derive(Debug, Clone)]
pub struct Debugger {
    frontend: Frontend,
    gdb: PathBuf,
    cgdb: PathBuf,
}

impl Debugger {
    /// Plain `<triplet>-gdb`
    pub fn gdb(triplet: &str) -> Self {
        Self::new(Frontend::Gdb, triplet)
    }

    /// `cgdb` driving `<triplet>-gdb`
    pub fn cgdb(triplet: &str) -> Self {
        Self::new(Frontend::Cgdb, triplet)
    }

    fn new(frontend: Frontend, triplet: &str) -> Self {
        Self {
            frontend,
            gdb: PathBuf::from(format!("{}-gdb", triplet)),
            cgdb: PathBuf::from("cgdb"),
        }
    }

    pub fn frontend(&self) -> Frontend {
        self.frontend
    }

    fn gdb_args(&self, gdb: &mut Vec<String>, params: &LaunchParams) {
        gdb.push("--silent".to_string());
        gdb.push("-ex".to_string());
        gdb.push(format!("target remote localhost:{}", params.gdb_port));
        gdb.push(params.image.to_string_lossy().into_owned());
    }
}

impl Backend for Debugger {
    fn probe(&self) -> bool {
        let gdb = find_program(&self.gdb).is_some();
        match self.frontend {
            Frontend::Gdb => gdb,
            Frontend::Cgdb => gdb && find_program(&self.cgdb).is_some(),
        }
    }

    fn configure(&self, params: &LaunchParams) -> Result<CommandLine, LaunchError> {
        require_image(&params.image)?;

        let gdb = find_program(&self.gdb).unwrap_or_else(|| self.gdb.clone());
        let mut args = Vec::new();
        let program = match self.frontend {
            Frontend::Gdb => gdb,
            Frontend::Cgdb => {
                args.push("-d".to_string());
                args.push(gdb.to_string_lossy().into_owned());
                args.push("--".to_string());
                find_program(&self.cgdb).unwrap_or_else(|| self.cgdb.clone())
            }
        };
        self.gdb_args(&mut args, params);

        Ok(CommandLine::new(program).args(args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gdb_attaches_to_stub() {
        let image = tempfile::NamedTempFile::new().unwrap();
        let gdb = Debugger::gdb("mipsel-unknown-elf");
        let params = LaunchParams::new(image.path()).with_gdb_port(4321);

        let command = gdb.configure(&params).unwrap();

        assert!(command.program.ends_with("mipsel-unknown-elf-gdb"));
        assert_eq!(
            command.args,
            vec![
                "--silent".to_string(),
                "-ex".to_string(),
                "target remote localhost:4321".to_string(),
                image.path().to_string_lossy().into_owned(),
            ]
        );
    }

    #[test]
    fn test_cgdb_wraps_cross_gdb() {
        let image = tempfile::NamedTempFile::new().unwrap();
        let cgdb = Debugger::cgdb("mipsel-unknown-elf");

        let command = cgdb.configure(&LaunchParams::new(image.path())).unwrap();

        assert!(command.program.ends_with("cgdb"));
        assert_eq!(command.args[0], "-d");
        assert!(command.args[1].ends_with("mipsel-unknown-elf-gdb"));
        assert_eq!(command.args[2], "--");
        assert_eq!(command.args[3], "--silent");
    }

    #[test]
    fn test_probe_fails_without_cross_gdb() {
        assert!(!Debugger::gdb("nonexistent-unknown-elf").probe());
        assert!(!Debugger::cgdb("nonexistent-unknown-elf").probe());
    }
}
