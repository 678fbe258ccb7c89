//! Launcher configuration loading

mod launcher_config;

pub use launcher_config::*;
