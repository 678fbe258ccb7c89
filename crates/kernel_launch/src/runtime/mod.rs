//! Runtime components for launching and supervising backends

pub mod launchable;
pub mod process;
pub mod registry;
pub mod session;
#[cfg(target_os = "linux")]
mod sys;
pub mod waiter;

pub use launchable::*;
pub use process::*;
pub use registry::*;
pub use session::*;
pub use waiter::*;
