//! Kernel Launch CLI
//!
//! Usage:
//!   kernel_launch
//!   KERNEL_LAUNCH_CONFIG=launch/debug.yaml kernel_launch
//!   RUST_LOG=debug kernel_launch

use kernel_launch::{
    backends, find_available, find_toolchain, LaunchError, Launchable, LauncherConfig, Outcome,
    Session,
};
use std::sync::mpsc;

const CONFIG_ENV: &str = "KERNEL_LAUNCH_CONFIG";
const DEFAULT_CONFIG: &str = "launch.yaml";

fn main() {
    // Initialize logging
    let env = env_logger::Env::default().default_filter_or("info");
    env_logger::init_from_env(env);

    // Load configuration
    let config_path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    log::info!("Loading config file: {}", config_path);
    let config = match LauncherConfig::from_file(&config_path) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = find_toolchain(&config.triplet) {
        log::error!("{}", e);
        std::process::exit(1);
    }

    let mut emulators = backends::launchables(&config.emulators, &config);
    let mut debuggers = backends::launchables(&config.debuggers, &config);

    if let Err(e) = run(&config, &mut emulators, &mut debuggers) {
        log::error!("Launch failed: {}", e);
        std::process::exit(1);
    }

    log::info!("Kernel launcher exiting");
}

fn run(
    config: &LauncherConfig,
    emulators: &mut [Launchable],
    debuggers: &mut [Launchable],
) -> Result<(), LaunchError> {
    let params = config.launch_params();

    let registry = find_available(emulators.iter_mut());
    log::info!("Available emulators: {}", registry.names().join(", "));
    let emulator = registry.select(config.emulator.as_deref())?;
    emulator.configure(&params)?;

    let mut selected = vec![emulator];
    let mut interrupt_target = None;

    if params.debug {
        let registry = find_available(debuggers.iter_mut());
        log::info!("Available debuggers: {}", registry.names().join(", "));
        let debugger = registry.select(config.debugger.as_deref())?;
        debugger.configure(&params)?;
        interrupt_target = Some(debugger.name().to_string());
        selected.push(debugger);
    }

    let mut session = Session::new(selected).with_poll_interval(config.poll_interval());
    if let Some(target) = interrupt_target {
        session = session.forward_interrupts_to(target);
    }

    // Children live in their own sessions, so Ctrl+C only reaches us
    let (interrupt_tx, interrupt_rx) = mpsc::channel();
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(());
    }) {
        log::warn!("Failed to set Ctrl+C handler: {}", e);
    }

    if let Err(e) = session.start_all() {
        session.shutdown();
        return Err(e);
    }

    let outcome = session.supervise(&interrupt_rx);
    match &outcome {
        Ok(Outcome::Exited(name)) => log::info!("[{}] Exited, ending session", name),
        Ok(Outcome::ShutdownRequested) => log::info!("Shutdown requested"),
        Err(e) => log::error!("Supervision failed: {}", e),
    }

    session.shutdown();
    outcome.map(|_| ())
}
