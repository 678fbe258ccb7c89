//! Session - starts, supervises and shuts down the launchables of one run

use crate::runtime::launchable::{LaunchError, LaunchStatus, Launchable};
use crate::runtime::waiter::{poll_any, POLL_INTERVAL};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

/// Why supervision ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The named launchable terminated
    Exited(String),
    /// An interrupt arrived with nobody to forward it to
    ShutdownRequested,
}

/// The launchables selected for one run, in start order
pub struct Session<'a> {
    launchables: Vec<&'a mut Launchable>,
    interrupt_target: Option<String>,
    poll_interval: Duration,
}

impl<'a> Session<'a> {
    /// Create a new session
    pub fn new(launchables: Vec<&'a mut Launchable>) -> Self {
        Self {
            launchables,
            interrupt_target: None,
            poll_interval: POLL_INTERVAL,
        }
    }

    /// Set how long each supervision pass blocks
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Deliver user interrupts to the named launchable instead of ending
    /// the session (typically the debugger)
    pub fn forward_interrupts_to(mut self, name: impl Into<String>) -> Self {
        self.interrupt_target = Some(name.into());
        self
    }

    /// Start every launchable in order
    pub fn start_all(&mut self) -> Result<(), LaunchError> {
        log::info!("Starting {} launchables...", self.launchables.len());
        for launchable in self.launchables.iter_mut() {
            launchable.start()?;
        }
        Ok(())
    }

    /// Block until a launchable terminates or an interrupt requests shutdown.
    ///
    /// `interrupts` is drained between passes; each message is forwarded as
    /// SIGINT to the interrupt target while it runs, and otherwise ends
    /// supervision.
    pub fn supervise(&mut self, interrupts: &Receiver<()>) -> Result<Outcome, LaunchError> {
        loop {
            match interrupts.try_recv() {
                Ok(()) => {
                    if !self.forward_interrupt()? {
                        log::info!("Interrupt received, shutting down");
                        return Ok(Outcome::ShutdownRequested);
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }

            if let Some(index) = poll_any(&mut self.launchables, self.poll_interval)? {
                let name = self.launchables[index].name().to_string();
                return Ok(Outcome::Exited(name));
            }
        }
    }

    fn forward_interrupt(&mut self) -> Result<bool, LaunchError> {
        let Some(target) = &self.interrupt_target else {
            return Ok(false);
        };

        match self
            .launchables
            .iter_mut()
            .find(|l| l.name() == target && l.is_running())
        {
            Some(launchable) => {
                log::info!("[{}] Forwarding interrupt", launchable.name());
                launchable.interrupt()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stop every launchable in reverse start order
    pub fn shutdown(&mut self) {
        log::info!("Shutting down all launchables...");
        for launchable in self.launchables.iter_mut().rev() {
            launchable.stop();
        }
        log::info!("All launchables shut down");
    }

    /// Get status summary
    pub fn status(&self) -> Vec<(&str, LaunchStatus)> {
        self.launchables
            .iter()
            .map(|l| (l.name(), l.status()))
            .collect()
    }
}
