//! Waiting for the first of several launchables to terminate

use crate::runtime::launchable::{LaunchError, Launchable};
use std::time::Duration;

#[cfg(target_os = "linux")]
use crate::runtime::sys;

/// Bound of each single-process wait in the round-robin fallback
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Block until any of `launchables` terminates and return its index.
///
/// Launchables that are not running are skipped. When several terminate
/// close together, the one earliest in iteration order is reported.
pub fn wait_any<'a, I>(launchables: I) -> Result<usize, LaunchError>
where
    I: IntoIterator<Item = &'a mut Launchable>,
{
    let mut launchables: Vec<&'a mut Launchable> = launchables.into_iter().collect();
    loop {
        if let Some(index) = poll_any(&mut launchables, POLL_INTERVAL)? {
            return Ok(index);
        }
    }
}

/// One pass over `launchables`, blocking roughly `slice` per waiting step.
///
/// Returns the index of the first launchable found terminated, or `None`
/// if every running launchable is still alive. Fails with
/// [`LaunchError::NothingRunning`] when none of them runs.
///
/// On Linux, when every running process exposes a pidfd, all of them are
/// polled at once for up to `slice`. Otherwise each gets a bounded wait of
/// `slice` in turn.
pub fn poll_any(
    launchables: &mut [&mut Launchable],
    slice: Duration,
) -> Result<Option<usize>, LaunchError> {
    let running: Vec<usize> = launchables
        .iter()
        .enumerate()
        .filter(|(_, l)| l.is_running())
        .map(|(i, _)| i)
        .collect();

    if running.is_empty() {
        return Err(LaunchError::NothingRunning);
    }

    #[cfg(target_os = "linux")]
    {
        let fds: Option<Vec<_>> = running.iter().map(|&i| launchables[i].exit_fd()).collect();
        if let Some(fds) = fds {
            if let Err(e) = sys::poll_readable(&fds, Some(slice)) {
                log::debug!("poll on pidfds failed, falling back to bounded waits: {}", e);
            } else {
                return first_terminated(launchables, &running, Duration::ZERO);
            }
        }
    }

    first_terminated(launchables, &running, slice)
}

/// Wait up to `bound` on each running launchable in order; the first to
/// report termination wins.
fn first_terminated(
    launchables: &mut [&mut Launchable],
    running: &[usize],
    bound: Duration,
) -> Result<Option<usize>, LaunchError> {
    for &index in running {
        match launchables[index].wait(Some(bound)) {
            Ok(true) => return Ok(Some(index)),
            Ok(false) => {}
            Err(e) if e.is_timeout() => {}
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::launchable::testing::{fake_launchable, Behavior, FakeSpawner};
    use std::sync::Arc;

    fn started(name: &str, spawner: &Arc<FakeSpawner>) -> Launchable {
        let mut launchable = fake_launchable(name, spawner);
        launchable.start().unwrap();
        launchable
    }

    #[test]
    fn test_reports_the_terminated_one() {
        let alive = FakeSpawner::new(Behavior::Stubborn);
        let dead = FakeSpawner::new(Behavior::Exited(0));
        let mut a = started("a", &alive);
        let mut b = started("b", &dead);
        let mut c = started("c", &alive);

        let index = wait_any([&mut a, &mut b, &mut c]).unwrap();

        assert_eq!(index, 1);
        assert!(!b.is_running());
        assert!(a.is_running());
        assert!(c.is_running());
    }

    #[test]
    fn test_ties_go_to_iteration_order() {
        let alive = FakeSpawner::new(Behavior::Stubborn);
        let dead = FakeSpawner::new(Behavior::Exited(1));
        let mut list = vec![
            started("a", &alive),
            started("b", &dead),
            started("c", &dead),
        ];

        assert_eq!(wait_any(&mut list).unwrap(), 1);
        // The other one is still reported on the next call
        assert_eq!(wait_any(&mut list).unwrap(), 2);
    }

    #[test]
    fn test_skips_idle_launchables() {
        let alive = FakeSpawner::new(Behavior::Stubborn);
        let dead = FakeSpawner::new(Behavior::Exited(0));
        let mut idle = fake_launchable("idle", &alive);
        let mut done = started("done", &dead);

        assert_eq!(wait_any([&mut idle, &mut done]).unwrap(), 1);
    }

    #[test]
    fn test_nothing_running_is_an_error() {
        let alive = FakeSpawner::new(Behavior::Stubborn);
        let mut idle = fake_launchable("idle", &alive);

        assert!(matches!(
            wait_any([&mut idle]),
            Err(LaunchError::NothingRunning)
        ));
        assert!(matches!(
            wait_any(Vec::<&mut Launchable>::new()),
            Err(LaunchError::NothingRunning)
        ));
    }

    #[test]
    fn test_poll_any_returns_none_while_all_alive() {
        let alive = FakeSpawner::new(Behavior::Stubborn);
        let mut a = started("a", &alive);
        let mut b = started("b", &alive);

        let result = poll_any(&mut [&mut a, &mut b], Duration::from_millis(5)).unwrap();

        assert_eq!(result, None);
        assert!(a.is_running());
        assert!(b.is_running());
    }
}
