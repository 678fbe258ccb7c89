//! Preference-ordered selection of usable backends

use crate::runtime::launchable::{LaunchError, Launchable};
use indexmap::IndexMap;

/// The usable subset of a preference-ordered candidate list.
///
/// Borrows the caller's launchables; entries keep their preference order.
#[derive(Debug)]
pub struct Registry<'a> {
    available: IndexMap<String, &'a mut Launchable>,
    default: Option<String>,
}

/// Probe every candidate once, most desirable first.
///
/// The result holds every candidate whose probe succeeded, and the default
/// is the first of them in preference order. Among duplicate names the
/// earliest entry wins.
pub fn find_available<'a, I>(candidates: I) -> Registry<'a>
where
    I: IntoIterator<Item = &'a mut Launchable>,
{
    let mut available = IndexMap::new();
    let mut default = None;

    for candidate in candidates {
        if !candidate.probe() {
            log::debug!("[{}] Not available on this host", candidate.name());
            continue;
        }
        if available.contains_key(candidate.name()) {
            log::debug!("[{}] Duplicate candidate ignored", candidate.name());
            continue;
        }

        let name = candidate.name().to_string();
        if default.is_none() {
            default = Some(name.clone());
        }
        available.insert(name, candidate);
    }

    Registry { available, default }
}

impl<'a> Registry<'a> {
    /// Name of the most preferred available backend
    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Names of all available backends in preference order
    pub fn names(&self) -> Vec<&str> {
        self.available.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.available.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Launchable> {
        self.available.get_mut(name).map(|l| &mut **l)
    }

    /// Pick the backend called `name`, or the default when `name` is `None`
    pub fn select(self, name: Option<&str>) -> Result<&'a mut Launchable, LaunchError> {
        let name = match name {
            Some(name) => name.to_string(),
            None => self.default.ok_or(LaunchError::NoBackendAvailable)?,
        };

        let mut available = self.available;
        match available.shift_remove(&name) {
            Some(launchable) => Ok(launchable),
            None => Err(LaunchError::Unavailable {
                name,
                available: available.keys().cloned().collect(),
            }),
        }
    }
}
