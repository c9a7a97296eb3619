//! Network reachability signal.

use std::sync::atomic::{AtomicBool, Ordering};

/// "Is the network reachable" flag.
///
/// Read access is public. Changes go through
/// [`SyncCoordinator::set_online`](crate::sync::SyncCoordinator::set_online)
/// so that every offline to online transition starts a drain.
#[derive(Debug)]
pub struct Connectivity {
    online: AtomicBool,
}

impl Connectivity {
    #[must_use]
    pub const fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Update the flag. Returns `true` when this was an offline to online
    /// transition.
    pub(crate) fn set_online(&self, online: bool) -> bool {
        let was_online = self.online.swap(online, Ordering::AcqRel);
        online && !was_online
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
