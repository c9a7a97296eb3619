//! Shared cross-client state types.

/// Sync status shown by clients next to the pending-operation count.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Offline, or no remote connection attached
    Offline,
    /// A drain is in progress
    Syncing,
    /// Online with operations still queued
    Pending,
    /// Online and nothing queued
    Synced,
}

impl SyncState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }
}
