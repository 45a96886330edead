//! Events emitted by the router actor
//!
//! Observers receive every outcome through one channel, in the order the
//! commands were processed.

/// Router activity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    /// Every tie of a device was applied
    DeviceSelected {
        /// Device index
        index: usize,
        /// Device title
        title: String,
    },

    /// Bulk power change reached every switch
    PowerChanged {
        /// New power state
        on: bool,
    },

    /// A command failed
    Error {
        /// What failed (e.g. "select", "power")
        source: String,
        /// Error message
        message: String,
    },

    /// The actor stopped
    Stopped,
}
