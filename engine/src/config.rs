//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunables shared by every job run on an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Extra bytes that must remain free at the destination after the copy.
    ///
    /// A job proceeds only when `total_bytes + capacity_headroom` is strictly
    /// less than the available space. With the default of 0, a destination
    /// with exactly `total_bytes` free is rejected.
    #[serde(default)]
    pub capacity_headroom: u64,
}

impl EngineConfig {
    pub fn with_capacity_headroom(mut self, bytes: u64) -> Self {
        self.capacity_headroom = bytes;
        self
    }

    /// Whether `required` bytes fit into `available` under this configuration.
    pub fn has_room_for(&self, required: u64, available: u64) -> bool {
        u128::from(required) + u128::from(self.capacity_headroom) < u128::from(available)
    }
}
