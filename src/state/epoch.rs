//! ModelEpoch - Generation Counter for Sort/Filter Changes

/// Monotonic counter bumped whenever cached data stops matching the criteria.
///
/// Every fetch records the epoch it was issued under; a completion whose epoch
/// is no longer current is dropped instead of being applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelEpoch(u64);

impl ModelEpoch {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn current(&self) -> u64 {
        self.0
    }

    /// Advance and return the new epoch
    pub fn bump(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(1);
        self.0
    }

    pub fn is_current(&self, epoch: u64) -> bool {
        self.0 == epoch
    }
}
