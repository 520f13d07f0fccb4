//! Construction-time configuration.

/// Slot count selected when a table is created with capacity `0` or grows
/// from an unallocated state.
pub const DEFAULT_CAPACITY: usize = 512;

/// What to do when storage cannot be allocated.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AllocPolicy {
    /// Return [`TableError::AllocationFailure`](crate::TableError) and leave
    /// the table untouched.
    FailSoft,
    /// Log the failure and panic.
    FailFast,
}

impl Default for AllocPolicy {
    fn default() -> Self {
        if cfg!(feature = "panic-on-alloc-failure") {
            AllocPolicy::FailFast
        } else {
            AllocPolicy::FailSoft
        }
    }
}

/// Options accepted by `with_options` constructors.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TableOptions {
    /// Initial slot count; `0` selects [`DEFAULT_CAPACITY`].
    pub initial_capacity: usize,
    pub alloc_policy: AllocPolicy,
}

impl TableOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn alloc_policy(mut self, policy: AllocPolicy) -> Self {
        self.alloc_policy = policy;
        self
    }

    pub(crate) fn resolved_capacity(&self) -> usize {
        if self.initial_capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            self.initial_capacity
        }
    }
}
