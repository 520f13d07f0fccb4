//! Error types for the `ordered-hm` crate

use std::collections::TryReserveError;

/// Errors reported by fallible table operations.
///
/// Lookups never fail: an absent key is reported as `None`.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TableError {
    /// Storage for the requested capacity could not be obtained, either
    /// because the allocator refused or because the byte size overflowed.
    /// The table is left exactly as it was before the call.
    #[error("failed to allocate storage for {slots} slots of {element_size}-byte values")]
    AllocationFailure {
        /// Slot count that was requested.
        slots: usize,
        /// Size in bytes of each stored value.
        element_size: usize,
        /// Allocator error, absent when the size computation overflowed.
        #[source]
        source: Option<TryReserveError>,
    },
}

impl TableError {
    pub(crate) fn allocation(
        slots: usize,
        element_size: usize,
        source: Option<TryReserveError>,
    ) -> Self {
        Self::AllocationFailure {
            slots,
            element_size,
            source,
        }
    }
}
