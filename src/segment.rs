//! Segment binding: scoped attachment to a keyed shared memory block

use crate::error::{RingError, RingResult};
use crate::platform::{self, ShmKey};
use std::ptr::NonNull;
use tracing::{debug, warn};

/// Default capacity ceiling applied when binding (100 MiB)
pub const DEFAULT_MAX_CAPACITY: usize = 100 * 1024 * 1024;

/// Scoped attachment to a System V shared memory segment.
///
/// Binding attaches the calling process to the segment registered under
/// a numeric key, creating and zero-filling it when absent. An existing
/// segment whose size differs from the requested capacity is treated as
/// stale: it is removed and recreated at the new size.
///
/// Dropping the binding detaches the mapping but never destroys the
/// segment, so other attachers keep access; use
/// [`SegmentBinding::destroy`] for outright removal.
pub struct SegmentBinding {
    key: ShmKey,
    capacity: usize,
    base: NonNull<u8>,
}

// The binding hands out raw pointers into memory shared with other
// attachers. Consistency across concurrent access is the caller's
// contract (at most one writer and one reader); the handle itself
// carries no thread affinity.
unsafe impl Send for SegmentBinding {}
unsafe impl Sync for SegmentBinding {}

impl SegmentBinding {
    /// Attach to (or create) the segment registered under `key`.
    ///
    /// Fails with [`RingError::SizeExceeded`] when `capacity` is zero or
    /// above `max_capacity`, and with [`RingError::SegmentUnavailable`]
    /// when the OS refuses creation or attachment.
    pub fn bind(key: ShmKey, capacity: usize, max_capacity: usize) -> RingResult<Self> {
        if capacity == 0 || capacity > max_capacity {
            return Err(RingError::SizeExceeded {
                requested: capacity,
                max: max_capacity,
            });
        }

        let existing = platform::size_of_key(key)?;
        if existing > 0 && existing != capacity {
            debug!(key, existing, capacity, "removing stale segment of mismatched size");
            platform::remove(key)?;
        }

        let (base, created) = platform::create_or_attach(key, capacity)
            .map_err(|source| RingError::SegmentUnavailable { key, source })?;
        if created {
            // The kernel already zeroes fresh segments; make the
            // guarantee explicit rather than kernel-dependent.
            unsafe { std::ptr::write_bytes(base.as_ptr(), 0, capacity) };
        }
        debug!(key, capacity, created, "segment bound");

        Ok(Self {
            key,
            capacity,
            base,
        })
    }

    /// Size of the segment registered under `key`, `0` when absent.
    pub fn capacity_of(key: ShmKey) -> RingResult<usize> {
        Ok(platform::size_of_key(key)?)
    }

    /// Remove the segment registered under `key` outright.
    ///
    /// Existing attachments stay valid until they detach.
    pub fn destroy(key: ShmKey) -> RingResult<()> {
        Ok(platform::remove(key)?)
    }

    /// Detach from the segment, surfacing any failure.
    ///
    /// Dropping the binding also detaches but can only log a failure;
    /// this consuming variant reports it to the caller. The segment
    /// itself persists either way.
    pub fn unbind(self) -> RingResult<()> {
        let this = std::mem::ManuallyDrop::new(self);
        Ok(platform::detach(this.base)?)
    }

    /// System V key this binding is attached under
    pub fn key(&self) -> ShmKey {
        self.key
    }

    /// Segment capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Base pointer of the mapped segment
    pub(crate) fn base_ptr(&self) -> *mut u8 {
        self.base.as_ptr()
    }
}

impl Drop for SegmentBinding {
    fn drop(&mut self) {
        // Detach only: the segment outlives this handle.
        if let Err(errno) = platform::detach(self.base) {
            warn!(key = self.key, %errno, "failed to detach shared memory segment");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn test_key() -> ShmKey {
        static NEXT: AtomicI32 = AtomicI32::new(0);
        let salt = NEXT.fetch_add(1, Ordering::Relaxed) & 0xFF;
        ((rand::random::<u16>() as ShmKey) << 12) | (salt << 4) | 0x5
    }

    struct KeyGuard(ShmKey);

    impl Drop for KeyGuard {
        fn drop(&mut self) {
            let _ = SegmentBinding::destroy(self.0);
        }
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = SegmentBinding::bind(test_key(), 0, DEFAULT_MAX_CAPACITY);
        assert!(matches!(result, Err(RingError::SizeExceeded { .. })));
    }

    #[test]
    fn test_capacity_over_ceiling_rejected() {
        let result = SegmentBinding::bind(test_key(), 8192, 4096);
        assert!(matches!(
            result,
            Err(RingError::SizeExceeded {
                requested: 8192,
                max: 4096
            })
        ));
    }

    #[test]
    fn test_bind_creates_zeroed_segment() {
        let key = test_key();
        let _guard = KeyGuard(key);

        let binding = SegmentBinding::bind(key, 4096, DEFAULT_MAX_CAPACITY).unwrap();
        assert_eq!(binding.capacity(), 4096);
        assert_eq!(SegmentBinding::capacity_of(key).unwrap(), 4096);

        let bytes = unsafe { std::slice::from_raw_parts(binding.base_ptr(), 4096) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_explicit_unbind() {
        let key = test_key();
        let _guard = KeyGuard(key);

        let binding = SegmentBinding::bind(key, 4096, DEFAULT_MAX_CAPACITY).unwrap();
        binding.unbind().unwrap();
        // Unbinding detaches only; the segment is still registered.
        assert_eq!(SegmentBinding::capacity_of(key).unwrap(), 4096);
    }

    #[test]
    fn test_detach_preserves_contents() {
        let key = test_key();
        let _guard = KeyGuard(key);

        {
            let binding = SegmentBinding::bind(key, 4096, DEFAULT_MAX_CAPACITY).unwrap();
            unsafe { std::ptr::write_bytes(binding.base_ptr(), 0xAB, 16) };
        } // detached, not destroyed

        let binding = SegmentBinding::bind(key, 4096, DEFAULT_MAX_CAPACITY).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(binding.base_ptr(), 16) };
        assert!(bytes.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_stale_segment_reclaimed_on_size_change() {
        let key = test_key();
        let _guard = KeyGuard(key);

        {
            let binding = SegmentBinding::bind(key, 4096, DEFAULT_MAX_CAPACITY).unwrap();
            unsafe { std::ptr::write_bytes(binding.base_ptr(), 0xCD, 4096) };
        }

        // Different size: the old segment must be removed and the new
        // one must come up zero-filled.
        let binding = SegmentBinding::bind(key, 8192, DEFAULT_MAX_CAPACITY).unwrap();
        assert_eq!(SegmentBinding::capacity_of(key).unwrap(), 8192);

        let bytes = unsafe { std::slice::from_raw_parts(binding.base_ptr(), 8192) };
        assert!(bytes.iter().all(|&b| b == 0));
    }
}
