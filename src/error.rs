//! Error types for segment binding and ring operations

use thiserror::Error;

/// Errors that can occur while binding a segment or moving records
/// through the ring.
///
/// Every variant is a local, recoverable condition: `put`/`get` callers
/// are expected to poll and retry (or drop the message), and binding
/// failures are addressed by reconfiguring the key or capacity.
#[derive(Error, Debug)]
pub enum RingError {
    /// Requested capacity falls outside the supported range
    #[error("segment capacity {requested} bytes outside supported range (max {max})")]
    SizeExceeded {
        /// Requested capacity in bytes
        requested: usize,
        /// Configured ceiling in bytes
        max: usize,
    },

    /// Underlying segment could not be created or attached
    #[error("shared memory segment for key {key:#x} unavailable: {source}")]
    SegmentUnavailable {
        /// System V key of the segment
        key: i32,
        /// Errno reported by the failing call
        source: nix::Error,
    },

    /// `put` was called with a zero-length payload
    #[error("refusing to enqueue an empty payload")]
    EmptyPayload,

    /// Record footprint would not fit even in an empty ring
    #[error("record of {len} bytes cannot fit in a ring of {capacity} bytes")]
    RecordTooLarge {
        /// Payload length in bytes
        len: usize,
        /// Ring capacity in bytes
        capacity: usize,
    },

    /// Insufficient free space for this record right now
    #[error("ring full: {needed} bytes needed")]
    RingFull {
        /// Footprint of the rejected record (prefix + payload)
        needed: usize,
    },

    /// `get` was called with no pending record
    #[error("ring empty")]
    RingEmpty,

    /// A zero length prefix was decoded where a record was expected
    #[error("corrupt record at offset {offset}: zero length prefix")]
    CorruptRecord {
        /// Ring offset of the bad prefix
        offset: usize,
    },

    /// Raw system call failure from the platform layer
    #[error("system call error: {source}")]
    Sys {
        /// Errno reported by the failing call
        #[from]
        source: nix::Error,
    },
}

/// Result type for ring queue operations
pub type RingResult<T> = Result<T, RingError>;
