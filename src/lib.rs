//! # shmring — framed ring queue over System V shared memory
//!
//! A fixed-capacity FIFO queue of variable-length byte records laid out
//! inside a single System V shared memory segment, for one producer and
//! one consumer exchanging length-prefixed payloads without copying
//! through a kernel channel.
//!
//! Two strictly layered pieces:
//!
//! - [`SegmentBinding`] attaches to (or creates) the segment registered
//!   under a numeric key, reclaims stale segments whose size changed,
//!   and detaches on drop without destroying the segment.
//! - [`RingQueue`] interprets the segment as a circular byte array of
//!   back-to-back `[native length prefix][payload]` records, splitting
//!   a record's bytes across the physical end of the segment when
//!   needed.
//!
//! ## Wire layout
//!
//! The segment carries no header, magic number, or version field: just
//! `capacity` bytes of records, zero-initialized at creation. The
//! length prefix is a native-width, native-endian `usize`, so producer
//! and consumer must share endianness. Key and capacity travel
//! out-of-band.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shmring::RingQueue;
//! use std::sync::Arc;
//!
//! # fn main() -> shmring::RingResult<()> {
//! let queue = Arc::new(RingQueue::new(0x17804, 4096)?);
//!
//! let producer = Arc::clone(&queue);
//! std::thread::spawn(move || {
//!     let _ = producer.put(b"temperature: 25.5");
//! });
//!
//! loop {
//!     match queue.get() {
//!         Ok(record) => {
//!             println!("got {} bytes", record.len());
//!             break;
//!         }
//!         Err(shmring::RingError::RingEmpty) => {
//!             std::thread::sleep(std::time::Duration::from_millis(1))
//!         }
//!         Err(e) => return Err(e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency contract
//!
//! `put` and `get` never block waiting for space or data; callers poll.
//! Cursors are handle-local, so the producer and consumer contexts must
//! share one [`RingQueue`] handle (clone an `Arc`). The handle is safe
//! for that one-writer/one-reader pairing; the crate provides no
//! cross-process synchronization, and concurrent writers (or concurrent
//! readers) on separate attachments of the same segment are outside the
//! contract.
//!
//! ## Error handling
//!
//! Every fallible operation returns [`RingResult`]; all conditions are
//! recoverable and none terminate the process. See [`RingError`] for
//! the catalogue.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod platform;
pub mod ring;
pub mod segment;

pub use error::{RingError, RingResult};
pub use platform::ShmKey;
pub use ring::{DEFAULT_CAPACITY, DEFAULT_KEY, PREFIX_LEN, QueueConfig, RingQueue};
pub use segment::{DEFAULT_MAX_CAPACITY, SegmentBinding};

/// Initialize tracing for queue diagnostics
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
