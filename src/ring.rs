//! Framed ring buffer over a bound shared memory segment
//!
//! The segment is treated as a flat circular byte array holding
//! length-prefixed records back to back. A record's footprint is
//! `PREFIX_LEN + payload len` bytes and may wrap across the physical
//! end of the segment; when fewer than `PREFIX_LEN` bytes remain before
//! the end, the length prefix itself is split byte-wise.

use crate::error::{RingError, RingResult};
use crate::platform::ShmKey;
use crate::segment::{DEFAULT_MAX_CAPACITY, SegmentBinding};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::ptr;
use tracing::debug;

/// Width of the native-endian length prefix in front of every record
pub const PREFIX_LEN: usize = std::mem::size_of::<usize>();

/// Default System V key for the queue segment
pub const DEFAULT_KEY: ShmKey = 0x17804;

/// Default segment capacity (50 MiB)
pub const DEFAULT_CAPACITY: usize = 50 * 1024 * 1024;

/// Construction parameters for a [`RingQueue`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// System V shared memory key identifying the segment
    pub key: ShmKey,
    /// Segment capacity in bytes
    pub capacity: usize,
    /// Guard-rail ceiling applied when binding the segment
    pub max_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            key: DEFAULT_KEY,
            capacity: DEFAULT_CAPACITY,
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

/// Cursor state, local to this handle (never stored in the segment).
#[derive(Debug)]
struct Cursors {
    /// Offset where the next record's length prefix goes
    write_pos: usize,
    /// Offset of the next unread record's length prefix
    read_pos: usize,
    /// Start offset of the most recently consumed record. Free space
    /// for writes is measured against this, not `read_pos`, so a
    /// consumed record's span becomes reusable one `get` late.
    boundary_pos: usize,
}

/// Fixed-capacity FIFO queue of variable-length byte records laid out
/// circularly in a shared memory segment.
///
/// `put` and `get` are synchronous and non-blocking: each returns
/// immediately with success or a recoverable [`RingError`], and cursors
/// move only after a complete transfer.
///
/// # Concurrency contract
///
/// Cursors live in this handle, not in the segment, so producer and
/// consumer must share the *same* handle (e.g. behind an `Arc`), one
/// thread calling `put` and one calling `get`. The internal lock keeps
/// the cursor triple consistent between those two threads; it is not a
/// cross-process protocol, and nothing defends the segment against a
/// second concurrent writer or reader.
pub struct RingQueue {
    segment: SegmentBinding,
    capacity: usize,
    cursors: Mutex<Cursors>,
}

impl RingQueue {
    /// Bind the segment under `key` at `capacity` bytes and initialize
    /// an empty ring over it, with the default capacity ceiling.
    pub fn new(key: ShmKey, capacity: usize) -> RingResult<Self> {
        Self::with_config(&QueueConfig {
            key,
            capacity,
            ..QueueConfig::default()
        })
    }

    /// Bind and initialize from explicit configuration.
    pub fn with_config(cfg: &QueueConfig) -> RingResult<Self> {
        // Room for at least a prefix plus one payload byte plus the one
        // byte of slack the full-check requires.
        if cfg.capacity <= PREFIX_LEN + 1 {
            return Err(RingError::SizeExceeded {
                requested: cfg.capacity,
                max: cfg.max_capacity,
            });
        }

        let segment = SegmentBinding::bind(cfg.key, cfg.capacity, cfg.max_capacity)?;
        let capacity = segment.capacity();
        debug!(key = cfg.key, capacity, "ring queue initialized");

        Ok(Self {
            segment,
            capacity,
            cursors: Mutex::new(Cursors {
                write_pos: 0,
                read_pos: 0,
                // Sentinel: no record written yet, treated as already
                // behind write_pos.
                boundary_pos: capacity - PREFIX_LEN,
            }),
        })
    }

    /// Append one record to the ring.
    ///
    /// Never blocks for space; on [`RingError::RingFull`] the caller is
    /// expected to retry later or drop the message. No bytes are
    /// written and no cursor moves on any failure.
    pub fn put(&self, payload: &[u8]) -> RingResult<()> {
        if payload.is_empty() {
            return Err(RingError::EmptyPayload);
        }
        let len = payload.len();
        let total = PREFIX_LEN + len;
        // At least one byte of slack is always required.
        if total >= self.capacity {
            return Err(RingError::RecordTooLarge {
                len,
                capacity: self.capacity,
            });
        }

        let mut cur = self.cursors.lock();
        if cur.write_pos == cur.boundary_pos {
            return Err(RingError::RingFull { needed: total });
        }

        let prefix = len.to_ne_bytes();
        if cur.write_pos < cur.boundary_pos {
            if cur.boundary_pos - cur.write_pos < total {
                return Err(RingError::RingFull { needed: total });
            }
            self.copy_in(cur.write_pos, &prefix);
            self.copy_in(cur.write_pos + PREFIX_LEN, payload);
        } else {
            let tail = self.capacity - cur.write_pos;
            if tail >= total {
                // Fits before the physical end, no wrap needed.
                self.copy_in(cur.write_pos, &prefix);
                self.copy_in(cur.write_pos + PREFIX_LEN, payload);
            } else if cur.boundary_pos + tail >= total {
                if tail >= PREFIX_LEN {
                    // Prefix fits in the tail run; the payload wraps.
                    self.copy_in(cur.write_pos, &prefix);
                    let head = tail - PREFIX_LEN;
                    self.copy_in(cur.write_pos + PREFIX_LEN, &payload[..head]);
                    self.copy_in(0, &payload[head..]);
                } else {
                    // Even the prefix straddles the physical end.
                    self.copy_in(cur.write_pos, &prefix[..tail]);
                    self.copy_in(0, &prefix[tail..]);
                    self.copy_in(PREFIX_LEN - tail, payload);
                }
            } else {
                return Err(RingError::RingFull { needed: total });
            }
        }

        cur.write_pos = (cur.write_pos + total) % self.capacity;
        Ok(())
    }

    /// Remove and return the oldest unread record.
    ///
    /// Never blocks for data; [`RingError::RingEmpty`] means nothing is
    /// pending. A decoded zero-length prefix aborts the read with
    /// [`RingError::CorruptRecord`] and leaves all cursors in place.
    pub fn get(&self) -> RingResult<Vec<u8>> {
        let mut cur = self.cursors.lock();
        if cur.read_pos == cur.write_pos {
            return Err(RingError::RingEmpty);
        }

        let len = self.decode_prefix(cur.read_pos);
        if len == 0 {
            return Err(RingError::CorruptRecord {
                offset: cur.read_pos,
            });
        }

        let data_start = (cur.read_pos + PREFIX_LEN) % self.capacity;
        let mut payload = vec![0u8; len];
        let tail = self.capacity - data_start;
        if len <= tail {
            self.copy_out(data_start, &mut payload);
        } else {
            self.copy_out(data_start, &mut payload[..tail]);
            self.copy_out(0, &mut payload[tail..]);
        }

        cur.boundary_pos = cur.read_pos;
        cur.read_pos = (cur.read_pos + PREFIX_LEN + len) % self.capacity;
        Ok(payload)
    }

    /// Like [`RingQueue::get`], returning the payload as text with
    /// invalid UTF-8 replaced.
    pub fn get_text(&self) -> RingResult<String> {
        Ok(String::from_utf8_lossy(&self.get()?).into_owned())
    }

    /// Ring capacity in bytes
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// System V key of the backing segment
    pub fn key(&self) -> ShmKey {
        self.segment.key()
    }

    fn copy_in(&self, offset: usize, bytes: &[u8]) {
        debug_assert!(offset + bytes.len() <= self.capacity);
        unsafe {
            ptr::copy_nonoverlapping(
                bytes.as_ptr(),
                self.segment.base_ptr().add(offset),
                bytes.len(),
            );
        }
    }

    fn copy_out(&self, offset: usize, into: &mut [u8]) {
        debug_assert!(offset + into.len() <= self.capacity);
        unsafe {
            ptr::copy_nonoverlapping(
                self.segment.base_ptr().add(offset) as *const u8,
                into.as_mut_ptr(),
                into.len(),
            );
        }
    }

    /// Decode the length prefix at `pos`, reading across the physical
    /// end when it straddles the boundary.
    fn decode_prefix(&self, pos: usize) -> usize {
        let mut raw = [0u8; PREFIX_LEN];
        if pos + PREFIX_LEN <= self.capacity {
            self.copy_out(pos, &mut raw);
        } else {
            let tail = self.capacity - pos;
            self.copy_out(pos, &mut raw[..tail]);
            self.copy_out(0, &mut raw[tail..]);
        }
        usize::from_ne_bytes(raw)
    }
}
