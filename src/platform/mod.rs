//! Platform-specific shared memory primitives

mod linux;

pub use linux::{ShmKey, create_or_attach, detach, remove, size_of_key};
