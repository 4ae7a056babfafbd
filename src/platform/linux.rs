//! System V shared memory syscall wrappers
//!
//! `nix` carries no System V shm bindings, so the calls go through
//! `libc` directly, with `nix::errno::Errno` for error decoding.

use nix::errno::Errno;
use std::ptr::NonNull;

/// Numeric key identifying a System V shared memory segment
pub type ShmKey = libc::key_t;

/// Owner read/write only
const SEGMENT_MODE: libc::c_int = 0o600;

/// Create the segment registered under `key`, or attach to it if it
/// already exists.
///
/// Returns the mapped base address and whether the segment was freshly
/// created. The kernel zero-fills fresh segments.
pub fn create_or_attach(key: ShmKey, size: usize) -> Result<(NonNull<u8>, bool), Errno> {
    let flags = libc::IPC_CREAT | libc::IPC_EXCL | SEGMENT_MODE;
    let (id, created) = match unsafe { libc::shmget(key, size, flags) } {
        -1 => match Errno::last() {
            Errno::EEXIST => {
                let id = unsafe { libc::shmget(key, size, SEGMENT_MODE) };
                if id == -1 {
                    return Err(Errno::last());
                }
                (id, false)
            }
            e => return Err(e),
        },
        id => (id, true),
    };

    let addr = unsafe { libc::shmat(id, std::ptr::null(), 0) };
    if addr as isize == -1 {
        return Err(Errno::last());
    }
    NonNull::new(addr.cast())
        .map(|base| (base, created))
        .ok_or(Errno::EFAULT)
}

/// Size in bytes of the segment registered under `key`, `0` when no
/// such segment exists.
pub fn size_of_key(key: ShmKey) -> Result<usize, Errno> {
    let id = unsafe { libc::shmget(key, 0, 0) };
    if id == -1 {
        return match Errno::last() {
            Errno::ENOENT => Ok(0),
            e => Err(e),
        };
    }

    let mut stat = std::mem::MaybeUninit::<libc::shmid_ds>::uninit();
    if unsafe { libc::shmctl(id, libc::IPC_STAT, stat.as_mut_ptr()) } == -1 {
        return Err(Errno::last());
    }
    let stat = unsafe { stat.assume_init() };
    Ok(stat.shm_segsz as usize)
}

/// Remove the segment registered under `key` outright.
///
/// Removing an absent key is not an error. Existing attachments stay
/// valid; the kernel reclaims the segment once the last one detaches.
pub fn remove(key: ShmKey) -> Result<(), Errno> {
    let id = unsafe { libc::shmget(key, 0, 0) };
    if id == -1 {
        return match Errno::last() {
            Errno::ENOENT => Ok(()),
            e => Err(e),
        };
    }

    if unsafe { libc::shmctl(id, libc::IPC_RMID, std::ptr::null_mut()) } == -1 {
        return Err(Errno::last());
    }
    Ok(())
}

/// Detach the mapping at `addr`; the segment itself persists for other
/// attachers.
pub fn detach(addr: NonNull<u8>) -> Result<(), Errno> {
    if unsafe { libc::shmdt(addr.as_ptr().cast()) } == -1 {
        return Err(Errno::last());
    }
    Ok(())
}
