//! Timed memory accesses built from the counter and flush primitives.

use crate::{flush, maccess, rdtsc_fence, rdtsc_nofence};

/// Reloads `p` between two serialized counter reads and returns the elapsed
/// cycles. The fences keep the access inside the measured window.
///
/// # Safety
///
/// `p` must be a valid pointer to read.
pub unsafe fn only_reload(p: *const u8) -> u64 {
    let t = unsafe { rdtsc_fence() };
    unsafe { maccess(p) };
    (unsafe { rdtsc_fence() }) - t
}

/// Same measurement with raw counter reads. The access can be reordered
/// across the counter reads, so the result is noisier than [`only_reload`].
///
/// # Safety
///
/// `p` must be a valid pointer to read.
pub unsafe fn only_reload_nofence(p: *const u8) -> u64 {
    let t = unsafe { rdtsc_nofence() };
    unsafe { maccess(p) };
    (unsafe { rdtsc_nofence() }) - t
}

/// Evicts the line containing `p`, then measures the reload.
///
/// # Safety
///
/// `p` must be a valid pointer to read.
pub unsafe fn flush_and_reload(p: *const u8) -> u64 {
    unsafe { flush(p) };
    let t = unsafe { rdtsc_fence() };
    unsafe { maccess(p) };
    (unsafe { rdtsc_fence() }) - t
}
