#![deny(unsafe_op_in_unsafe_fn)]

pub mod timing;

use core::arch::x86_64 as arch_x86;
use core::ptr;

// rdtsc, no serialization
pub unsafe fn rdtsc_nofence() -> u64 {
    unsafe { arch_x86::_rdtsc() }
}

// rdtsc with mfence before and after
pub unsafe fn rdtsc_fence() -> u64 {
    unsafe {
        arch_x86::_mm_mfence();
        let tsc: u64 = arch_x86::_rdtsc();
        arch_x86::_mm_mfence();
        tsc
    }
}

pub unsafe fn maccess<T>(p: *const T) {
    unsafe { ptr::read_volatile(p) };
}

// flush (clflush)
pub unsafe fn flush(p: *const u8) {
    unsafe { arch_x86::_mm_clflush(p) };
}
