#![deny(unsafe_op_in_unsafe_fn)]

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CacheStatus {
    Hit,
    Miss,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SideChannelError {
    AddressNotReady(*const u8),
}

/// Latency cutoff separating resident from evicted lines.
///
/// The value is specific to one machine and microarchitecture and comes from
/// configuration, not from a universal constant.
#[derive(Debug, Clone, Copy)]
pub struct Threshold {
    pub value: u64,
}

impl Threshold {
    pub fn classify(&self, time: u64) -> CacheStatus {
        if time > self.value {
            CacheStatus::Miss
        } else {
            CacheStatus::Hit
        }
    }
}

/// A channel measuring one probe address at a time.
///
/// The caller runs the victim operation itself between `prepare_single` and
/// `test_single`; the protocol is strictly sequential.
pub trait SingleAddrCacheSideChannel {
    /// # Safety
    ///
    /// addr must be a valid pointer to read.
    unsafe fn prepare_single(&mut self, addr: *const u8) -> Result<(), SideChannelError>;
    /// # Safety
    ///
    /// addr must be a valid pointer to read.
    unsafe fn test_single(&mut self, addr: *const u8) -> Result<CacheStatus, SideChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_boundary_is_a_hit() {
        let threshold = Threshold { value: 160 };
        assert_eq!(threshold.classify(159), CacheStatus::Hit);
        assert_eq!(threshold.classify(160), CacheStatus::Hit);
        assert_eq!(threshold.classify(161), CacheStatus::Miss);
    }
}
