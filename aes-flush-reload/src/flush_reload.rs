//! Naive Flush+Reload against one probe address at a time.

use cache_side_channel::{CacheStatus, SideChannelError, SingleAddrCacheSideChannel, Threshold};
use cache_utils::flush;
use cache_utils::timing::{only_reload, only_reload_nofence};

/// Flush on prepare, timed reload on test.
#[derive(Debug)]
pub struct NaiveFlushAndReload {
    threshold: Threshold,
    fenced: bool,
    current: Option<*const u8>,
}

impl NaiveFlushAndReload {
    pub fn from_threshold(threshold: u64) -> Self {
        NaiveFlushAndReload {
            threshold: Threshold { value: threshold },
            fenced: true,
            current: None,
        }
    }

    /// Time with raw counter reads instead of serialized ones. Noisier;
    /// kept reachable so both measurement strategies can be compared.
    pub fn without_fences(mut self) -> Self {
        self.fenced = false;
        self
    }
}

impl SingleAddrCacheSideChannel for NaiveFlushAndReload {
    unsafe fn prepare_single(&mut self, addr: *const u8) -> Result<(), SideChannelError> {
        unsafe { flush(addr) };
        self.current = Some(addr);
        Ok(())
    }

    unsafe fn test_single(&mut self, addr: *const u8) -> Result<CacheStatus, SideChannelError> {
        if self.current != Some(addr) {
            return Err(SideChannelError::AddressNotReady(addr));
        }
        let time = if self.fenced {
            unsafe { only_reload(addr) }
        } else {
            unsafe { only_reload_nofence(addr) }
        };
        Ok(self.threshold.classify(time))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn testing_an_unprepared_probe_is_an_error() {
        let line = [0u8; 64];
        let addr = line.as_ptr();
        let mut channel = NaiveFlushAndReload::from_threshold(160);
        assert_eq!(
            unsafe { channel.test_single(addr) },
            Err(SideChannelError::AddressNotReady(addr))
        );
    }

    #[test]
    fn prepared_probe_classifies() {
        let line = [0u8; 64];
        let addr = line.as_ptr();
        let mut channel = NaiveFlushAndReload::from_threshold(160);
        unsafe { channel.prepare_single(addr) }.unwrap();
        assert!(unsafe { channel.test_single(addr) }.is_ok());
    }
}
