//! Ciphertext source standing in for the observed victim.

use openssl::error::ErrorStack;
use openssl::symm::{Cipher, Crypter, Mode};

/// Encrypts attacker-chosen plaintexts under a key the recovery never reads.
pub trait EncryptionOracle {
    fn encrypt(&mut self, plaintext: &[u8; 16]) -> [u8; 16];
}

/// AES-128 through the process's libcrypto, one ECB block at a time.
///
/// The T-table lookups happen inside the loaded library; the attack relies
/// on those tables sharing cache lines with the attacker's file-backed
/// mapping of the same image.
pub struct LibcryptoOracle {
    crypter: Crypter,
}

impl LibcryptoOracle {
    pub fn new(key: &[u8; 16]) -> Result<LibcryptoOracle, ErrorStack> {
        let mut crypter = Crypter::new(Cipher::aes_128_ecb(), Mode::Encrypt, key, None)?;
        crypter.pad(false);
        Ok(LibcryptoOracle { crypter })
    }
}

impl EncryptionOracle for LibcryptoOracle {
    fn encrypt(&mut self, plaintext: &[u8; 16]) -> [u8; 16] {
        // ECB blocks are independent, so one long-lived crypter serves every
        // trial.
        let mut out = [0u8; 32];
        let n = self
            .crypter
            .update(plaintext, &mut out)
            .expect("AES-128-ECB block");
        debug_assert_eq!(n, 16);
        let mut ciphertext = [0u8; 16];
        ciphertext.copy_from_slice(&out[..16]);
        ciphertext
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_the_fips_197_example() {
        let key = [
            0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf,
            0x4f, 0x3c,
        ];
        let plaintext = [
            0x32, 0x43, 0xf6, 0xa8, 0x88, 0x5a, 0x30, 0x8d, 0x31, 0x31, 0x98, 0xa2, 0xe0, 0x37,
            0x07, 0x34,
        ];
        let expected = [
            0x39, 0x25, 0x84, 0x1d, 0x02, 0xdc, 0x09, 0xfb, 0xdc, 0x11, 0x85, 0x97, 0x19, 0x6a,
            0x0b, 0x32,
        ];
        let mut oracle = LibcryptoOracle::new(&key).unwrap();
        assert_eq!(oracle.encrypt(&plaintext), expected);
    }

    #[test]
    fn repeated_blocks_do_not_chain() {
        let mut oracle = LibcryptoOracle::new(&[0u8; 16]).unwrap();
        let first = oracle.encrypt(&[0x11; 16]);
        let _ = oracle.encrypt(&[0x22; 16]);
        assert_eq!(oracle.encrypt(&[0x11; 16]), first);
    }
}
