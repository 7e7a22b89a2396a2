//! Turns the miss-rate matrix into a last-round key guess.

use crate::key_schedule::SBOX;

/// How many low-miss-rate values feed the vote per position. One probed
/// cache line covers 16 table entries, so 16 ciphertext values share it.
const LINE_ENTRIES: usize = 16;

/// Indices of the `k` smallest defined entries of `row`, ascending by value.
///
/// Single scan with a sorted insertion buffer of size `k`. Equal values keep
/// the earlier index, and `None` entries never rank.
pub fn bottom_k(row: &[Option<f64>], k: usize) -> Vec<usize> {
    let mut bot: Vec<(usize, f64)> = Vec::with_capacity(k + 1);
    for (i, entry) in row.iter().enumerate() {
        let value = match entry {
            Some(v) => *v,
            None => continue,
        };
        let mut at = bot.len();
        while at > 0 && bot[at - 1].1 > value {
            at -= 1;
        }
        if at >= k {
            continue;
        }
        bot.insert(at, (i, value));
        bot.truncate(k);
    }
    bot.into_iter().map(|(i, _)| i).collect()
}

/// Key-byte guess for one position.
///
/// A low miss rate at ciphertext value `v` says the final round habitually
/// keeps the probed line resident when that value appears. The line holds
/// table entries 0..16, whose substitution outputs are `SBOX[0..16]`, so
/// each such `v ^ SBOX[j]` is a candidate key byte.
fn guess_position(row: &[Option<f64>; 256]) -> u8 {
    let mut votes = [0u32; 256];
    for v in bottom_k(row, LINE_ENTRIES) {
        for &c in &SBOX[..LINE_ENTRIES] {
            votes[v ^ c as usize] += 1;
        }
    }
    // First-seen maximum; an empty vote table resolves to zero.
    let mut best = 0usize;
    let mut best_votes = 0u32;
    for (candidate, &count) in votes.iter().enumerate() {
        if count > best_votes {
            best_votes = count;
            best = candidate;
        }
    }
    best as u8
}

/// The 16-byte round-10 key voted out of the miss-rate matrix.
pub fn last_round_key(rates: &[[Option<f64>; 256]; 16]) -> [u8; 16] {
    let mut guess = [0u8; 16];
    for (position, row) in rates.iter().enumerate() {
        guess[position] = guess_position(row);
    }
    guess
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force_bottom(row: &[Option<f64>], k: usize) -> Vec<usize> {
        let mut defined: Vec<(usize, f64)> = row
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|v| (i, v)))
            .collect();
        defined.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap().then(a.0.cmp(&b.0)));
        defined.into_iter().take(k).map(|(i, _)| i).collect()
    }

    #[test]
    fn bottom_k_matches_full_sort_for_every_k() {
        // deterministic scramble with repeated values
        let row: Vec<Option<f64>> = (0..64)
            .map(|i| Some(((i * 37 + 11) % 16) as f64 / 16.0))
            .collect();
        for k in 0..=row.len() {
            assert_eq!(bottom_k(&row, k), brute_force_bottom(&row, k), "k = {k}");
        }
    }

    #[test]
    fn ties_keep_the_earliest_index() {
        let row = [Some(0.5), Some(0.2), Some(0.5), Some(0.1), Some(0.2)];
        assert_eq!(bottom_k(&row, 5), vec![3, 1, 4, 0, 2]);
        assert_eq!(bottom_k(&row, 2), vec![3, 1]);
    }

    #[test]
    fn undefined_entries_never_rank() {
        let mut row = [Some(0.9); 32];
        row[7] = None;
        row[20] = Some(0.1);
        let bot = bottom_k(&row, 16);
        assert_eq!(bot.len(), 16);
        assert!(!bot.contains(&7));
        assert_eq!(bot[0], 20);
    }

    #[test]
    fn vote_recovers_an_engineered_key_byte() {
        for &key_byte in &[0x00u8, 0x3a, 0xc5, 0xff] {
            let mut rates = [[Some(0.8); 256]; 16];
            for row in rates.iter_mut() {
                for &c in &SBOX[..LINE_ENTRIES] {
                    row[(key_byte ^ c) as usize] = Some(0.1);
                }
            }
            assert_eq!(last_round_key(&rates), [key_byte; 16]);
        }
    }

    #[test]
    fn unobserved_value_does_not_crash_nor_rank() {
        let mut rates = [[Some(0.8); 256]; 16];
        for &c in &SBOX[..LINE_ENTRIES] {
            rates[3][(0x42 ^ c) as usize] = Some(0.0);
        }
        // one value never observed at position 3
        rates[3][(0x42 ^ 0x63) as usize] = None;
        let bot = bottom_k(&rates[3], LINE_ENTRIES);
        assert!(!bot.contains(&((0x42 ^ 0x63) as usize)));
        // fifteen good values still out-vote everything else
        assert_eq!(last_round_key(&rates)[3], 0x42);
    }
}
