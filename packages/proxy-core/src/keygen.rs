//! Random key-secret generation.
//!
//! Generated keys are 64-character random alphanumerics with at least 10
//! digits, not derived from the parent (`spec.md`'s Non-goals explicitly
//! rule out cryptographic derivation here).

use rand::seq::SliceRandom;
use rand::Rng;

const KEY_LEN: usize = 64;
const MIN_DIGITS: usize = 10;
const LETTERS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";

/// Generates a new 64-character alphanumeric key secret containing at least
/// `MIN_DIGITS` digit characters, placed at random positions.
pub fn generate_key() -> String {
    let mut rng = rand::rng();
    let mut chars: Vec<u8> = Vec::with_capacity(KEY_LEN);

    for _ in 0..MIN_DIGITS {
        chars.push(*DIGITS.choose(&mut rng).expect("DIGITS is non-empty"));
    }
    for _ in MIN_DIGITS..KEY_LEN {
        let alphabet: &[u8] = if rng.random_bool(0.5) { LETTERS } else { DIGITS };
        chars.push(*alphabet.choose(&mut rng).expect("alphabet is non-empty"));
    }
    chars.shuffle(&mut rng);

    String::from_utf8(chars).expect("alphabet is ASCII")
}
