//! LCG stream cipher used to obscure some @UTF tables.
//!
//! The keystream is `seed * increment^n` (wrapping u8 arithmetic) XORed
//! against the stored bytes. It is an obfuscation layer, not real
//! cryptography: the key pair is recovered by brute force against the
//! known 4-byte signature.

use crate::table::SIGNATURE;

/// A recovered LCG key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcgKeys {
    pub seed: u8,
    pub increment: u8,
}

/// Per-file key cache.
///
/// Once keys are found for one table in a file they are reused for every
/// subsequently encrypted table in that file instead of being re-derived.
pub type KeyCache = Option<LcgKeys>;

/// Keystream generator state.
///
/// The state advances monotonically with the read offset. Seeking backward
/// resets to zero and replays — an O(n) cost, because the cipher is not
/// random access.
#[derive(Debug, Clone)]
pub struct LcgKeystream {
    seed: u8,
    increment: u8,
    xor: u8,
    position: u64,
}

impl LcgKeystream {
    pub fn new(keys: LcgKeys) -> Self {
        Self {
            seed: keys.seed,
            increment: keys.increment,
            xor: keys.seed,
            position: 0,
        }
    }

    fn reset(&mut self) {
        self.xor = self.seed;
        self.position = 0;
    }

    /// Keystream byte for `position`.
    ///
    /// Positions at or after the current one advance the state forward;
    /// an earlier position triggers a reset-and-replay.
    pub fn byte_at(&mut self, position: u64) -> u8 {
        if position < self.position {
            self.reset();
        }

        while self.position < position {
            self.xor = self.xor.wrapping_mul(self.increment);
            self.position += 1;
        }

        self.xor
    }

    /// XOR-decrypt `bytes` in place, where `bytes[0]` sits at stream
    /// position `start`.
    pub fn decrypt(&mut self, start: u64, bytes: &mut [u8]) {
        for (i, b) in bytes.iter_mut().enumerate() {
            *b ^= self.byte_at(start + i as u64);
        }
    }
}

/// Decrypt the 4 signature bytes with a candidate key pair.
pub fn decrypt_signature(encrypted: [u8; 4], keys: LcgKeys) -> [u8; 4] {
    let mut stream = LcgKeystream::new(keys);
    let mut out = encrypted;
    stream.decrypt(0, &mut out);
    out
}

/// Brute-force the `(seed, increment)` pair that maps the stored bytes
/// back to the `@UTF` signature.
///
/// The seed is pinned by the first byte, so the search is effectively one
/// pass over the increments per surviving seed; worst case 256 * 256.
/// Returns `None` when no pair reproduces the signature.
pub fn find_keys(encrypted_signature: [u8; 4]) -> Option<LcgKeys> {
    for seed in 0..=u8::MAX {
        if encrypted_signature[0] ^ seed != SIGNATURE[0] {
            continue;
        }

        for increment in 0..=u8::MAX {
            let mut m = seed.wrapping_mul(increment);
            if encrypted_signature[1] ^ m != SIGNATURE[1] {
                continue;
            }

            let mut matched = true;
            for j in 2..SIGNATURE.len() {
                m = m.wrapping_mul(increment);
                if encrypted_signature[j] ^ m != SIGNATURE[j] {
                    matched = false;
                    break;
                }
            }

            if matched {
                return Some(LcgKeys { seed, increment });
            }
        }
    }

    None
}
