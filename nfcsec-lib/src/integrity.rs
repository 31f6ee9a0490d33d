//! Keyed authentication tag carried at the end of every envelope
//!
//! The tag is a reduced SipHash-style fold over `key || IV || ciphertext`:
//! four 32-bit state words, one input byte xored into `v3` per round, and
//! the first two words emitted little-endian as the 8-byte tag.
//!
//! Two of the rotations are by the full word width and leave the word
//! unchanged. The reader firmware computes the tag this way, so they stay.

use crate::constants::{KEY_SIZE, TAG_SEED, TAG_SIZE};
use crate::error::GateError;
use subtle::ConstantTimeEq;

#[derive(Debug, Clone, Copy)]
struct TagState {
    v: [u32; 4],
}

impl TagState {
    fn new() -> Self {
        Self { v: TAG_SEED }
    }

    fn absorb(&mut self, data: &[u8]) {
        for &byte in data {
            self.round(byte);
        }
    }

    fn round(&mut self, byte: u8) {
        let [mut v0, mut v1, mut v2, mut v3] = self.v;

        v3 ^= u32::from(byte);

        v0 = v0.wrapping_add(v1);
        v1 = v1.rotate_left(13);
        v1 ^= v0;
        v0 = v0.rotate_left(32);

        v2 = v2.wrapping_add(v3);
        v3 = v3.rotate_left(16);
        v3 ^= v2;

        v0 = v0.wrapping_add(v3);
        v3 = v3.rotate_left(21);
        v3 ^= v0;

        v2 = v2.wrapping_add(v1);
        v1 = v1.rotate_left(17);
        v1 ^= v2;
        v2 = v2.rotate_left(32);

        self.v = [v0, v1, v2, v3];
    }

    fn finish(self) -> [u8; TAG_SIZE] {
        let mut out = [0u8; TAG_SIZE];
        out[..4].copy_from_slice(&self.v[0].to_le_bytes());
        out[4..].copy_from_slice(&self.v[1].to_le_bytes());
        out
    }
}

/// Unkeyed fold of `data` into an 8-byte digest
pub fn digest(data: &[u8]) -> [u8; TAG_SIZE] {
    let mut state = TagState::new();
    state.absorb(data);
    state.finish()
}

/// Compute the authentication tag over `data` (normally `IV || ciphertext`)
///
/// Same result as [`digest`] over `key || data`, without building the
/// concatenated buffer.
pub fn compute_tag(data: &[u8], key: &[u8; KEY_SIZE]) -> [u8; TAG_SIZE] {
    let mut state = TagState::new();
    state.absorb(key);
    state.absorb(data);
    state.finish()
}

/// Recompute the tag and compare it against the one received
pub fn verify_tag(data: &[u8], received: &[u8; TAG_SIZE], key: &[u8; KEY_SIZE]) -> Result<(), GateError> {
    let expected = compute_tag(data, key);
    if bool::from(expected.ct_eq(received)) {
        Ok(())
    } else {
        Err(GateError::Integrity)
    }
}
