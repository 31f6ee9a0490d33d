//! 64-bit block cipher used by the reader firmware
//!
//! A 32-round Feistel network over two little-endian 32-bit words with a
//! 128-bit key (four little-endian words). Messages are processed block by
//! block with no chaining, so every 8-byte chunk decrypts on its own.
//!
//! The firmware pads plaintext with zero bytes up to the block size before
//! encrypting; see [`crate::padding`] for the reverse step.

use crate::constants::{BLOCK_SIZE, CIPHER_DELTA, CIPHER_ROUNDS, KEY_SIZE};
use crate::error::GateError;
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// One cipher block as it sits on the wire
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
struct BlockRaw {
    y: U32,
    z: U32,
}

fn key_schedule(key: &[u8; KEY_SIZE]) -> [u32; 4] {
    let words: [U32; 4] = zerocopy::transmute!(*key);
    words.map(|w| w.get())
}

#[inline]
fn feistel(v: u32, sum: u32, ka: u32, kb: u32) -> u32 {
    (v << 4).wrapping_add(ka) ^ v.wrapping_add(sum) ^ (v >> 5).wrapping_add(kb)
}

/// Decrypt a single 8-byte block
pub fn decrypt_block(block: &[u8; BLOCK_SIZE], key: &[u8; KEY_SIZE]) -> [u8; BLOCK_SIZE] {
    let k = key_schedule(key);
    let raw: BlockRaw = zerocopy::transmute!(*block);
    let (mut y, mut z) = (raw.y.get(), raw.z.get());

    let mut sum = CIPHER_DELTA.wrapping_mul(CIPHER_ROUNDS);
    for _ in 0..CIPHER_ROUNDS {
        z = z.wrapping_sub(feistel(y, sum, k[2], k[3]));
        y = y.wrapping_sub(feistel(z, sum, k[0], k[1]));
        sum = sum.wrapping_sub(CIPHER_DELTA);
    }

    zerocopy::transmute!(BlockRaw {
        y: U32::new(y),
        z: U32::new(z),
    })
}

/// Encrypt a single 8-byte block (the firmware side of the cipher)
pub fn encrypt_block(block: &[u8; BLOCK_SIZE], key: &[u8; KEY_SIZE]) -> [u8; BLOCK_SIZE] {
    let k = key_schedule(key);
    let raw: BlockRaw = zerocopy::transmute!(*block);
    let (mut y, mut z) = (raw.y.get(), raw.z.get());

    let mut sum = 0u32;
    for _ in 0..CIPHER_ROUNDS {
        sum = sum.wrapping_add(CIPHER_DELTA);
        y = y.wrapping_add(feistel(z, sum, k[0], k[1]));
        z = z.wrapping_add(feistel(y, sum, k[2], k[3]));
    }

    zerocopy::transmute!(BlockRaw {
        y: U32::new(y),
        z: U32::new(z),
    })
}

/// Decrypt a whole ciphertext block by block
///
/// The length is checked once up front; no block is touched if the
/// ciphertext is not block-aligned.
pub fn decrypt_ecb(ciphertext: &[u8], key: &[u8; KEY_SIZE]) -> Result<Vec<u8>, GateError> {
    apply_ecb(ciphertext, key, decrypt_block)
}

/// Encrypt a block-aligned plaintext block by block
pub fn encrypt_ecb(plaintext: &[u8], key: &[u8; KEY_SIZE]) -> Result<Vec<u8>, GateError> {
    apply_ecb(plaintext, key, encrypt_block)
}

fn apply_ecb(
    input: &[u8],
    key: &[u8; KEY_SIZE],
    op: fn(&[u8; BLOCK_SIZE], &[u8; KEY_SIZE]) -> [u8; BLOCK_SIZE],
) -> Result<Vec<u8>, GateError> {
    if !input.len().is_multiple_of(BLOCK_SIZE) {
        return Err(GateError::Length(input.len()));
    }

    let mut output = Vec::with_capacity(input.len());
    for chunk in input.chunks_exact(BLOCK_SIZE) {
        let block: &[u8; BLOCK_SIZE] = chunk.try_into().map_err(|_| GateError::Length(input.len()))?;
        output.extend_from_slice(&op(block, key));
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE_KEY: [u8; KEY_SIZE] = [
        0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF,
    ];

    #[test]
    fn test_zero_key_zero_block_vector() {
        // Published reference vector: key 0, plaintext 0 -> 41ea3a0a 94baa940
        let encrypted = encrypt_block(&[0u8; 8], &[0u8; 16]);
        let mut expected = [0u8; 8];
        expected[..4].copy_from_slice(&0x41EA_3A0Au32.to_le_bytes());
        expected[4..].copy_from_slice(&0x94BA_A940u32.to_le_bytes());
        assert_eq!(encrypted, expected);
        assert_eq!(decrypt_block(&expected, &[0u8; 16]), [0u8; 8]);
    }

    #[test]
    fn test_device_key_vector() {
        let ciphertext = hex::decode("0f24f35d45979702").unwrap();
        let block: [u8; 8] = ciphertext.try_into().unwrap();
        let plaintext = decrypt_block(&block, &DEVICE_KEY);
        assert_eq!(plaintext, [0x9D, 0xBB, 0xDC, 0x21, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_ecb_blocks_are_independent() {
        let block = [0x11u8; 8];
        let encrypted = encrypt_ecb(&[block, block].concat(), &DEVICE_KEY).unwrap();
        assert_eq!(encrypted[..8], encrypted[8..]);
    }

    #[test]
    fn test_length_checked_before_decrypting() {
        for len in [1usize, 7, 9, 15, 17] {
            match decrypt_ecb(&vec![0u8; len], &DEVICE_KEY) {
                Err(GateError::Length(actual)) => assert_eq!(actual, len),
                other => panic!("len {}: expected Length error, got {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_empty_input_is_aligned() {
        assert!(decrypt_ecb(&[], &DEVICE_KEY).unwrap().is_empty());
    }
}
