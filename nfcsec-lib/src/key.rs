use crate::cipher;
use crate::constants::{KEY_SIZE, TAG_SIZE};
use crate::error::GateError;
use crate::integrity;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Process-wide 128-bit key shared with the reader firmware.
///
/// The firmware uses one key both to encrypt the UID and to tag the
/// envelope. Both roles go through this type so that splitting them later
/// only touches [`SecretKey::cipher_key`] and [`SecretKey::tag_key`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_SIZE]);

impl SecretKey {
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse a key from 32 hex characters
    pub fn from_hex(encoded: &str) -> Result<Self, GateError> {
        let bytes = Zeroizing::new(hex::decode(encoded.trim()).map_err(|e| GateError::InvalidKey(e.to_string()))?);
        let key: [u8; KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| {
            GateError::InvalidKey(format!("expected {} bytes, got {}", KEY_SIZE, bytes.len()))
        })?;
        Ok(Self(key))
    }

    fn cipher_key(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    fn tag_key(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Decrypt a block-aligned ciphertext
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, GateError> {
        cipher::decrypt_ecb(ciphertext, self.cipher_key())
    }

    /// Encrypt a block-aligned plaintext
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, GateError> {
        cipher::encrypt_ecb(plaintext, self.cipher_key())
    }

    /// Authentication tag over `data`
    pub fn tag(&self, data: &[u8]) -> [u8; TAG_SIZE] {
        integrity::compute_tag(data, self.tag_key())
    }

    pub fn verify_tag(&self, data: &[u8], received: &[u8; TAG_SIZE]) -> Result<(), GateError> {
        integrity::verify_tag(data, received, self.tag_key())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        let key = SecretKey::from_hex("0123456789abcdef0123456789abcdef").unwrap();
        assert_eq!(
            key.cipher_key(),
            &[0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF]
        );
    }

    #[test]
    fn test_from_hex_wrong_length() {
        match SecretKey::from_hex("0123") {
            Err(GateError::InvalidKey(msg)) => assert!(msg.contains("expected 16 bytes, got 2"), "{}", msg),
            other => panic!("expected InvalidKey, got {:?}", other),
        }
    }

    #[test]
    fn test_from_hex_not_hex() {
        assert!(matches!(SecretKey::from_hex("zz"), Err(GateError::InvalidKey(_))));
    }

    #[test]
    fn test_debug_does_not_leak() {
        let key = SecretKey::new([0xAB; KEY_SIZE]);
        assert_eq!(format!("{:?}", key), "SecretKey(<redacted>)");
    }
}
