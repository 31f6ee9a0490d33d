use crate::constants::{BLOCK_SIZE, IV_SIZE, MIN_ENVELOPE_SIZE, TAG_SIZE};
use crate::error::GateError;
use crate::key::SecretKey;
use bytes::{BufMut, Bytes, BytesMut};

/// One encrypted message from a reader: `IV || ciphertext || tag`
///
/// On the wire the three parts are concatenated and hex-encoded. The
/// ciphertext is always a whole number of cipher blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub iv: [u8; IV_SIZE],
    pub ciphertext: Bytes,
    pub tag: [u8; TAG_SIZE],
}

impl Envelope {
    /// Parse the ASCII-hex form sent by the reader
    pub fn from_hex(encoded: &str) -> Result<Self, GateError> {
        let raw = hex::decode(encoded.trim())?;
        Self::try_from(Bytes::from(raw))
    }

    /// The bytes covered by the tag
    pub fn authenticated_data(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(IV_SIZE + self.ciphertext.len());
        data.extend_from_slice(&self.iv);
        data.extend_from_slice(&self.ciphertext);
        data
    }

    /// Check the tag against the one recomputed with `key`
    pub fn verify(&self, key: &SecretKey) -> Result<(), GateError> {
        key.verify_tag(&self.authenticated_data(), &self.tag)
    }

    /// Verify, then decrypt. Nothing is decrypted if the tag does not match.
    pub fn open(&self, key: &SecretKey) -> Result<Vec<u8>, GateError> {
        self.verify(key)?;
        key.decrypt(&self.ciphertext)
    }

    /// Build an envelope the way the reader does: zero-pad to the block
    /// size, encrypt, then tag `IV || ciphertext`. An empty payload still
    /// occupies one block.
    pub fn seal(payload: &[u8], iv: [u8; IV_SIZE], key: &SecretKey) -> Result<Self, GateError> {
        let padded_len = payload.len().div_ceil(BLOCK_SIZE).max(1) * BLOCK_SIZE;
        let mut padded = vec![0u8; padded_len];
        padded[..payload.len()].copy_from_slice(payload);

        let ciphertext = Bytes::from(key.encrypt(&padded)?);
        let mut envelope = Self {
            iv,
            ciphertext,
            tag: [0u8; TAG_SIZE],
        };
        envelope.tag = key.tag(&envelope.authenticated_data());
        Ok(envelope)
    }

    /// Lowercase hex, matching the reader's output
    pub fn to_hex(&self) -> String {
        hex::encode(Bytes::from(self.clone()))
    }
}

impl TryFrom<Bytes> for Envelope {
    type Error = GateError;

    fn try_from(mut bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.len() < MIN_ENVELOPE_SIZE {
            return Err(GateError::EnvelopeTooShort {
                expected: MIN_ENVELOPE_SIZE,
                actual: bytes.len(),
            });
        }

        let ciphertext_len = bytes.len() - IV_SIZE - TAG_SIZE;
        if !ciphertext_len.is_multiple_of(BLOCK_SIZE) {
            return Err(GateError::Length(ciphertext_len));
        }

        let iv = bytes.split_to(IV_SIZE);
        let tag = bytes.split_off(ciphertext_len);

        Ok(Envelope {
            iv: fixed(&iv)?,
            ciphertext: bytes,
            tag: fixed(&tag)?,
        })
    }
}

fn fixed<const N: usize>(slice: &[u8]) -> Result<[u8; N], GateError> {
    slice.try_into().map_err(|_| GateError::EnvelopeTooShort {
        expected: N,
        actual: slice.len(),
    })
}

impl From<Envelope> for Bytes {
    fn from(envelope: Envelope) -> Self {
        let mut buf = BytesMut::with_capacity(IV_SIZE + envelope.ciphertext.len() + TAG_SIZE);
        buf.put_slice(&envelope.iv);
        buf.put_slice(&envelope.ciphertext);
        buf.put_slice(&envelope.tag);
        buf.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // IV 0001..07, UID 9DBBDC21, key 0123456789abcdef x2
    const FIRMWARE_ENVELOPE: &str = "00010203040506070f24f35d4597970220935df3dd61cf41";

    fn device_key() -> SecretKey {
        SecretKey::from_hex("0123456789abcdef0123456789abcdef").unwrap()
    }

    #[test]
    fn test_parse_firmware_envelope() {
        let envelope = Envelope::from_hex(FIRMWARE_ENVELOPE).unwrap();
        assert_eq!(envelope.iv, [0, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(envelope.ciphertext.as_ref(), hex::decode("0f24f35d45979702").unwrap());
        assert_eq!(hex::encode(envelope.tag), "20935df3dd61cf41");
    }

    #[test]
    fn test_open_firmware_envelope() {
        let envelope = Envelope::from_hex(FIRMWARE_ENVELOPE).unwrap();
        let plaintext = envelope.open(&device_key()).unwrap();
        assert_eq!(plaintext, vec![0x9D, 0xBB, 0xDC, 0x21, 0, 0, 0, 0]);
    }

    #[test]
    fn test_uppercase_hex_accepted() {
        let envelope = Envelope::from_hex(&FIRMWARE_ENVELOPE.to_uppercase()).unwrap();
        assert!(envelope.verify(&device_key()).is_ok());
    }

    #[test]
    fn test_seal_reproduces_firmware_output() {
        let envelope = Envelope::seal(&[0x9D, 0xBB, 0xDC, 0x21], [0, 1, 2, 3, 4, 5, 6, 7], &device_key()).unwrap();
        assert_eq!(envelope.to_hex(), FIRMWARE_ENVELOPE);
    }

    #[test]
    fn test_too_short() {
        let short = "00".repeat(MIN_ENVELOPE_SIZE - 1);
        match Envelope::from_hex(&short) {
            Err(GateError::EnvelopeTooShort { expected, actual }) => {
                assert_eq!(expected, 24);
                assert_eq!(actual, 23);
            }
            other => panic!("expected EnvelopeTooShort, got {:?}", other),
        }
    }

    #[test]
    fn test_misaligned_ciphertext() {
        let misaligned = "00".repeat(MIN_ENVELOPE_SIZE + 3);
        assert!(matches!(Envelope::from_hex(&misaligned), Err(GateError::Length(11))));
    }

    #[test]
    fn test_invalid_hex() {
        assert!(matches!(Envelope::from_hex("not hex at all"), Err(GateError::InvalidHex(_))));
        assert!(matches!(Envelope::from_hex("abc"), Err(GateError::InvalidHex(_))));
    }
}
