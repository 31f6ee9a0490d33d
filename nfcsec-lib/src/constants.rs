// Wire and algorithm constants shared with the reader firmware

/// Size of one cipher block (8 bytes)
pub const BLOCK_SIZE: usize = 8;

/// Size of the shared secret key (16 bytes)
pub const KEY_SIZE: usize = 16;

/// Size of the envelope IV prefix (8 bytes)
pub const IV_SIZE: usize = 8;

/// Size of the trailing authentication tag (8 bytes)
pub const TAG_SIZE: usize = 8;

/// Smallest valid envelope: IV + one ciphertext block + tag
pub const MIN_ENVELOPE_SIZE: usize = IV_SIZE + BLOCK_SIZE + TAG_SIZE;

/// Number of Feistel rounds per block
pub const CIPHER_ROUNDS: u32 = 32;

/// Key schedule constant added to the round sum
pub const CIPHER_DELTA: u32 = 0x9E37_79B9;

/// Initial tag state words (upper halves of the SipHash init constants)
pub const TAG_SEED: [u32; 4] = [0x736F_6D65, 0x646F_7261, 0x6C79_6765, 0x7465_6462];

/// Channel carrying UIDs the reader could not verify locally
pub const VERIFY_CHANNEL: &str = "nfc/verify";

/// Channel carrying UIDs the reader already granted access to
pub const ACCESS_CHANNEL: &str = "nfc/access";

/// Channel every response notice is published on
pub const RESPONSE_CHANNEL: &str = "server/response";
