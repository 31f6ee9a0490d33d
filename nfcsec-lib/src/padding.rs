/// Remove trailing zero bytes left by block padding
///
/// Interior zeros are kept. An all-zero buffer strips to empty.
pub fn strip_padding(buffer: &[u8]) -> &[u8] {
    let len = buffer.iter().rposition(|&b| b != 0).map_or(0, |last| last + 1);
    &buffer[..len]
}

/// Recover the tag UID from a decrypted payload
///
/// The reader encrypts the raw UID bytes, so the identifier is the
/// uppercase hex rendering of what remains after stripping padding.
pub fn uid_from_plaintext(plaintext: &[u8]) -> String {
    hex::encode_upper(strip_padding(plaintext))
}
