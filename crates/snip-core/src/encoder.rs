use crate::error::DecodeError;

/// Encodes arbitrary bytes as a lowercase hexadecimal token.
///
/// The transform is injective and reversible, so two different inputs can
/// never produce the same token. The price is a token twice as long as the
/// input.
///
/// # Examples
///
/// ```
/// use snip_core::encoder;
///
/// assert_eq!(encoder::encode(b"http://a"), "687474703a2f2f61");
/// ```
pub fn encode<T: AsRef<[u8]>>(bytes: T) -> String {
    hex::encode(bytes)
}

/// Decodes a token produced by [`encode`] back into the original bytes.
///
/// Only the lowercase alphabet [`encode`] emits is accepted, so every byte
/// sequence has exactly one token. Fails on odd length or any other
/// character.
pub fn decode(token: &str) -> Result<Vec<u8>, DecodeError> {
    if let Some((index, c)) = token.char_indices().find(|(_, c)| c.is_ascii_uppercase()) {
        return Err(DecodeError::InvalidCharacter { c, index });
    }

    hex::decode(token).map_err(|e| match e {
        hex::FromHexError::OddLength => DecodeError::OddLength(token.len()),
        hex::FromHexError::InvalidHexCharacter { c, index } => {
            DecodeError::InvalidCharacter { c, index }
        }
        hex::FromHexError::InvalidStringLength => DecodeError::OddLength(token.len()),
    })
}
