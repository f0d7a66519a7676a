//! base64url and fixed-width byte helpers shared by the push pipeline.

use base64ct::{Base64UrlUnpadded, Encoding};

/// Encodes `bytes` as unpadded base64url.
pub fn encode(bytes: &[u8]) -> String {
    Base64UrlUnpadded::encode_string(bytes)
}

/// Decodes base64url, accepting input with or without trailing `=` padding.
///
/// `+` and `/` from the standard alphabet are read as `-` and `_`.
pub fn decode(input: &str) -> Result<Vec<u8>, base64ct::Error> {
    let normalized: String = input
        .trim_end_matches('=')
        .chars()
        .map(|it| match it {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    Base64UrlUnpadded::decode_vec(&normalized)
}

/// Decodes base64url into exactly `N` bytes, returning `None` on any other length.
pub(crate) fn decode_array<const N: usize>(input: &str) -> Result<Option<[u8; N]>, base64ct::Error> {
    Ok(decode(input)?.try_into().ok())
}

/// Concatenates byte slices in order.
pub fn concat(parts: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(parts.iter().map(|it| it.len()).sum());
    for part in parts {
        out.extend_from_slice(part);
    }
    out
}

/// Left-pads `bytes` with zeros to exactly `N` bytes.
///
/// Returns `None` if `bytes` is longer than `N`.
pub fn left_pad<const N: usize>(bytes: &[u8]) -> Option<[u8; N]> {
    let offset = N.checked_sub(bytes.len())?;
    let mut out = [0u8; N];
    out[offset..].copy_from_slice(bytes);
    Some(out)
}
