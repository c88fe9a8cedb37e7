//! Payload sanitization and text decoding.
//!
//! Payloads are treated as one byte per character (ISO-8859-1), so
//! stripping whitespace works directly on bytes.

/// Bytes removed by sanitization: newline, tab and plain space.
pub const STRIPPED_BYTES: [u8; 3] = [b'\n', b'\t', b' '];

#[inline]
fn is_stripped(byte: u8) -> bool {
    STRIPPED_BYTES.contains(&byte)
}

/// Appends `bytes` to `out` without newline, tab or space characters.
///
/// Returns the number of bytes stripped.
pub fn sanitize_into(bytes: &[u8], out: &mut Vec<u8>) -> usize {
    let before = out.len();
    out.extend(bytes.iter().copied().filter(|&b| !is_stripped(b)));
    bytes.len() - (out.len() - before)
}

/// Returns `bytes` without newline, tab or space characters.
pub fn sanitize(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len());
    sanitize_into(bytes, &mut out);
    out
}

/// Decodes bytes as ISO-8859-1, one character per byte.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
