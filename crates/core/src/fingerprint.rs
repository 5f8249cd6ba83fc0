//! Content fingerprints used as cache keys.

/// Fast, deterministic, non-cryptographic fingerprint of `text`.
///
/// 32-bit rolling hash (`h = h * 31 + unit`, wrapping) over the UTF-16 code
/// units of the input, rendered as a signed decimal string. Collisions are
/// possible; callers must only use it where a false hit is acceptable.
pub fn fingerprint(text: &str) -> String {
    let hash = text
        .encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(unit as i32));
    hash.to_string()
}
