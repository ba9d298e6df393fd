//! Tolerant numeric parsing shared by the CLI grammar and the XML loader.
//!
//! Input containing `0x`/`0X` is read as hex, anything else must be plain
//! decimal digits.  Unparseable input yields `None`; callers decide whether
//! that means "use the default" or "reject".

/// Parse a 32-bit value from hex (`0x` prefix) or decimal text.
pub fn parse_u32(text: &str) -> Option<u32> {
    parse_u64(text).and_then(|v| u32::try_from(v).ok())
}

/// Parse a 64-bit value from hex (`0x` prefix) or decimal text.
///
/// The `0x` marker is matched anywhere in the text, not only as a prefix,
/// and only the digits after it count: `"10x5"` parses as `5`.  This is the
/// accepted input format for saved files; do not tighten it to a prefix.
pub fn parse_u64(text: &str) -> Option<u64> {
    let upper = text.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return None;
    }
    if let Some(pos) = upper.find("0X") {
        let digits = &upper[pos + 2..];
        if digits.is_empty() {
            return None;
        }
        return u64::from_str_radix(digits, 16).ok();
    }
    if !upper.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    upper.parse().ok()
}

/// Parse text that *must* carry a `0x`/`0X` prefix.
///
/// Used by the interactive LBA prompt, which refuses bare decimal input.
pub fn parse_hex_prefixed(text: &str) -> Option<u64> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
