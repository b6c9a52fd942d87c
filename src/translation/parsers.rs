//! Byte-level tests for the placeholder scanner.

use super::PlaceholderStyle;

fn pair_at(bytes: &[u8], idx: usize) -> Option<[u8; 2]> {
    Some([*bytes.get(idx)?, *bytes.get(idx + 1)?])
}

pub(super) fn opens_line_comment(bytes: &[u8], idx: usize) -> bool {
    pair_at(bytes, idx) == Some(*b"--")
}

pub(super) fn opens_block_comment(bytes: &[u8], idx: usize) -> bool {
    pair_at(bytes, idx) == Some(*b"/*")
}

pub(super) fn closes_block_comment(bytes: &[u8], idx: usize) -> bool {
    pair_at(bytes, idx) == Some(*b"*/")
}

pub(super) fn escaped_marker(bytes: &[u8], idx: usize) -> bool {
    pair_at(bytes, idx) == Some(*b"\\?")
}

/// Tag of a `$tag$` opener at `start`, with the index of its closing `$`.
///
/// Tags never start with a digit, so `$1` stays a placeholder.
pub(super) fn dollar_quote_tag(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    let rest = bytes.get(start + 1..)?;
    if rest.first().is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let len = rest.iter().position(|&b| b == b'$')?;
    let tag = &rest[..len];
    if !tag.iter().all(|&b| b.is_ascii_alphanumeric() || b == b'_') {
        return None;
    }
    let tag = std::str::from_utf8(tag).ok()?.to_string();
    Some((tag, start + 1 + len))
}

pub(super) fn closes_dollar_quote(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    bytes.get(idx + 1..end) == Some(tag.as_bytes()) && bytes.get(end) == Some(&b'$')
}

/// A placeholder already written in `style` at `start`: its index and the byte just past it.
///
/// `?` followed by digits is SQLite's numbered form and never a neutral marker.
pub(super) fn native_index(
    bytes: &[u8],
    start: usize,
    style: PlaceholderStyle,
) -> Option<(usize, usize)> {
    let prefix = match style {
        PlaceholderStyle::Colon => b':',
        PlaceholderStyle::Dollar => b'$',
        PlaceholderStyle::Question => b'?',
    };
    if bytes.get(start) != Some(&prefix) {
        return None;
    }
    // `::1` is a cast, not a bind.
    if style == PlaceholderStyle::Colon && start > 0 && bytes[start - 1] == b':' {
        return None;
    }
    let digits = bytes
        .get(start + 1..)?
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    let end = start + 1 + digits;
    let index = std::str::from_utf8(&bytes[start + 1..end]).ok()?.parse().ok()?;
    Some((index, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_indexes() {
        use PlaceholderStyle::{Colon, Dollar, Question};
        assert_eq!(native_index(b"?12 ", 0, Question), Some((12, 3)));
        assert_eq!(native_index(b"? ", 0, Question), None);
        assert_eq!(native_index(b"$3", 0, Dollar), Some((3, 2)));
        assert_eq!(native_index(b"$3", 0, Colon), None);
        assert_eq!(native_index(b"a = :1", 4, Colon), Some((1, 6)));
        assert_eq!(native_index(b"x::1", 2, Colon), None);
        assert_eq!(native_index(b":name", 0, Colon), None);
    }

    #[test]
    fn dollar_tags() {
        assert_eq!(dollar_quote_tag(b"$body$ x", 0), Some(("body".to_string(), 5)));
        assert_eq!(dollar_quote_tag(b"$$", 0), Some((String::new(), 1)));
        assert_eq!(dollar_quote_tag(b"$1", 0), None);
        assert_eq!(dollar_quote_tag(b"$a b$", 0), None);
        assert!(closes_dollar_quote(b"x $body$", 2, "body"));
        assert!(!closes_dollar_quote(b"x $bod", 2, "body"));
    }
}
