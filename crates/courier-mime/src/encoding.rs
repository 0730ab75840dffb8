//! MIME content transfer encodings.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 header words and RFC 2231
//! parameter values. All
//! encoders operate on explicit slices, so binary input containing NUL bytes
//! is encoded in full.

use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Maximum encoded line length allowed by RFC 2045 (excluding CRLF).
pub const MAX_LINE_LENGTH: usize = 76;

/// Encodes data as Base64.
///
/// Uses the standard alphabet with padding and no embedded line breaks; the
/// output is exactly [`encoded_len`]`(data.len())` bytes long.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    STANDARD.decode(data).map_err(Into::into)
}

/// Returns the length of the Base64 encoding of `raw_len` bytes.
#[must_use]
pub const fn encoded_len(raw_len: usize) -> usize {
    raw_len.div_ceil(3) * 4
}

/// Splits an encoded (ASCII) string into lines of at most `width` characters.
///
/// Used to lay Base64 output out in a MIME part body.
pub fn wrap_lines(encoded: &str, width: usize) -> impl Iterator<Item = &str> {
    debug_assert!(encoded.is_ascii());
    let width = width.max(1);
    (0..encoded.len())
        .step_by(width)
        .map(move |start| &encoded[start..(start + width).min(encoded.len())])
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input (LF or CRLF) become CRLF hard breaks. Lines longer
/// than 76 characters are split with `=` soft breaks, and whitespace at the
/// end of a line is encoded so that transports cannot strip it.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::with_capacity(text.len() + text.len() / 8);

    for (index, line) in text.split('\n').enumerate() {
        if index > 0 {
            result.push_str("\r\n");
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        encode_qp_line(line.as_bytes(), &mut result);
    }

    result
}

fn encode_qp_line(line: &[u8], out: &mut String) {
    let mut line_length = 0;

    for (i, &byte) in line.iter().enumerate() {
        let is_last = i + 1 == line.len();
        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => true,
            b' ' | b'\t' => !is_last,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Room must remain for the '=' of a soft break.
        if line_length + width > MAX_LINE_LENGTH - 1 {
            out.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            out.push(byte as char);
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        line_length += width;
    }
}

/// Encodes a header value using RFC 2047 encoded-words when needed.
///
/// Pure printable ASCII is returned unchanged. Otherwise the text is split on
/// character boundaries into `=?charset?B?...?=` words no longer than 75
/// characters, folded onto continuation lines.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    let needs_encoding =
        text.contains("=?") || text.chars().any(|c| !(c.is_ascii_graphic() || c == ' '));
    if !needs_encoding {
        return text.to_string();
    }

    // "=?" + charset + "?B?" + payload + "?=" must fit in 75 characters.
    let overhead = charset.len() + 7;
    let max_payload = MAX_LINE_LENGTH.saturating_sub(1 + overhead);
    let max_raw = (max_payload / 4 * 3).max(4);

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > max_raw && !chunk.is_empty() {
            words.push(format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())));
    }

    words.join("\r\n ")
}

/// Encodes a parameter value as an RFC 2231 extended value,
/// `charset''<percent-encoded octets>`, for use as `name*=<value>`.
///
/// Attribute characters are kept; every other octet becomes `%XX`.
#[must_use]
pub fn encode_rfc2231(value: &str, charset: &str) -> String {
    let mut encoded = String::with_capacity(charset.len() + 2 + value.len() * 3);
    encoded.push_str(charset);
    encoded.push_str("''");
    for &byte in value.as_bytes() {
        if byte.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&byte) {
            encoded.push(char::from(byte));
        } else {
            let _ = write!(encoded, "%{byte:02X}");
        }
    }
    encoded
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let decoded = decode_base64(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_keeps_nul_bytes() {
        let data = [0x89, b'P', b'N', b'G', 0x00, 0x00, 0x00, 0x0d, 0xff];
        let encoded = encode_base64(&data);
        assert_eq!(encoded.len(), encoded_len(data.len()));
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_has_no_line_breaks() {
        let data = vec![0xAB; 10_000];
        let encoded = encode_base64(&data);
        assert!(!encoded.contains('\n'));
        assert!(!encoded.contains('\r'));
    }

    #[test]
    fn test_encoded_len_rounds_up() {
        assert_eq!(encoded_len(0), 0);
        assert_eq!(encoded_len(1), 4);
        assert_eq!(encoded_len(2), 4);
        assert_eq!(encoded_len(3), 4);
        assert_eq!(encoded_len(4), 8);
        assert_eq!(encoded_len(10), 16);
    }

    #[test]
    fn test_wrap_lines() {
        let lines: Vec<&str> = wrap_lines("abcdefghij", 4).collect();
        assert_eq!(lines, vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_lines("", 76).count(), 0);
    }

    #[test]
    fn test_quoted_printable_plain_ascii() {
        assert_eq!(encode_quoted_printable("Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_quoted_printable_non_ascii() {
        assert_eq!(encode_quoted_printable("Héllo"), "H=C3=A9llo");
    }

    #[test]
    fn test_quoted_printable_equals_sign() {
        assert_eq!(encode_quoted_printable("a=b"), "a=3Db");
    }

    #[test]
    fn test_quoted_printable_line_breaks_become_crlf() {
        assert_eq!(encode_quoted_printable("one\ntwo\r\nthree"), "one\r\ntwo\r\nthree");
        assert_eq!(encode_quoted_printable("end\n"), "end\r\n");
    }

    #[test]
    fn test_quoted_printable_trailing_whitespace() {
        assert_eq!(encode_quoted_printable("trail \nnext"), "trail=20\r\nnext");
        assert_eq!(encode_quoted_printable("tab\t"), "tab=09");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let text = "x".repeat(200);
        let encoded = encode_quoted_printable(&text);
        for line in encoded.split("\r\n") {
            assert!(line.len() <= MAX_LINE_LENGTH, "line too long: {}", line.len());
        }
        assert_eq!(encoded.replace("=\r\n", ""), text);
    }

    #[test]
    fn test_quoted_printable_keeps_escape_together() {
        let text = format!("{}é", "x".repeat(73));
        let encoded = encode_quoted_printable(&text);
        for line in encoded.split("\r\n") {
            assert!(line.len() <= MAX_LINE_LENGTH);
        }
        assert!(encoded.ends_with("=C3=A9"));
    }

    #[test]
    fn test_rfc2047_ascii_untouched() {
        assert_eq!(encode_rfc2047("Hello", "utf-8"), "Hello");
        assert_eq!(encode_rfc2047("Quarterly report", "utf-8"), "Quarterly report");
    }

    #[test]
    fn test_rfc2047_encodes_non_ascii() {
        let encoded = encode_rfc2047("Héllo", "utf-8");
        assert_eq!(encoded, "=?utf-8?B?SMOpbGxv?=");
    }

    #[test]
    fn test_rfc2231_percent_encodes_non_attribute_chars() {
        assert_eq!(encode_rfc2231("résumé.pdf", "utf-8"), "utf-8''r%C3%A9sum%C3%A9.pdf");
        assert_eq!(encode_rfc2231("a b;c.txt", "utf-8"), "utf-8''a%20b%3Bc.txt");
        assert!(encode_rfc2231("日本語.doc", "utf-8").is_ascii());
    }

    #[test]
    fn test_rfc2047_long_value_is_split() {
        let text = "Ünïcödé ".repeat(20);
        let encoded = encode_rfc2047(&text, "utf-8");
        let mut decoded = Vec::new();
        for word in encoded.split("\r\n ") {
            assert!(word.len() <= 75);
            let payload = word
                .strip_prefix("=?utf-8?B?")
                .and_then(|w| w.strip_suffix("?="))
                .unwrap();
            decoded.extend(decode_base64(payload).unwrap());
        }
        assert_eq!(String::from_utf8(decoded).unwrap(), text);
    }

    proptest! {
        #[test]
        fn prop_base64_round_trip(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let encoded = encode_base64(&data);
            prop_assert_eq!(encoded.len(), encoded_len(data.len()));
            prop_assert_eq!(decode_base64(&encoded).unwrap(), data);
        }

        #[test]
        fn prop_wrapped_base64_round_trip(data in proptest::collection::vec(any::<u8>(), 0..1024)) {
            let encoded = encode_base64(&data);
            let joined: String = wrap_lines(&encoded, MAX_LINE_LENGTH).collect();
            prop_assert!(wrap_lines(&encoded, MAX_LINE_LENGTH).all(|l| l.len() <= MAX_LINE_LENGTH));
            prop_assert_eq!(decode_base64(&joined).unwrap(), data);
        }
    }
}
