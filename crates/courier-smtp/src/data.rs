//! Message body transparency for the DATA phase.
//!
//! A line of the body that starts with `.` gets a second `.` in front of it
//! so the server cannot mistake it for the end-of-data marker. The stuffer
//! remembers whether the previous chunk ended a line, so a body can be sent
//! in pieces of any size.

/// Maximum number of body bytes written per chunk.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// End-of-data marker sent after the body.
pub const END_OF_DATA: &[u8] = b".\r\n";

/// Incremental dot-stuffer.
#[derive(Debug, Clone, Copy)]
pub struct DotStuffer {
    at_line_start: bool,
}

impl Default for DotStuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DotStuffer {
    /// Creates a stuffer positioned at the start of the body.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            at_line_start: true,
        }
    }

    /// Appends the stuffed form of `input` to `out`.
    pub fn stuff(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len());
        for &byte in input {
            if self.at_line_start && byte == b'.' {
                out.push(b'.');
            }
            out.push(byte);
            self.at_line_start = byte == b'\n';
        }
    }

    /// Appends the terminator to `out`.
    ///
    /// A CRLF is added first if the body did not end with one.
    pub fn finish(self, out: &mut Vec<u8>) {
        if !self.at_line_start {
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(END_OF_DATA);
    }
}

/// Dot-stuffs a complete body, without the terminator.
#[must_use]
pub fn dot_stuff(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    DotStuffer::new().stuff(input, &mut out);
    out
}

/// Reverses [`dot_stuff`], as a receiving server does.
#[must_use]
pub fn dot_unstuff(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut at_line_start = true;
    for &byte in input {
        // Only the first dot of a stuffed line is dropped
        let skip = at_line_start && byte == b'.';
        at_line_start = byte == b'\n';
        if !skip {
            out.push(byte);
        }
    }
    out
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

    fn stuff_all(input: &[u8]) -> Vec<u8> {
        let mut stuffer = DotStuffer::new();
        let mut out = Vec::new();
        stuffer.stuff(input, &mut out);
        stuffer.finish(&mut out);
        out
    }

    #[test]
    fn test_leading_dot_is_doubled() {
        assert_eq!(dot_stuff(b".hidden\r\n"), b"..hidden\r\n");
        assert_eq!(
            dot_stuff(b"line\r\n.\r\n..x\r\n"),
            b"line\r\n..\r\n...x\r\n"
        );
    }

    #[test]
    fn test_inner_dots_untouched() {
        assert_eq!(dot_stuff(b"a.b\r\nc. d.\r\n"), b"a.b\r\nc. d.\r\n");
    }

    #[test]
    fn test_terminator() {
        assert_eq!(stuff_all(b"Hello\r\n"), b"Hello\r\n.\r\n");
        assert_eq!(stuff_all(b"Hello"), b"Hello\r\n.\r\n");
        assert_eq!(stuff_all(b""), b".\r\n");
    }

    #[test]
    fn test_state_carries_across_chunks() {
        let mut stuffer = DotStuffer::new();
        let mut out = Vec::new();
        stuffer.stuff(b"first\r\n", &mut out);
        stuffer.stuff(b".second", &mut out);
        stuffer.stuff(b"\r", &mut out);
        stuffer.stuff(b"\n", &mut out);
        stuffer.stuff(b".", &mut out);
        stuffer.finish(&mut out);
        assert_eq!(out, b"first\r\n..second\r\n..\r\n.\r\n");
    }

    #[test]
    fn test_unstuff() {
        assert_eq!(dot_unstuff(b"..x\r\n...\r\n"), b".x\r\n..\r\n");
    }

    proptest! {
        #[test]
        fn unstuff_reverses_stuff(lines in prop::collection::vec("[.a-z ]{0,12}", 0..12)) {
            let body = lines.join("\r\n");
            prop_assert_eq!(dot_unstuff(&dot_stuff(body.as_bytes())), body.as_bytes());
        }

        #[test]
        fn chunking_does_not_change_output(
            body in "[.a-z\r\n]{0,200}",
            split in 1usize..64,
        ) {
            let mut stuffer = DotStuffer::new();
            let mut chunked = Vec::new();
            for chunk in body.as_bytes().chunks(split) {
                stuffer.stuff(chunk, &mut chunked);
            }
            prop_assert_eq!(chunked, dot_stuff(body.as_bytes()));
        }

        #[test]
        fn no_line_is_a_lone_dot(lines in prop::collection::vec("[.a-z]{0,6}", 0..10)) {
            let body = lines.join("\r\n");
            let stuffed = dot_stuff(body.as_bytes());
            let text = String::from_utf8(stuffed).unwrap();
            prop_assert!(text.split("\r\n").all(|line| line != "."));
        }
    }
}
