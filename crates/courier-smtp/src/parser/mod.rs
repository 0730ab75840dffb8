//! SMTP response parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses an SMTP reply from response lines.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// Every line must carry the same three-digit code, with a first digit
/// between 2 and 5.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] if the reply is malformed.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::MalformedReply("Empty reply".into()));
    };

    let code = parse_code(first)?;

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        if parse_code(line)? != code {
            return Err(Error::MalformedReply(format!(
                "Reply code changed mid-reply: {line}"
            )));
        }
        match line.len() {
            3 => message.push(String::new()),
            // Separator byte is ASCII, so index 4 is a char boundary
            n if n >= 4 && matches!(line.as_bytes()[3], b' ' | b'-') => {
                message.push(line[4..].to_string());
            }
            _ => return Err(Error::MalformedReply(format!("Malformed reply line: {line}"))),
        }
    }

    Ok(Reply::new(code, message))
}

fn parse_code(line: &str) -> Result<ReplyCode> {
    let digits = line
        .as_bytes()
        .get(..3)
        .filter(|d| d.iter().all(u8::is_ascii_digit) && (b'2'..=b'5').contains(&d[0]))
        .ok_or_else(|| Error::MalformedReply(format!("Invalid reply code: {line}")))?;

    let code = digits
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
    Ok(ReplyCode::new(code))
}

/// Checks if a line is the last line of a multi-line reply.
///
/// Multi-line replies use `-` separator for continuation and ` ` for the last
/// line. A bare code also ends the reply.
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.len() == 3 || (line.len() >= 4 && line.as_bytes()[3] == b' ')
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
    fn test_parse_single_line_reply() {
        let lines = vec!["250 OK".to_string()];
        let reply = parse_reply(&lines).unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(reply.message, vec!["OK"]);
        assert!(reply.is_success());
    }

    #[test]
    fn test_parse_multi_line_reply() {
        let lines = vec![
            "250-First line".to_string(),
            "250-Second line".to_string(),
            "250 Last line".to_string(),
        ];
        let reply = parse_reply(&lines).unwrap();
        assert_eq!(reply.code.as_u16(), 250);
        assert_eq!(
            reply.message,
            vec!["First line", "Second line", "Last line"]
        );
    }

    #[test]
    fn test_parse_bare_code() {
        let reply = parse_reply(&["354".to_string()]).unwrap();
        assert_eq!(reply.code, ReplyCode::START_DATA);
        assert_eq!(reply.message, vec![String::new()]);
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(!is_last_reply_line("250-Continuing"));
        assert!(is_last_reply_line("250"));
        assert!(!is_last_reply_line("25"));
    }

    #[test]
    fn test_parse_error_empty() {
        assert!(matches!(parse_reply(&[]), Err(Error::MalformedReply(_))));
    }

    #[test]
    fn test_parse_error_too_short() {
        assert!(parse_reply(&["25".to_string()]).is_err());
    }

    #[test]
    fn test_parse_error_invalid_code() {
        assert!(parse_reply(&["ABC OK".to_string()]).is_err());
        assert!(parse_reply(&["650 Out of range".to_string()]).is_err());
        assert!(parse_reply(&["150 Out of range".to_string()]).is_err());
    }

    #[test]
    fn test_parse_error_bad_separator() {
        assert!(parse_reply(&["250xOK".to_string()]).is_err());
    }

    #[test]
    fn test_parse_error_mixed_codes() {
        let lines = vec!["250-First".to_string(), "550 Second".to_string()];
        assert!(matches!(
            parse_reply(&lines),
            Err(Error::MalformedReply(_))
        ));
    }

    #[test]
    fn test_parse_non_ascii_text() {
        let reply = parse_reply(&["250 Grüße".to_string()]).unwrap();
        assert_eq!(reply.message, vec!["Grüße"]);
        assert!(parse_reply(&["2é0 OK".to_string()]).is_err());
    }

    proptest! {
        #[test]
        fn parse_never_panics(line in "\\PC{0,40}") {
            let _ = parse_reply(&[line.clone()]);
            let _ = is_last_reply_line(&line);
        }

        #[test]
        fn parse_accepts_valid_codes(code in 200u16..600, text in "[ -~]{0,30}") {
            let reply = parse_reply(&[format!("{code} {text}")]).unwrap();
            prop_assert_eq!(reply.code.as_u16(), code);
            prop_assert_eq!(&reply.message[0], &text);
        }
    }
}
