//! RFC 5322 / MIME message composition.
//!
//! A [`Composer`] turns a [`MailMessage`] into a [`ComposedMessage`]: an
//! ordered list of text fragments (header block, text part, one fragment per
//! encoded attachment, closing boundary). Every line ends in CRLF and is at
//! most 76 characters long outside the header block.
//!
//! SMTP transparency (doubling a leading `.`) and the terminating `.` line are
//! transport concerns and are not applied here.

use crate::content_type::{ContentType, quote};
use crate::encoding::{
    MAX_LINE_LENGTH, encode_base64, encode_quoted_printable, encode_rfc2047, encode_rfc2231,
    encoded_len, wrap_lines,
};
use crate::error::{Error, Result};
use crate::message::{Attachment, MailMessage};
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::fmt;
use std::fmt::Write as _;

/// RFC 5322 date format, always rendered in UTC.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S +0000";

/// Maximum boundary length (RFC 2046).
const MAX_BOUNDARY_LENGTH: usize = 70;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit text.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
        }
    }
}

/// Formats a timestamp as an RFC 5322 `Date` header value.
#[must_use]
pub fn format_date(date: DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Builds the top-level header block, terminated by an empty line.
///
/// # Errors
///
/// Returns [`Error::InvalidHeader`] if any value contains CR or LF.
pub fn compose_headers(
    date: DateTime<Utc>,
    from: &str,
    to: &str,
    subject: &str,
    content_type: &ContentType,
) -> Result<String> {
    header_block(date, from, to, subject, content_type, None)
}

fn header_block(
    date: DateTime<Utc>,
    from: &str,
    to: &str,
    subject: &str,
    content_type: &ContentType,
    encoding: Option<TransferEncoding>,
) -> Result<String> {
    check_header("From", from)?;
    check_header("To", to)?;
    check_header("Subject", subject)?;

    let mut block = String::new();
    let _ = write!(block, "Date: {}\r\n", format_date(date));
    let _ = write!(block, "From: <{from}>\r\n");
    let _ = write!(block, "To: <{to}>\r\n");
    let _ = write!(block, "Subject: {}\r\n", encode_rfc2047(subject, "utf-8"));
    block.push_str("MIME-Version: 1.0\r\n");
    let _ = write!(block, "Content-Type: {content_type}\r\n");
    if let Some(encoding) = encoding {
        let _ = write!(block, "Content-Transfer-Encoding: {encoding}\r\n");
    }
    block.push_str("\r\n");
    Ok(block)
}

fn check_header(name: &'static str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(Error::invalid_header(name, "value contains a line break"));
    }
    Ok(())
}

fn check_boundary(boundary: &str) -> Result<()> {
    let valid_chars = boundary
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c));
    if boundary.is_empty()
        || boundary.len() > MAX_BOUNDARY_LENGTH
        || !valid_chars
        || boundary.ends_with(' ')
    {
        return Err(Error::InvalidBoundary(boundary.to_string()));
    }
    Ok(())
}

/// Generates a fresh multipart boundary.
///
/// The `=_` prefix cannot occur in quoted-printable or Base64 output, so the
/// boundary never collides with encoded part content.
#[must_use]
pub fn generate_boundary() -> String {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(24)
        .map(char::from)
        .collect();
    format!("=_courier_{token}")
}

/// A composed message, ready for the DATA phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedMessage {
    fragments: Vec<String>,
}

impl ComposedMessage {
    fn push(&mut self, fragment: String) {
        self.fragments.push(fragment);
    }

    /// Returns the fragments in transmission order.
    pub fn fragments(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().map(String::as_str)
    }

    /// Returns the number of fragments.
    #[must_use]
    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Returns the total size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.iter().map(String::len).sum()
    }

    /// Returns true if nothing was composed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Concatenates all fragments.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.len());
        for fragment in &self.fragments {
            bytes.extend_from_slice(fragment.as_bytes());
        }
        bytes
    }
}

/// Builds MIME messages on behalf of one sender.
///
/// # Example
///
/// ```
/// use courier_mime::{Attachment, Composer, MailMessage};
///
/// let message = MailMessage::new("bob@example.com", "Report", "See attached.")
///     .attach(Attachment::from_bytes("report.csv", b"a,b\n1,2\n".to_vec()));
///
/// let composed = Composer::new("alice@example.com").compose(&message)?;
/// assert!(composed.to_bytes().starts_with(b"Date: "));
/// # Ok::<(), courier_mime::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Composer {
    from: String,
    date: Option<DateTime<Utc>>,
    boundary: Option<String>,
}

impl Composer {
    /// Creates a composer for messages sent by `from`.
    #[must_use]
    pub fn new(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            date: None,
            boundary: None,
        }
    }

    /// Fixes the `Date` header instead of using the current time.
    #[must_use]
    pub const fn date(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Fixes the multipart boundary instead of generating one.
    #[must_use]
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Composes `message`.
    ///
    /// Attachments are read fully into memory, Base64 encoded and emitted in
    /// insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if a header value is invalid, the boundary is invalid,
    /// or an attachment cannot be read.
    pub fn compose(&self, message: &MailMessage) -> Result<ComposedMessage> {
        let date = self.date.unwrap_or_else(Utc::now);
        let text_type = if message.is_html {
            ContentType::text_html()
        } else {
            ContentType::text_plain()
        };
        let body = encode_quoted_printable(&message.body);

        let mut composed = ComposedMessage::default();

        if !message.is_multipart() {
            composed.push(header_block(
                date,
                &self.from,
                &message.to,
                &message.subject,
                &text_type,
                Some(TransferEncoding::QuotedPrintable),
            )?);
            composed.push(terminate_line(body));
            return Ok(composed);
        }

        let boundary = self.boundary.clone().unwrap_or_else(generate_boundary);
        check_boundary(&boundary)?;

        composed.push(compose_headers(
            date,
            &self.from,
            &message.to,
            &message.subject,
            &ContentType::multipart_mixed(boundary.as_str()),
        )?);

        let mut text_part = part_header(&boundary, &text_type, TransferEncoding::QuotedPrintable);
        text_part.push_str(&terminate_line(body));
        composed.push(text_part);

        for attachment in &message.attachments {
            composed.push(attachment_part(&boundary, attachment)?);
        }

        composed.push(format!("--{boundary}--\r\n"));
        Ok(composed)
    }
}

fn part_header(boundary: &str, content_type: &ContentType, encoding: TransferEncoding) -> String {
    format!(
        "--{boundary}\r\nContent-Type: {content_type}\r\nContent-Transfer-Encoding: {encoding}\r\n"
    )
}

fn attachment_part(boundary: &str, attachment: &Attachment) -> Result<String> {
    let filename = attachment.filename();
    check_header("Content-Disposition", filename)?;

    let content = attachment.load()?;
    let encoded = encode_base64(&content);
    debug_assert_eq!(encoded.len(), encoded_len(content.len()));

    let mut part = part_header(
        boundary,
        &ContentType::for_attachment(filename),
        TransferEncoding::Base64,
    );
    let line_count = encoded.len().div_ceil(MAX_LINE_LENGTH);
    part.reserve(encoded.len() + line_count * 2 + 64);
    if filename.is_ascii() {
        let _ = write!(
            part,
            "Content-Disposition: attachment; filename={}\r\n\r\n",
            quote(filename)
        );
    } else {
        let _ = write!(
            part,
            "Content-Disposition: attachment;\r\n filename*={}\r\n\r\n",
            encode_rfc2231(filename, "utf-8")
        );
    }
    for line in wrap_lines(&encoded, MAX_LINE_LENGTH) {
        part.push_str(line);
        part.push_str("\r\n");
    }
    Ok(part)
}

/// Ensures a body ends with CRLF.
fn terminate_line(mut text: String) -> String {
    if !text.ends_with("\r\n") {
        text.push_str("\r\n");
    }
    text
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
    use crate::encoding::decode_base64;
    use chrono::TimeZone;

    const BOUNDARY: &str = "=_test_boundary";

    fn fixed_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    fn composer() -> Composer {
        Composer::new("alice@example.com")
            .date(fixed_date())
            .boundary(BOUNDARY)
    }

    fn compose_text(message: &MailMessage) -> String {
        String::from_utf8(composer().compose(message).unwrap().to_bytes()).unwrap()
    }

    /// Splits a multipart body on its delimiter lines, dropping the header
    /// block and the closing delimiter.
    fn parts(text: &str) -> Vec<&str> {
        let delimiter = format!("--{BOUNDARY}\r\n");
        let closing = format!("--{BOUNDARY}--\r\n");
        let body = text.strip_suffix(closing.as_str()).unwrap();
        body.split(delimiter.as_str()).skip(1).collect()
    }

    fn decode_part_body(part: &str) -> Vec<u8> {
        let (_, body) = part.split_once("\r\n\r\n").unwrap();
        decode_base64(&body.replace("\r\n", "")).unwrap()
    }

    #[test]
    fn test_date_format() {
        assert_eq!(format_date(fixed_date()), "Tue, 01 Jan 2030 00:00:00 +0000");
    }

    #[test]
    fn test_compose_headers() {
        let headers = compose_headers(
            fixed_date(),
            "alice@example.com",
            "bob@example.com",
            "Hello",
            &ContentType::text_plain(),
        )
        .unwrap();

        assert_eq!(
            headers,
            "Date: Tue, 01 Jan 2030 00:00:00 +0000\r\n\
             From: <alice@example.com>\r\n\
             To: <bob@example.com>\r\n\
             Subject: Hello\r\n\
             MIME-Version: 1.0\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_compose_headers_rejects_injection() {
        let err = compose_headers(
            fixed_date(),
            "alice@example.com",
            "bob@example.com",
            "Hi\r\nBcc: eve@example.com",
            &ContentType::text_plain(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidHeader { name: "Subject", .. }));
    }

    #[test]
    fn test_non_ascii_subject_is_encoded() {
        let message = MailMessage::new("bob@example.com", "Grüße", "Hallo");
        let text = compose_text(&message);
        assert!(text.contains("Subject: =?utf-8?B?R3LDvMOfZQ==?=\r\n"));
    }

    #[test]
    fn test_single_part_plain() {
        let message = MailMessage::new("bob@example.com", "Hello", "Line one\nLine two");
        let text = compose_text(&message);

        assert!(text.contains("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(text.contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        assert!(!text.contains("multipart"));
        assert!(!text.contains(BOUNDARY));
        assert!(text.ends_with("\r\n\r\nLine one\r\nLine two\r\n"));
        assert_eq!(text.matches("Content-Type:").count(), 1);
    }

    #[test]
    fn test_single_part_html() {
        let message = MailMessage::new("bob@example.com", "Hello", "<p>Hi</p>").html(true);
        let text = compose_text(&message);
        assert!(text.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(!text.contains("multipart"));
        assert!(text.ends_with("<p>Hi</p>\r\n"));
    }

    #[test]
    fn test_single_part_fragments() {
        let message = MailMessage::new("bob@example.com", "Hello", "Body");
        let composed = composer().compose(&message).unwrap();
        assert_eq!(composed.fragment_count(), 2);
        assert_eq!(composed.len(), composed.to_bytes().len());
        assert!(!composed.is_empty());
    }

    #[test]
    fn test_multipart_two_attachments_in_order() {
        let pdf = vec![0x25, 0x50, 0x44, 0x46, 0x00, 0x01, 0x02];
        let png = vec![0x89, 0x50, 0x4e, 0x47, 0x00, 0x00, 0xff];
        let message = MailMessage::new("bob@example.com", "Files", "See attached.")
            .attach(Attachment::from_bytes("report.PDF", pdf.clone()))
            .attach(Attachment::from_bytes("chart.png", png.clone()));

        let text = compose_text(&message);
        assert!(text.contains("Content-Type: multipart/mixed; boundary=\"=_test_boundary\"\r\n"));

        let parts = parts(&text);
        assert_eq!(parts.len(), 3);

        assert!(parts[0].starts_with("Content-Type: text/plain; charset=utf-8\r\n"));
        assert!(parts[0].contains("Content-Transfer-Encoding: quoted-printable\r\n"));
        assert!(parts[0].contains("See attached.\r\n"));

        assert!(parts[1].contains("Content-Type: application/pdf; name=\"report.PDF\"\r\n"));
        assert!(parts[1].contains("Content-Disposition: attachment; filename=\"report.PDF\"\r\n"));
        assert!(parts[1].contains("Content-Transfer-Encoding: base64\r\n"));
        assert_eq!(decode_part_body(parts[1]), pdf);

        assert!(parts[2].contains("Content-Type: image/png; name=\"chart.png\"\r\n"));
        assert!(parts[2].contains("Content-Disposition: attachment; filename=\"chart.png\"\r\n"));
        assert_eq!(decode_part_body(parts[2]), png);

        assert_eq!(text.matches("Content-Disposition: attachment").count(), 2);
        assert!(text.ends_with("--=_test_boundary--\r\n"));
    }

    #[test]
    fn test_non_ascii_attachment_name_keeps_message_ascii() {
        let message = MailMessage::new("bob@example.com", "CV", "Attached.")
            .attach(Attachment::from_bytes("résumé.pdf", b"%PDF".to_vec()));
        let composed = composer().compose(&message).unwrap();
        assert!(composed.to_bytes().is_ascii());

        let text = compose_text(&message);
        let part = parts(&text)[1];
        assert!(part.contains(
            "Content-Type: application/pdf; name=\"=?utf-8?B?csOpc3Vtw6kucGRm?=\"\r\n"
        ));
        assert!(part.contains(
            "Content-Disposition: attachment;\r\n filename*=utf-8''r%C3%A9sum%C3%A9.pdf\r\n"
        ));
        assert_eq!(decode_part_body(part), b"%PDF");
    }

    #[test]
    fn test_multipart_html_body() {
        let message = MailMessage::new("bob@example.com", "Files", "<b>Hi</b>")
            .html(true)
            .attach(Attachment::from_bytes("a.txt", b"abc".to_vec()));
        let text = compose_text(&message);
        assert!(parts(&text)[0].starts_with("Content-Type: text/html; charset=utf-8\r\n"));
    }

    #[test]
    fn test_attachment_lines_are_wrapped() {
        let content: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        let message = MailMessage::new("bob@example.com", "Big", "x")
            .attach(Attachment::from_bytes("blob.bin", content.clone()));

        let text = compose_text(&message);
        for line in text.split("\r\n") {
            assert!(line.len() <= MAX_LINE_LENGTH, "line too long: {}", line.len());
        }
        let part = parts(&text)[1];
        assert!(part.contains("Content-Type: application/octet-stream; name=\"blob.bin\"\r\n"));
        assert_eq!(decode_part_body(part), content);
    }

    #[test]
    fn test_empty_attachment() {
        let message = MailMessage::new("bob@example.com", "Empty", "x")
            .attach(Attachment::from_bytes("empty.txt", Vec::new()));
        let text = compose_text(&message);
        let part = parts(&text)[1];
        assert!(part.ends_with("Content-Transfer-Encoding: base64\r\nContent-Disposition: attachment; filename=\"empty.txt\"\r\n\r\n"));
    }

    #[test]
    fn test_missing_attachment_file() {
        let message = MailMessage::new("bob@example.com", "Files", "x")
            .attach(Attachment::from_path("gone.pdf", "/nonexistent/courier/gone.pdf"));
        let err = composer().compose(&message).unwrap_err();
        assert!(matches!(err, Error::AttachmentRead { .. }));
    }

    #[test]
    fn test_invalid_boundary() {
        let message = MailMessage::new("bob@example.com", "Files", "x")
            .attach(Attachment::from_bytes("a.txt", b"a".to_vec()));
        let err = Composer::new("alice@example.com")
            .boundary("bad\"boundary")
            .compose(&message)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBoundary(_)));

        let err = Composer::new("alice@example.com")
            .boundary("x".repeat(71))
            .compose(&message)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBoundary(_)));
    }

    #[test]
    fn test_generated_boundary_is_valid_and_unique() {
        let first = generate_boundary();
        let second = generate_boundary();
        assert!(check_boundary(&first).is_ok());
        assert_ne!(first, second);
        assert!(first.starts_with("=_"));
    }

    #[test]
    fn test_body_starting_with_dot_is_left_for_transport() {
        let message = MailMessage::new("bob@example.com", "Dots", ".\n.hidden");
        let text = compose_text(&message);
        assert!(text.ends_with("\r\n\r\n.\r\n.hidden\r\n"));
    }
}
