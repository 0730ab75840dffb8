//! MIME content type handling.

use crate::encoding::encode_rfc2047;
use crate::media_type::mime_type_for;
use std::fmt;

/// MIME content type with parameters.
///
/// Parameters keep their insertion order so generated headers are stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Main type (e.g., "text", "image", "multipart").
    pub main_type: String,
    /// Subtype (e.g., "plain", "html", "jpeg").
    pub sub_type: String,
    /// Parameters (e.g., charset=utf-8, boundary=xxx).
    pub parameters: Vec<(String, String)>,
}

impl ContentType {
    /// Creates a new content type.
    #[must_use]
    pub fn new(main_type: impl Into<String>, sub_type: impl Into<String>) -> Self {
        Self {
            main_type: main_type.into(),
            sub_type: sub_type.into(),
            parameters: Vec::new(),
        }
    }

    /// Creates a text/plain content type.
    #[must_use]
    pub fn text_plain() -> Self {
        Self::new("text", "plain").with_parameter("charset", "utf-8")
    }

    /// Creates a text/html content type.
    #[must_use]
    pub fn text_html() -> Self {
        Self::new("text", "html").with_parameter("charset", "utf-8")
    }

    /// Creates a multipart/mixed content type with boundary.
    #[must_use]
    pub fn multipart_mixed(boundary: impl Into<String>) -> Self {
        Self::new("multipart", "mixed").with_parameter("boundary", boundary)
    }

    /// Creates the content type of an attachment from its file name.
    ///
    /// The media type comes from [`mime_type_for`]; the file name is carried
    /// in the `name` parameter, as an RFC 2047 encoded-word when it is not
    /// ASCII.
    #[must_use]
    pub fn for_attachment(filename: &str) -> Self {
        let essence = mime_type_for(filename);
        let (main_type, sub_type) = essence
            .split_once('/')
            .unwrap_or(("application", "octet-stream"));
        let name = if filename.is_ascii() {
            filename.to_string()
        } else {
            encode_rfc2047(filename, "utf-8")
        };
        Self::new(main_type, sub_type).with_parameter("name", name)
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push((key.into(), value.into()));
        self
    }

    /// Returns a parameter value if present.
    #[must_use]
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Returns the boundary parameter if present.
    #[must_use]
    pub fn boundary(&self) -> Option<&str> {
        self.parameter("boundary")
    }

    /// Returns `type/subtype` without parameters.
    #[must_use]
    pub fn essence(&self) -> String {
        format!("{}/{}", self.main_type, self.sub_type)
    }

    /// Checks if this is a multipart content type.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.main_type.eq_ignore_ascii_case("multipart")
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let main = &self.main_type;
        let sub = &self.sub_type;
        write!(f, "{main}/{sub}")?;

        for (key, value) in &self.parameters {
            write!(f, "; {key}=")?;
            let always_quote = matches!(key.as_str(), "name" | "filename" | "boundary");
            write_parameter_value(f, value, always_quote)?;
        }

        Ok(())
    }
}

/// Writes a parameter value, quoting it when asked to or when it is not a
/// plain token.
fn write_parameter_value(
    f: &mut fmt::Formatter<'_>,
    value: &str,
    always_quote: bool,
) -> fmt::Result {
    let is_token = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_graphic() && !"()<>@,;:\\\"/[]?=".contains(c));
    if is_token && !always_quote {
        f.write_str(value)
    } else {
        f.write_str(&quote(value))
    }
}

/// Returns `value` as a quoted string, escaping `"` and `\`.
pub(crate) fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_new() {
        let ct = ContentType::new("text", "plain");
        assert_eq!(ct.main_type, "text");
        assert_eq!(ct.sub_type, "plain");
        assert!(ct.parameters.is_empty());
    }

    #[test]
    fn test_text_plain() {
        let ct = ContentType::text_plain();
        assert_eq!(ct.essence(), "text/plain");
        assert_eq!(ct.parameter("charset"), Some("utf-8"));
        assert_eq!(ct.to_string(), "text/plain; charset=utf-8");
    }

    #[test]
    fn test_text_html() {
        assert_eq!(ContentType::text_html().to_string(), "text/html; charset=utf-8");
    }

    #[test]
    fn test_multipart_mixed() {
        let ct = ContentType::multipart_mixed("boundary123");
        assert_eq!(ct.main_type, "multipart");
        assert_eq!(ct.sub_type, "mixed");
        assert_eq!(ct.boundary(), Some("boundary123"));
        assert!(ct.is_multipart());
        assert_eq!(ct.to_string(), "multipart/mixed; boundary=\"boundary123\"");
    }

    #[test]
    fn test_attachment_content_type() {
        let ct = ContentType::for_attachment("Report.PDF");
        assert_eq!(ct.essence(), "application/pdf");
        assert_eq!(ct.to_string(), "application/pdf; name=\"Report.PDF\"");
    }

    #[test]
    fn test_attachment_non_ascii_name() {
        let ct = ContentType::for_attachment("résumé.pdf");
        assert_eq!(ct.essence(), "application/pdf");
        assert_eq!(ct.parameter("name"), Some("=?utf-8?B?csOpc3Vtw6kucGRm?="));
        assert!(ct.to_string().is_ascii());
    }

    #[test]
    fn test_attachment_unknown_extension() {
        let ct = ContentType::for_attachment("blob");
        assert_eq!(ct.essence(), "application/octet-stream");
    }

    #[test]
    fn test_display_quotes_specials() {
        let ct = ContentType::new("text", "plain")
            .with_parameter("name", "my file \"v2\".txt")
            .with_parameter("format", "flowed");
        assert_eq!(
            ct.to_string(),
            "text/plain; name=\"my file \\\"v2\\\".txt\"; format=flowed"
        );
    }

    #[test]
    fn test_parameters_keep_order() {
        let ct = ContentType::new("a", "b")
            .with_parameter("z", "1")
            .with_parameter("a", "2");
        assert_eq!(ct.to_string(), "a/b; z=1; a=2");
    }
}
