//! SASL message encoding for the LOGIN and XOAUTH2 mechanisms.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

/// Encodes one LOGIN response line (username or password).
#[must_use]
pub fn login_response(value: &str) -> String {
    STANDARD.encode(value.as_bytes())
}

/// Generates XOAUTH2 initial response (Google/Microsoft proprietary).
///
/// Format: `user=<user>\x01auth=Bearer <token>\x01\x01`
///
/// # Example
///
/// ```
/// use courier_smtp::sasl::xoauth2_response;
///
/// let response = xoauth2_response("user@example.com", "ya29.a0...");
/// assert!(!response.contains("user@example.com"));
/// ```
#[must_use]
pub fn xoauth2_response(user: &str, token: &str) -> String {
    let auth_string = format!("user={user}\x01auth=Bearer {token}\x01\x01");
    STANDARD.encode(auth_string.as_bytes())
}

/// Decodes the text of a 334 challenge.
///
/// Challenges are base64; text that does not decode is returned as is.
#[must_use]
pub fn decode_challenge(text: &str) -> String {
    STANDARD.decode(text.trim()).map_or_else(
        |_| text.to_string(),
        |bytes| String::from_utf8_lossy(&bytes).into_owned(),
    )
}

/// Parses an `OAuth2` error response from the server.
///
/// `OAuth2` errors are JSON-encoded: `{"status":"401", "schemes":"bearer", "scope":"..."}`
///
/// # Errors
///
/// Returns an error if the response cannot be parsed.
pub fn parse_oauth_error(response: &str) -> Result<OAuthError, serde_json::Error> {
    serde_json::from_str(response)
}

/// `OAuth2` error response from server.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthError {
    /// HTTP status code.
    pub status: String,
    /// Authentication schemes supported.
    #[serde(default)]
    pub schemes: Option<String>,
    /// `OAuth2` scope required.
    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Display for OAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "status {}", self.status)?;
        if let Some(scope) = &self.scope {
            write!(f, ", scope {scope}")?;
        }
        Ok(())
    }
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

    #[test]
    fn test_login_response() {
        assert_eq!(login_response("user@example.com"), "dXNlckBleGFtcGxlLmNvbQ==");
        assert_eq!(login_response("pässword"), STANDARD.encode("pässword"));
    }

    #[test]
    fn test_xoauth2_format() {
        let response = xoauth2_response("test@test.com", "abc");
        let decoded = STANDARD.decode(&response).unwrap();
        let decoded_str = String::from_utf8(decoded).unwrap();

        assert_eq!(decoded_str, "user=test@test.com\x01auth=Bearer abc\x01\x01");
    }

    #[test]
    fn test_xoauth2_is_single_line() {
        let response = xoauth2_response("user@example.com", &"t".repeat(2000));
        assert!(!response.contains('\n'));
        assert!(!response.contains("user@example.com"));
    }

    #[test]
    fn test_decode_challenge() {
        assert_eq!(decode_challenge("VXNlcm5hbWU6"), "Username:");
        assert_eq!(decode_challenge("not base64!"), "not base64!");
    }

    #[test]
    fn test_parse_oauth_error() {
        let json = r#"{"status":"401","schemes":"bearer","scope":"https://mail.google.com/"}"#;
        let error = parse_oauth_error(json).unwrap();

        assert_eq!(error.status, "401");
        assert_eq!(error.schemes.as_deref(), Some("bearer"));
        assert_eq!(error.scope.as_deref(), Some("https://mail.google.com/"));
        assert_eq!(
            error.to_string(),
            "status 401, scope https://mail.google.com/"
        );
    }

    #[test]
    fn test_parse_oauth_error_minimal() {
        let error = parse_oauth_error(r#"{"status":"400"}"#).unwrap();
        assert_eq!(error.to_string(), "status 400");
        assert!(parse_oauth_error("nope").is_err());
    }
}
