//! File extension to MIME media type resolution.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Media type used when nothing more specific is known.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Known extensions (lowercase, without the dot) and their media types.
const MEDIA_TYPES: &[(&str, &str)] = &[
    // Text and documents
    ("txt", "text/plain"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("csv", "text/csv"),
    ("md", "text/markdown"),
    ("rtf", "application/rtf"),
    // Images
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("tiff", "image/tiff"),
    ("psd", "image/vnd.adobe.photoshop"),
    // Audio
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("ogg", "audio/ogg"),
    ("flac", "audio/flac"),
    ("aac", "audio/aac"),
    ("mid", "audio/midi"),
    ("midi", "audio/midi"),
    ("m4a", "audio/mp4"),
    // Video
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("avi", "video/x-msvideo"),
    ("mov", "video/quicktime"),
    ("wmv", "video/x-ms-wmv"),
    ("flv", "video/x-flv"),
    ("mkv", "video/x-matroska"),
    ("mpeg", "video/mpeg"),
    ("mpg", "video/mpeg"),
    // Archives
    ("zip", "application/zip"),
    ("rar", "application/x-rar-compressed"),
    ("tar", "application/x-tar"),
    ("gz", "application/gzip"),
    ("7z", "application/x-7z-compressed"),
    ("bz2", "application/x-bzip2"),
    // Office documents
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("odp", "application/vnd.oasis.opendocument.presentation"),
    // Source code
    ("c", "text/x-c"),
    ("h", "text/x-c"),
    ("cpp", "text/x-c++src"),
    ("hpp", "text/x-c++hdr"),
    ("java", "text/x-java-source"),
    ("py", "text/x-python"),
    ("sh", "application/x-sh"),
    ("pl", "application/x-perl"),
    ("php", "application/x-php"),
    ("rb", "application/x-ruby"),
    ("go", "text/x-go"),
    ("swift", "text/x-swift"),
    // Executables and packages
    ("exe", "application/x-msdownload"),
    ("dll", "application/x-msdownload"),
    ("so", "application/x-sharedlib"),
    ("deb", "application/x-debian-package"),
    ("rpm", "application/x-rpm"),
    ("apk", "application/vnd.android.package-archive"),
    ("dmg", "application/x-apple-diskimage"),
    // Fonts
    ("ttf", "font/ttf"),
    ("otf", "font/otf"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
];

static TABLE: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| MEDIA_TYPES.iter().copied().collect());

/// Resolves the media type for a file name from its extension.
///
/// Matching is case-insensitive. Names without an extension, or with an
/// extension that is not in the table, resolve to [`OCTET_STREAM`]. The
/// extension is the text after the last `.`, so `.pdf` is a PDF.
///
/// ```
/// use courier_mime::mime_type_for;
///
/// assert_eq!(mime_type_for("report.PDF"), "application/pdf");
/// assert_eq!(mime_type_for("noext"), "application/octet-stream");
/// ```
#[must_use]
pub fn mime_type_for(filename: &str) -> &'static str {
    filename
        .rsplit_once('.')
        .and_then(|(_, ext)| TABLE.get(ext.to_ascii_lowercase().as_str()).copied())
        .unwrap_or(OCTET_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive() {
        assert_eq!(mime_type_for("report.pdf"), "application/pdf");
        assert_eq!(mime_type_for("report.PDF"), "application/pdf");
        assert_eq!(mime_type_for("Photo.JpEg"), "image/jpeg");
    }

    #[test]
    fn test_no_extension() {
        assert_eq!(mime_type_for("noext"), OCTET_STREAM);
        assert_eq!(mime_type_for(""), OCTET_STREAM);
    }

    #[test]
    fn test_unknown_extension() {
        assert_eq!(mime_type_for("data.xyz123"), OCTET_STREAM);
        assert_eq!(mime_type_for("trailing."), OCTET_STREAM);
    }

    #[test]
    fn test_uses_last_extension() {
        assert_eq!(mime_type_for("backup.tar.gz"), "application/gzip");
        assert_eq!(mime_type_for("archive.gz.tar"), "application/x-tar");
    }

    #[test]
    fn test_leading_dot_name() {
        assert_eq!(mime_type_for(".pdf"), "application/pdf");
        assert_eq!(mime_type_for(".bashrc"), OCTET_STREAM);
    }

    #[test]
    fn test_directory_components_ignored() {
        assert_eq!(mime_type_for("some.dir/notes"), OCTET_STREAM);
        assert_eq!(mime_type_for("some.dir/notes.md"), "text/markdown");
    }

    #[test]
    fn test_table_keys_are_lowercase() {
        for (ext, _) in MEDIA_TYPES {
            assert_eq!(*ext, ext.to_ascii_lowercase());
            assert!(!ext.starts_with('.'));
        }
    }
}
