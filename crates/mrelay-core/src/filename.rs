//! Filename derivation for relayed media.
//!
//! Builds a safe local filename from the resolver's title plus an extension
//! guessed from the probe's Content-Type (or the direct URL's path),
//! sanitized for Linux filesystems.

use url::Url;

/// Title length cap (characters) before the extension is appended.
const MAX_TITLE_CHARS: usize = 50;

/// Fallback when nothing usable is available.
const DEFAULT_STEM: &str = "media";
const DEFAULT_EXT: &str = ".mp4";

/// Derives a safe filename: sanitized, truncated title + best-guess extension.
///
/// # Examples
///
/// - `derive_media_filename("My Clip", Some("video/mp4"), "https://cdn/x")` → `"My Clip.mp4"`
/// - `derive_media_filename("a/b", None, "https://cdn/v.webm")` → `"a_b.webm"`
pub fn derive_media_filename(
    title: &str,
    content_type: Option<&str>,
    direct_url: &str,
) -> String {
    let stem: String = sanitize_for_linux(title)
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    let stem = if stem.is_empty() || stem == "." || stem == ".." {
        DEFAULT_STEM.to_string()
    } else {
        stem
    };

    let ext = content_type
        .and_then(extension_for_content_type)
        .or_else(|| extension_from_url_path(direct_url))
        .unwrap_or_else(|| DEFAULT_EXT.to_string());

    format!("{stem}{ext}")
}

/// Replaces characters that are unsafe in Linux filenames and trims leading
/// and trailing dots/spaces.
pub fn sanitize_for_linux(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c == '/' || c == '\0' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    cleaned.trim_matches(|c| c == ' ' || c == '.').to_string()
}

/// Known media types; anything unmapped falls through to the URL path.
fn extension_for_content_type(content_type: &str) -> Option<String> {
    let ext = match content_type.trim() {
        "video/mp4" => ".mp4",
        "video/webm" => ".webm",
        "video/x-matroska" => ".mkv",
        "video/quicktime" => ".mov",
        "audio/mpeg" => ".mp3",
        "audio/mp4" => ".m4a",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        _ => return None,
    };
    Some(ext.to_string())
}

/// Extension of the last path segment of `url`, if it has one.
fn extension_from_url_path(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let (_, ext) = segment.rsplit_once('.')?;
    if ext.is_empty() || ext.len() > 5 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(format!(".{}", ext.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_content_type_extension() {
        assert_eq!(
            derive_media_filename("My Clip", Some("video/mp4"), "https://cdn.example.com/raw"),
            "My Clip.mp4"
        );
        assert_eq!(
            derive_media_filename("Song", Some("audio/mpeg"), "https://cdn.example.com/x.bin"),
            "Song.mp3"
        );
    }

    #[test]
    fn falls_back_to_url_path_extension() {
        assert_eq!(
            derive_media_filename("clip", None, "https://cdn.example.com/v/stream.webm"),
            "clip.webm"
        );
        assert_eq!(
            derive_media_filename("clip", Some("application/octet-stream"), "https://cdn.example.com/a.mkv"),
            "clip.mkv"
        );
    }

    #[test]
    fn defaults_to_mp4_when_nothing_known() {
        assert_eq!(
            derive_media_filename("clip", None, "https://cdn.example.com/stream"),
            "clip.mp4"
        );
    }

    #[test]
    fn sanitizes_and_truncates_title() {
        assert_eq!(
            derive_media_filename("a/b\0c", None, "https://cdn.example.com/x.mp4"),
            "a_b_c.mp4"
        );
        let long = "x".repeat(80);
        let name = derive_media_filename(&long, Some("video/mp4"), "https://e.com/");
        assert_eq!(name.len(), MAX_TITLE_CHARS + 4);
    }

    #[test]
    fn empty_or_reserved_title_falls_back() {
        assert_eq!(
            derive_media_filename("", Some("video/mp4"), "https://e.com/"),
            "media.mp4"
        );
        assert_eq!(
            derive_media_filename("..", Some("video/mp4"), "https://e.com/"),
            "media.mp4"
        );
    }

    #[test]
    fn rejects_implausible_url_extensions() {
        assert_eq!(extension_from_url_path("https://e.com/file.reallylong"), None);
        assert_eq!(extension_from_url_path("https://e.com/file."), None);
        assert_eq!(
            extension_from_url_path("https://e.com/dir/file.MP4"),
            Some(".mp4".to_string())
        );
    }
}
