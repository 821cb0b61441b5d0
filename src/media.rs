//! Picture qualification for candidate media URLs.

use tracing::{debug, warn};
use url::Url;

/// A media URL that qualifies for a picture post, with its IANA media type.
#[derive(Debug, Clone, PartialEq)]
pub struct Picture {
    pub url: String,
    pub media_type: &'static str,
}

/// File extensions accepted for picture posts, per NIP-68.
const IMAGE_TYPES: &[(&str, &str)] = &[
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("avif", "image/avif"),
    ("apng", "image/apng"),
];

/// Scan candidates in order and return the first URL whose path carries a
/// recognized image extension (case-insensitive). `None` means nothing
/// qualified, which is a normal outcome rather than an error; individual
/// unparseable URLs are skipped.
pub fn select_picture(candidates: &[String]) -> Option<Picture> {
    for candidate in candidates {
        if candidate.is_empty() {
            continue;
        }
        let parsed = match Url::parse(candidate) {
            Ok(u) => u,
            Err(e) => {
                warn!(url = %candidate, error = %e, "skipping unparseable media URL");
                continue;
            }
        };
        let Some(ext) = file_extension(parsed.path()) else {
            debug!(url = %candidate, "media URL has no file extension");
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        match IMAGE_TYPES.iter().find(|&&(e, _)| e == ext) {
            Some(&(_, media_type)) => {
                return Some(Picture {
                    url: candidate.clone(),
                    media_type,
                })
            }
            None => debug!(url = %candidate, extension = %ext, "unsupported media extension"),
        }
    }
    None
}

/// Extension of the final path segment, without the dot.
fn file_extension(path: &str) -> Option<&str> {
    let name = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}
