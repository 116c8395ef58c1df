use url::Url;

use crate::mime::canonical;

/// The known extension following the last `.` in `segment`, if any.
fn known_suffix(segment: &str) -> Option<&'static str> {
    let (_, ext) = segment.rsplit_once('.')?;
    canonical(ext)
}

/// Guess an extension from a path or URL without touching the network.
///
/// Tries, in order:
///
/// 1. the URL path component (`https://x/a/photo.png?w=1` → `png`);
/// 2. any query parameter value (`https://x/get?file=clip.mp4` → `mp4`);
/// 3. the raw string with query and fragment removed, as long as the dot comes
///    after the last path separator (`/sdcard/a.b/c` yields nothing).
///
/// Only extensions present in the MIME table are trusted, so a server-side
/// script name like `download.php` does not count as an answer.
#[must_use]
pub fn extension_from_path(reference: &str) -> Option<&'static str> {
    if let Ok(url) = Url::parse(reference) {
        if let Some(ext) = known_suffix(url.path()) {
            return Some(ext);
        }
        if let Some(ext) = url.query_pairs().find_map(|(_, value)| known_suffix(&value)) {
            return Some(ext);
        }
    }

    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    let stripped = &reference[..end];
    let dot = stripped.rfind('.')?;
    let separator = stripped.rfind(['/', '\\']);
    if separator.is_some_and(|separator| separator > dot) {
        return None;
    }
    canonical(&stripped[dot + 1..])
}
