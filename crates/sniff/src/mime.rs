/// MIME type used for anything not in the table.
pub const GENERIC_MIME: &str = "application/octet-stream";

/// Lower-case extension to MIME type. Extensions earlier in the table are
/// preferred when mapping a MIME type back to an extension.
static MIME_TYPES: &[(&str, &str)] = &[
    // Images
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("bmp", "image/bmp"),
    ("png", "image/png"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("tga", "image/x-tga"),
    ("psd", "image/vnd.adobe.photoshop"),
    ("ai", "application/postscript"),
    ("webp", "image/webp"),
    // Video
    ("mp4", "video/mp4"),
    ("m4v", "video/mp4"),
    ("avi", "video/x-msvideo"),
    ("asf", "video/x-ms-asf"),
    ("wmv", "video/x-ms-wmv"),
    ("mkv", "video/x-matroska"),
    ("ts", "video/mp2t"),
    ("mpg", "video/mpeg"),
    ("mpeg", "video/mpeg"),
    ("mov", "video/quicktime"),
    ("flv", "video/x-flv"),
    ("ogv", "video/ogg"),
    // Audio
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("flac", "audio/flac"),
    ("tta", "audio/x-tta"),
    ("tak", "audio/x-tak"),
    ("aac", "audio/aac"),
    ("wma", "audio/x-ms-wma"),
    ("ogg", "audio/ogg"),
    ("m4a", "audio/mp4"),
    // Documents
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("hwp", "application/x-hwp"),
    ("txt", "text/plain"),
    ("rtf", "application/rtf"),
    ("xml", "application/xml"),
    ("pdf", "application/pdf"),
    ("wks", "application/vnd.ms-works"),
    ("xps", "application/vnd.ms-xpsdocument"),
    ("md", "text/markdown"),
    ("odf", "application/vnd.oasis.opendocument.text"),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("ods", "application/vnd.oasis.opendocument.spreadsheet"),
    ("odp", "application/vnd.oasis.opendocument.presentation"),
    ("csv", "text/csv"),
    ("tsv", "text/tab-separated-values"),
    ("xls", "application/vnd.ms-excel"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("ppt", "application/vnd.ms-powerpoint"),
    ("pptx", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
    ("pages", "application/x-iwork-pages-sffpages"),
    ("key", "application/x-iwork-keynote-sffkey"),
    ("numbers", "application/x-iwork-numbers-sffnumbers"),
    ("show", GENERIC_MIME),
    ("ce", GENERIC_MIME),
    // Archives
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("bz2", "application/x-bzip2"),
    ("rar", "application/x-rar-compressed"),
    ("7z", "application/x-7z-compressed"),
    ("lzh", "application/x-lzh"),
    ("alz", "application/x-alz-compressed"),
];

fn lookup(ext: &str) -> Option<&'static (&'static str, &'static str)> {
    let ext = ext.trim_start_matches('.');
    MIME_TYPES.iter().find(|(known, _)| known.eq_ignore_ascii_case(ext))
}

/// MIME type for an extension (case-insensitive, leading dot optional).
///
/// Unknown extensions map to [`GENERIC_MIME`].
#[must_use]
pub fn mime_for(ext: &str) -> &'static str {
    lookup(ext).map_or(GENERIC_MIME, |(_, mime)| mime)
}

/// Whether the extension appears in the MIME table.
#[must_use]
pub fn is_known(ext: &str) -> bool {
    lookup(ext).is_some()
}

/// Canonical form of a known extension (the table's own lower-case spelling).
pub(crate) fn canonical(ext: &str) -> Option<&'static str> {
    lookup(ext).map(|(known, _)| *known)
}

/// Preferred extension for a MIME type, ignoring parameters such as
/// `; charset=utf-8`.
///
/// The generic octet-stream type says nothing about the content, so it never
/// maps to an extension.
#[must_use]
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or_default().trim();
    if essence.is_empty() || essence.eq_ignore_ascii_case(GENERIC_MIME) {
        return None;
    }
    MIME_TYPES.iter().find(|(_, known)| known.eq_ignore_ascii_case(essence)).map(|(ext, _)| *ext)
}
