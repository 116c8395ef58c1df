use std::sync::LazyLock;

/// A magic-byte signature for one file format (or family of formats sharing
/// the same header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    /// Extension aliases; the first one is what detection reports.
    pub extensions: &'static [&'static str],
    /// Bytes expected at [`offset`](Self::offset).
    pub magic: &'static [u8],
    pub offset: usize,
    /// Second pattern that must also match, for container formats that share
    /// a generic header (RIFF being the obvious offender).
    pub secondary: Option<(usize, &'static [u8])>,
}
impl Signature {
    const fn new(extensions: &'static [&'static str], magic: &'static [u8]) -> Self {
        Self { extensions, magic, offset: 0, secondary: None }
    }

    const fn at(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    const fn and(mut self, offset: usize, magic: &'static [u8]) -> Self {
        self.secondary = Some((offset, magic));
        self
    }

    /// Extension reported when this signature matches.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        self.extensions[0]
    }

    /// Check both the primary and (if declared) the secondary pattern.
    ///
    /// Buffers too short to contain a pattern never match.
    #[must_use]
    pub fn matches(&self, bytes: &[u8]) -> bool {
        let window = |offset: usize, magic: &[u8]| bytes.get(offset..offset + magic.len()) == Some(magic);
        window(self.offset, self.magic) && self.secondary.is_none_or(|(offset, magic)| window(offset, magic))
    }
}

/// Known signatures, in priority order: the first match wins.
///
/// Order matters where patterns overlap. GIF (`47 49 46 38`) has to be tried
/// before the single-byte MPEG-TS sync byte (`47`), JPEG (`FF D8 FF`) before
/// the MP3 and AAC frame syncs, and so on.
pub static SIGNATURES: &[Signature] = &[
    Signature::new(&["jpg", "jpeg"], &[0xFF, 0xD8, 0xFF]),
    Signature::new(&["png"], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
    Signature::new(&["gif"], &[0x47, 0x49, 0x46, 0x38]),
    Signature::new(&["webp"], &[0x57, 0x45, 0x42, 0x50]).at(8),
    Signature::new(&["bmp"], &[0x42, 0x4D]),
    Signature::new(&["tif", "tiff"], &[0x49, 0x49, 0x2A, 0x00]),
    Signature::new(&["tif", "tiff"], &[0x4D, 0x4D, 0x00, 0x2A]),
    Signature::new(&["psd"], &[0x38, 0x42, 0x50, 0x53]),
    Signature::new(&["ai"], &[0x25, 0x21]),
    Signature::new(&["pdf"], &[0x25, 0x50, 0x44, 0x46]),
    Signature::new(&["hwp"], b"HWP Document File"),
    Signature::new(&["doc", "xls", "ppt"], &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]),
    Signature::new(&["rtf"], b"{\\rtf1"),
    Signature::new(
        &["zip", "docx", "xlsx", "pptx", "odt", "pages", "key", "numbers"],
        &[0x50, 0x4B, 0x03, 0x04],
    ),
    Signature::new(&["rar"], &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07]),
    Signature::new(&["7z"], &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]),
    Signature::new(&["gz"], &[0x1F, 0x8B]),
    Signature::new(&["bz2"], &[0x42, 0x5A, 0x68]),
    Signature::new(&["alz"], &[0x41, 0x4C, 0x5A, 0x01]),
    Signature::new(&["lzh"], b"-lh").at(2),
    Signature::new(&["avi"], b"RIFF").and(8, b"AVI "),
    Signature::new(&["wav"], b"RIFF").and(8, b"WAVE"),
    Signature::new(&["mp4", "m4v", "m4a", "mov"], b"ftyp").at(4),
    Signature::new(&["mkv"], &[0x1A, 0x45, 0xDF, 0xA3]),
    Signature::new(&["flv"], b"FLV"),
    Signature::new(
        &["wmv", "asf", "wma"],
        &[0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C],
    ),
    Signature::new(&["mpg", "mpeg"], &[0x00, 0x00, 0x01, 0xBA]),
    Signature::new(&["ts"], &[0x47]),
    Signature::new(&["ogg", "ogv"], b"OggS"),
    Signature::new(&["mp3"], b"ID3"),
    Signature::new(&["mp3"], &[0xFF, 0xFB]),
    Signature::new(&["mp3"], &[0xFF, 0xFA]),
    Signature::new(&["mp3"], &[0xFF, 0xF3]),
    Signature::new(&["mp3"], &[0xFF, 0xF2]),
    Signature::new(&["flac"], b"fLaC"),
    Signature::new(&["aac"], &[0xFF, 0xF1]),
];

/// Positions into [`SIGNATURES`], split by whether a signature can be looked up
/// by the first byte of the buffer.
struct SignatureIndex {
    /// Zero-offset signatures keyed by their first magic byte.
    anchored: [Vec<usize>; 256],
    /// Signatures with a non-zero offset; these are checked for every buffer.
    floating: Vec<usize>,
}

static INDEX: LazyLock<SignatureIndex> = LazyLock::new(|| {
    let mut index = SignatureIndex {
        anchored: std::array::from_fn(|_| Vec::new()),
        floating: Vec::new(),
    };
    for (position, signature) in SIGNATURES.iter().enumerate() {
        match (signature.offset, signature.magic.first()) {
            (0, Some(&first)) => index.anchored[usize::from(first)].push(position),
            _ => index.floating.push(position),
        }
    }
    index
});

/// Find the highest-priority signature matching the leading bytes of a file.
///
/// Only signatures relevant to the buffer's first byte (plus all
/// offset-bearing signatures) are checked, but the result is identical to a
/// linear scan of [`SIGNATURES`]: candidates are visited in table order.
#[must_use]
pub fn detect_signature(bytes: &[u8]) -> Option<&'static Signature> {
    let first = *bytes.first()?;
    let mut anchored = INDEX.anchored[usize::from(first)].iter().copied().peekable();
    let mut floating = INDEX.floating.iter().copied().peekable();
    // Both lists are already sorted by table position; merge them.
    let candidates = std::iter::from_fn(|| match (anchored.peek().copied(), floating.peek().copied()) {
        (Some(a), Some(f)) if a < f => anchored.next(),
        (_, Some(_)) => floating.next(),
        (Some(_), None) => anchored.next(),
        (None, None) => None,
    });
    candidates.map(|position| &SIGNATURES[position]).find(|s| s.matches(bytes))
}

/// Detect a file extension from the leading bytes of a file.
///
/// Returns `None` for empty buffers or when no signature matches.
#[must_use]
pub fn detect_from_bytes(bytes: &[u8]) -> Option<&'static str> {
    detect_signature(bytes).map(Signature::extension)
}
