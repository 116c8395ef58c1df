//! File type detection with automatic fallbacks.
//!
//! This crate answers one question, "what kind of file is this?", from
//! whatever evidence happens to be available:
//!
//! - **Magic bytes** from the head of a buffer ([`detect_from_bytes`]), using
//!   a fixed-priority [signature table](SIGNATURES).
//! - **Paths and URLs** ([`extension_from_path`]), trusting only extensions
//!   found in the known [MIME table](mime_for) so that junk like `.php` or
//!   `.aspx` falls through to sniffing.
//! - **Remote files** ([`RangeSniffer`], `remote` feature) by fetching only the
//!   first few hundred bytes with an HTTP `Range` request.
//!
//! When every strategy comes up empty, callers fall back to
//! [`DEFAULT_EXTENSION`].

pub mod error;
mod mime;
mod path;
#[cfg(feature = "remote")]
mod remote;
mod signature;

pub use crate::mime::{GENERIC_MIME, extension_for_mime, is_known, mime_for};
pub use crate::path::extension_from_path;
#[cfg(feature = "remote")]
pub use crate::remote::RangeSniffer;
pub use crate::signature::{SIGNATURES, Signature, detect_from_bytes, detect_signature};

/// Extension assumed when nothing else can be determined.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Default number of leading bytes read for signature sniffing.
pub const DEFAULT_SNIFF_WINDOW: usize = 256;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_extension_is_known() {
        assert!(is_known(DEFAULT_EXTENSION));
        assert_eq!(mime_for(DEFAULT_EXTENSION), "image/jpeg");
    }

    #[test]
    fn every_signature_extension_has_a_mime_type() {
        for signature in SIGNATURES {
            for ext in signature.extensions {
                assert!(is_known(ext), "signature alias `{ext}` missing from MIME table");
            }
        }
    }
}
