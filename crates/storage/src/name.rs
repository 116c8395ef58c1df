use crate::error::{ErrorKind, Result};

/// Characters that may never appear in a stored file name.
const RESERVED: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|', '\0'];

/// Accept `name` only if it names a single file directly inside a storage
/// root: not empty, not `.` or `..`, and free of separators and the reserved
/// characters `\ / : * ? " < > |` (or NUL).
///
/// ```
/// use parcel_storage::validate_file_name;
/// assert!(validate_file_name("holiday.jpg").is_ok());
/// assert!(validate_file_name("..").is_err());
/// assert!(validate_file_name("a/b.png").is_err());
/// ```
pub fn validate_file_name(name: &str) -> Result<&str> {
    let dots_only = matches!(name, "" | "." | "..");
    if dots_only || name.contains(RESERVED) {
        exn::bail!(ErrorKind::InvalidFileName(name.to_string()));
    }
    Ok(name)
}

/// Replace every reserved character with `_`.
///
/// ```
/// use parcel_storage::sanitize_file_name;
/// assert_eq!(sanitize_file_name("a/b:c"), "a_b_c");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    name.replace(RESERVED, "_")
}
