//! Storage key derivation.

use regex::Regex;
use std::sync::LazyLock;

static UNSAFE_KEY_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9\-.]").expect("Invalid key sanitiser regex"));

/// Replace every character outside `[A-Za-z0-9-.]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    UNSAFE_KEY_CHARS.replace_all(name, "_").into_owned()
}

/// `{folder_prefix}/{stamp}-{sanitised name}`. A trailing `/` on the prefix
/// is ignored and an empty prefix yields a top-level key.
pub fn derive_key(folder_prefix: &str, stamp_millis: i64, file_name: &str) -> String {
    let prefix = folder_prefix.trim_end_matches('/');
    let leaf = format!("{}-{}", stamp_millis, sanitize_file_name(file_name));
    if prefix.is_empty() {
        leaf
    } else {
        format!("{}/{}", prefix, leaf)
    }
}
