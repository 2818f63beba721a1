use std::path::{Path, PathBuf};

/// Map an arbitrary storage key to a safe file stem. Keys are short fixed
/// strings in practice ("user"), but arbitrary input must not escape the root.
pub(crate) fn sanitize_key(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

pub(crate) fn key_path(root: &Path, key: &str) -> PathBuf {
    root.join(format!("{}.json", sanitize_key(key)))
}

pub(crate) fn tmp_path(root: &Path, key: &str) -> PathBuf {
    root.join(format!("{}.json.tmp", sanitize_key(key)))
}
