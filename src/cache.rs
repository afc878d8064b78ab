//! Existence/permission checks around the compiled-artifact cache (ยง6, ยง9). The target
//! library owns serialization; this module's job is only deciding whether to attempt a read
//! or a write. Grounded on `openvino_delegate_core.cc`'s `CreateModel`.

use std::path::{Path, PathBuf};

use crate::config::DelegateOptions;

/// Where a cached artifact for `options` would live, if caching is configured at all.
pub fn cache_path(options: &DelegateOptions) -> Option<PathBuf> {
    match (&options.cache_dir, &options.model_token) {
        (Some(dir), Some(token)) => Some(dir.join(format!("{token}.xml"))),
        _ => None,
    }
}

fn is_readable(dir: &Path) -> bool {
    std::fs::metadata(dir).map(|m| m.is_dir()).unwrap_or(false)
}

fn is_writable(dir: &Path) -> bool {
    // No portable `access(2)`-equivalent in std; a metadata check plus a permissions probe
    // via a throwaway temp file mirrors what `access(dir, W_OK)` is really asking.
    if !is_readable(dir) {
        return false;
    }
    let probe = dir.join(".openvino_delegate_core_write_probe");
    match std::fs::File::create(&probe) {
        Ok(_) => {
            let _ = std::fs::remove_file(&probe);
            true
        }
        Err(_) => false,
    }
}

/// Whether a cache read should even be attempted: the directory must be readable and the
/// `.xml` file must exist.
pub fn should_read(options: &DelegateOptions) -> Option<PathBuf> {
    let xml = cache_path(options)?;
    let dir = options.cache_dir.as_ref()?;
    if is_readable(dir) && xml.exists() {
        Some(xml)
    } else {
        None
    }
}

/// Whether a cache write should be attempted: the directory must be writable. A
/// non-writable directory is a warning, not a fatal error (ยง6).
pub fn should_write(options: &DelegateOptions) -> Option<PathBuf> {
    let xml = cache_path(options)?;
    let dir = options.cache_dir.as_ref()?;
    if is_writable(dir) {
        Some(xml)
    } else {
        log::warn!("cache dir {} is not writable; skipping artifact serialization", dir.display());
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_cache_dir_means_no_cache_path() {
        let options = DelegateOptions::default();
        assert!(cache_path(&options).is_none());
    }

    #[test]
    fn should_read_is_none_until_the_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let options = DelegateOptions {
            cache_dir: Some(dir.path().to_path_buf()),
            model_token: Some("m".to_string()),
        };
        assert!(should_read(&options).is_none());
        std::fs::write(dir.path().join("m.xml"), b"x").unwrap();
        assert!(should_read(&options).is_some());
    }

    #[test]
    fn should_write_is_some_for_a_writable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let options = DelegateOptions {
            cache_dir: Some(dir.path().to_path_buf()),
            model_token: Some("m".to_string()),
        };
        assert!(should_write(&options).is_some());
    }
}
