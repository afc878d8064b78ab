//! Settings the host hands the delegate at `create()` time (ยง4.7). Grounded on
//! `openvino_delegate_external.cc`'s settings parsing and the `TfLiteOpenVINODelegateOptions`
//! struct it reads into.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DelegateOptions {
    pub cache_dir: Option<PathBuf>,
    pub model_token: Option<String>,
}

impl DelegateOptions {
    /// Parse the opaque settings blob the stable-ABI `create()` entry point receives. In this
    /// crate's reference `ffi` module that blob is JSON, for testability; a real embedding
    /// may instead decode a flatbuffer settings table before handing this crate plain fields.
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        if bytes.is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_blob_disables_caching() {
        let opts = DelegateOptions::from_json(b"").unwrap();
        assert!(opts.cache_dir.is_none());
        assert!(opts.model_token.is_none());
    }

    #[test]
    fn parses_cache_dir_and_model_token() {
        let json = br#"{"cache_dir": "/tmp/cache", "model_token": "abc"}"#;
        let opts = DelegateOptions::from_json(json).unwrap();
        assert_eq!(opts.cache_dir, Some(PathBuf::from("/tmp/cache")));
        assert_eq!(opts.model_token, Some("abc".to_string()));
    }
}
