//! Stable-ABI plugin surface (ยง6): the three function pointers a host loads by symbol, plus
//! a static plugin descriptor. Grounded on `openvino_delegate_external.cc`
//! (`OpenVINOStableDelegateCreateFunc`/`...DestroyFunc`/`...ErrnoFunc`, `TFL_TheStableDelegate`).

use std::os::raw::c_int;

use crate::config::DelegateOptions;
use crate::delegate::Delegate;
use crate::target::native::NativeCore;

pub const PLUGIN_NAME: &str = "intel_openvino_delegate";
pub const PLUGIN_VERSION: &str = "1.0.0";
pub const ABI_VERSION: u32 = 1;

/// Static metadata a host inspects before calling [`create`].
pub struct PluginDescriptor {
    pub name: &'static str,
    pub version: &'static str,
    pub abi_version: u32,
}

pub const PLUGIN_DESCRIPTOR: PluginDescriptor = PluginDescriptor {
    name: PLUGIN_NAME,
    version: PLUGIN_VERSION,
    abi_version: ABI_VERSION,
};

/// The opaque handle a host stores between `create` and `destroy`.
pub struct DelegateHandle {
    delegate: Delegate<NativeCore>,
}

impl DelegateHandle {
    pub fn delegate_mut(&mut self) -> &mut Delegate<NativeCore> {
        &mut self.delegate
    }
}

/// Construct a delegate instance from a settings blob (ยง4.7). `settings_len == 0` or a null
/// pointer means "no settings": caching is disabled and every other option takes its default.
///
/// # Safety
/// `settings` must either be null, or point to `settings_len` initialized, readable bytes.
#[no_mangle]
pub unsafe extern "C" fn create(settings: *const u8, settings_len: usize) -> *mut DelegateHandle {
    let bytes: &[u8] = if settings.is_null() || settings_len == 0 {
        &[]
    } else {
        std::slice::from_raw_parts(settings, settings_len)
    };
    let options = DelegateOptions::from_json(bytes).unwrap_or_else(|e| {
        log::warn!("failed to parse delegate settings, falling back to defaults: {e}");
        DelegateOptions::default()
    });
    let handle = Box::new(DelegateHandle {
        delegate: Delegate::new(NativeCore::new(), options),
    });
    Box::into_raw(handle)
}

/// Release a handle returned by [`create`]. A null pointer is accepted as a no-op.
///
/// # Safety
/// `handle` must be either null or a pointer previously returned by [`create`] that has not
/// already been passed to `destroy`.
#[no_mangle]
pub unsafe extern "C" fn destroy(handle: *mut DelegateHandle) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// No-op, matching the original `OpenVINOStableDelegateErrnoFunc`: failures surface through
/// `DelegateError` returned from `Init`/`Eval`, not through a side errno channel.
///
/// # Safety
/// `handle` must be a valid, non-null pointer previously returned by [`create`].
#[no_mangle]
pub unsafe extern "C" fn errno(_handle: *mut DelegateHandle) -> c_int {
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_with_no_settings_then_destroy() {
        let handle = unsafe { create(std::ptr::null(), 0) };
        assert!(!handle.is_null());
        unsafe { destroy(handle) };
    }

    #[test]
    fn create_parses_settings_json() {
        let json = br#"{"cache_dir": "/tmp/ov-cache", "model_token": "abc123"}"#;
        let handle = unsafe { create(json.as_ptr(), json.len()) };
        assert!(!handle.is_null());
        unsafe { destroy(handle) };
    }

    #[test]
    fn plugin_descriptor_reports_expected_identity() {
        assert_eq!(PLUGIN_DESCRIPTOR.name, "intel_openvino_delegate");
        assert_eq!(PLUGIN_DESCRIPTOR.version, "1.0.0");
    }
}
