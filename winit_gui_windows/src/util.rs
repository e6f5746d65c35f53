use std::{ffi::OsStr, iter::once, os::windows::ffi::OsStrExt as _};

use rwh_06::RawWindowHandle;
use windows_sys::Win32::Foundation::HWND;

pub fn encode_wide(string: impl AsRef<OsStr>) -> Vec<u16> {
    string.as_ref().encode_wide().chain(once(0)).collect()
}

/// The `HWND` behind a window handle, failing for non-Win32 handles.
pub fn hwnd(window: RawWindowHandle) -> anyhow::Result<HWND> {
    match window {
        RawWindowHandle::Win32(handle) => Ok(handle.hwnd.get() as HWND),
        _ => Err(anyhow::anyhow!("Invalid window handle type, expected Win32")),
    }
}

pub fn last_os_error() -> anyhow::Error {
    std::io::Error::last_os_error().into()
}

#[inline(always)]
pub const fn loword(value: usize) -> u16 {
    (value & 0xFFFF) as u16
}

#[inline(always)]
pub const fn hiword(value: usize) -> u16 {
    ((value >> 16) & 0xFFFF) as u16
}
