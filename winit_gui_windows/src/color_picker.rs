//! Color selection through the common `ChooseColorW` dialog.

#![allow(unsafe_op_in_unsafe_fn)]

use windows_sys::Win32::{
    Foundation::{COLORREF, HWND},
    UI::Controls::Dialogs::{CC_FULLOPEN, CC_RGBINIT, CHOOSECOLORW, ChooseColorW, CommDlgExtendedError},
};
use winit_gui_core::Rgba;

/// Custom color slots shown by the dialog, kept across invocations.
pub(crate) type CustomColors = [COLORREF; 16];

/// Run the modal dialog. `None` means the user cancelled.
///
/// The dialog has no alpha channel, so the alpha of `initial` is carried over.
///
/// # Safety
/// `hwnd` must be a valid window owned by the calling thread.
pub(crate) unsafe fn choose_color(
    hwnd: HWND,
    initial: Rgba,
    custom: &mut CustomColors,
) -> anyhow::Result<Option<Rgba>> {
    let mut dialog: CHOOSECOLORW = std::mem::zeroed();
    dialog.lStructSize = std::mem::size_of::<CHOOSECOLORW>() as u32;
    dialog.hwndOwner = hwnd;
    dialog.rgbResult = to_colorref(initial);
    dialog.lpCustColors = custom.as_mut_ptr();
    dialog.Flags = CC_RGBINIT | CC_FULLOPEN;

    if ChooseColorW(&mut dialog) == 0 {
        return match CommDlgExtendedError() {
            0 => Ok(None),
            code => Err(anyhow::anyhow!("ChooseColorW failed with error {code:#x}")),
        };
    }
    Ok(Some(from_colorref(dialog.rgbResult, initial.a())))
}

fn to_colorref(color: Rgba) -> COLORREF {
    let [r, g, b, _] = color.to_rgba8();
    u32::from(r) | u32::from(g) << 8 | u32::from(b) << 16
}

fn from_colorref(color: COLORREF, alpha: f32) -> Rgba {
    let [r, g, b, _] = color.to_le_bytes();
    Rgba::from_rgba8([r, g, b, 255]).with_alpha(alpha)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colorref_is_bgr_and_keeps_alpha() {
        let red = Rgba::new(1.0, 0.0, 0.0, 0.5);
        assert_eq!(to_colorref(red), 0x0000_00FF);
        assert_eq!(from_colorref(0x0000_FF00, 0.5), Rgba::new(0.0, 1.0, 0.0, 0.5));
    }
}
