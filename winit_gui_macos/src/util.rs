use objc2::msg_send;
use objc2::runtime::AnyObject;
use objc2_core_foundation::{CGPoint, CGRect, CGSize};
use rwh_06::RawWindowHandle;
use winit_gui_core::PopupPosition;

/// The `NSView` behind a window handle, failing for non-AppKit handles.
pub(crate) fn ns_view(window: RawWindowHandle) -> anyhow::Result<*mut AnyObject> {
    match window {
        RawWindowHandle::AppKit(handle) => Ok(handle.ns_view.as_ptr() as *mut AnyObject),
        _ => Err(anyhow::anyhow!("Invalid window handle type, expected AppKit")),
    }
}

/// Convert a popup position to screen coordinates (bottom-left origin).
///
/// # Safety
/// `ns_view` must point to a live `NSView`.
pub(crate) unsafe fn screen_location(
    ns_view: *mut AnyObject,
    position: PopupPosition,
) -> anyhow::Result<CGPoint> {
    let position = match position {
        PopupPosition::Pointer => return Ok(objc2_app_kit::NSEvent::mouseLocation()),
        PopupPosition::Window(position) => position,
    };

    let ns_window: *mut AnyObject = unsafe { msg_send![ns_view, window] };
    if ns_window.is_null() {
        return Err(anyhow::anyhow!("view is not in a window"));
    }

    // Convert physical pixels to points
    let scale: f64 = unsafe { msg_send![ns_window, backingScaleFactor] };
    let x = position.x as f64 / scale;
    let y = position.y as f64 / scale;

    // Flip Y if view is not flipped (macOS uses bottom-left origin by default)
    let is_flipped: bool = unsafe { msg_send![ns_view, isFlipped] };
    let view_y = if is_flipped {
        y
    } else {
        let bounds: CGRect = unsafe { msg_send![ns_view, bounds] };
        bounds.size.height - y
    };

    // Convert view -> window -> screen coordinates
    let view_pt = CGPoint { x, y: view_y };
    let win_pt: CGPoint =
        unsafe { msg_send![ns_view, convertPoint: view_pt, toView: std::ptr::null::<AnyObject>()] };
    let rect = CGRect {
        origin: win_pt,
        size: CGSize {
            width: 0.0,
            height: 0.0,
        },
    };
    let screen_rect: CGRect = unsafe { msg_send![ns_window, convertRectToScreen: rect] };
    Ok(screen_rect.origin)
}
