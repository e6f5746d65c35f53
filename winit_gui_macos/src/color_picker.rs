//! Color selection through the shared `NSColorPanel`.
//!
//! The panel is not modal: opening it returns immediately and the chosen color is
//! reported through the proxy when the panel closes.
//!
//! The panel has no cancel button, so closing it confirms whatever color it shows.
//! A dialog only ends cancelled when another dialog takes the panel over or the
//! color has no sRGB form.

use std::cell::Cell;

use objc2::rc::Retained;
use objc2::runtime::ProtocolObject;
use objc2::{MainThreadMarker, MainThreadOnly, define_class, msg_send};
use objc2_app_kit::{NSColor, NSColorPanel, NSColorSpace, NSWindowDelegate};
use objc2_foundation::{NSNotification, NSObject, NSObjectProtocol};
use winit_gui_core::{ColorDialogId, NativeEvent, NativeEventProxy, Rgba};

pub(crate) struct ColorPanelIvars {
    proxy: NativeEventProxy,
    dialog: Cell<Option<ColorDialogId>>,
}

define_class!(
    #[unsafe(super(NSObject))]
    #[thread_kind = MainThreadOnly]
    #[name = "WinitGuiColorPanelDelegate"]
    #[ivars = ColorPanelIvars]
    pub(crate) struct ColorPanelDelegate;

    unsafe impl NSObjectProtocol for ColorPanelDelegate {}

    unsafe impl NSWindowDelegate for ColorPanelDelegate {
        #[unsafe(method(windowWillClose:))]
        fn window_will_close(&self, _notification: &NSNotification) {
            let Some(mtm) = MainThreadMarker::new() else {
                return;
            };
            // closing is the only way out, it picks the current color
            let color = panel_color(&NSColorPanel::sharedColorPanel(mtm));
            self.finish(color);
        }
    }
);

impl ColorPanelDelegate {
    pub(crate) fn new(mtm: MainThreadMarker, proxy: NativeEventProxy) -> Retained<Self> {
        let this = mtm.alloc().set_ivars(ColorPanelIvars {
            proxy,
            dialog: Cell::new(None),
        });
        unsafe { msg_send![super(this), init] }
    }

    /// Show the shared panel for `dialog`.
    ///
    /// The panel is shared by the whole application, so a dialog still waiting for
    /// its result is cancelled first.
    pub(crate) fn open(&self, mtm: MainThreadMarker, dialog: ColorDialogId, initial: Rgba, show_alpha: bool) {
        if self.ivars().dialog.get().is_some() {
            self.finish(None);
        }
        self.ivars().dialog.set(Some(dialog));

        let panel = NSColorPanel::sharedColorPanel(mtm);
        let [r, g, b, a] = initial.to_array().map(f64::from);
        let color = NSColor::colorWithSRGBRed_green_blue_alpha(r, g, b, a);
        panel.setShowsAlpha(show_alpha);
        panel.setColor(&color);
        unsafe { panel.setDelegate(Some(ProtocolObject::from_ref(self))) };
        panel.makeKeyAndOrderFront(None);
    }

    fn finish(&self, color: Option<Rgba>) {
        if let Some(dialog) = self.ivars().dialog.take() {
            (self.ivars().proxy)(NativeEvent::ColorPicked { dialog, color });
        }
    }
}

/// Current panel color in sRGB, `None` if it cannot be expressed there.
fn panel_color(panel: &NSColorPanel) -> Option<Rgba> {
    let color = panel.color();
    let srgb = color.colorUsingColorSpace(&NSColorSpace::sRGBColorSpace())?;
    Some(Rgba::new(
        srgb.redComponent() as f32,
        srgb.greenComponent() as f32,
        srgb.blueComponent() as f32,
        srgb.alphaComponent() as f32,
    ))
}
