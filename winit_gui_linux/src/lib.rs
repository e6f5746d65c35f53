#![cfg(target_os = "linux")]

#[cfg(feature = "color_picker")]
mod portal;

use std::thread;

use anyhow::{Result, anyhow};
use rwh_06::RawWindowHandle;
use tracing::{debug, error, trace};
use winit_gui_core::{
    ColorDialogId, ColorPickerResponse, MenuItemId, NativeBridge, NativeEventProxy, NativeItem,
    NativeMenuHandle, NativeMenuKind, PopupPosition, Rgba,
};

/// [`NativeBridge`] for Linux desktops.
///
/// winit draws no widgets and there is no toolkit-independent menu service, so native
/// menus are unavailable: menu operations fail and [`Gui`](winit_gui_core::Gui) keeps
/// menus in their abstract form. Shortcuts of menus still work. Colors are picked
/// through the XDG desktop portal on a background thread.
pub struct LinuxBridge {
    proxy: NativeEventProxy,
}

impl std::fmt::Debug for LinuxBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinuxBridge")
            .field("proxy", &"<...>") // Proxy is a closure, so we can't display it directly
            .finish()
    }
}

impl LinuxBridge {
    /// Color picker results are reported through `proxy`.
    pub fn new(proxy: NativeEventProxy) -> Self {
        debug!("Creating Linux gui bridge");
        Self { proxy }
    }
}

fn unavailable<T>() -> Result<T> {
    Err(anyhow!("native menus are not available on Linux"))
}

impl NativeBridge for LinuxBridge {
    fn create_menu(&mut self, _kind: NativeMenuKind, _title: &str) -> Result<NativeMenuHandle> {
        unavailable()
    }

    fn append_item(&mut self, _menu: NativeMenuHandle, _item: NativeItem<'_>) -> Result<()> {
        unavailable()
    }

    fn append_separator(&mut self, _menu: NativeMenuHandle) -> Result<()> {
        unavailable()
    }

    fn append_submenu(&mut self, _menu: NativeMenuHandle, _title: &str, _submenu: NativeMenuHandle) -> Result<()> {
        unavailable()
    }

    fn remove_submenu(&mut self, _menu: NativeMenuHandle, _submenu: NativeMenuHandle) -> Result<()> {
        unavailable()
    }

    fn popup(
        &mut self,
        _window: RawWindowHandle,
        _menu: NativeMenuHandle,
        _position: PopupPosition,
    ) -> Result<Option<MenuItemId>> {
        unavailable()
    }

    fn attach_to_bar(&mut self, _window: RawWindowHandle, _menu: NativeMenuHandle) -> Result<()> {
        unavailable()
    }

    fn detach_from_bar(&mut self, _window: RawWindowHandle) {}

    fn release(&mut self, _menu: NativeMenuHandle) {}

    #[cfg(feature = "color_picker")]
    fn show_color_picker(
        &mut self,
        window: RawWindowHandle,
        dialog: ColorDialogId,
        initial: Rgba,
        _show_alpha: bool,
    ) -> Result<ColorPickerResponse> {
        let parent = portal::parent_window(window);
        let proxy = self.proxy.clone();
        let alpha = initial.a();

        trace!(?dialog, %parent, "Spawning portal color picker thread");
        thread::Builder::new()
            .name("winit_gui_color_picker".into())
            .spawn(move || {
                let color = match portal::pick_color(&parent, dialog, alpha) {
                    Ok(color) => color,
                    Err(e) => {
                        error!("Portal color picker failed: {e:#}");
                        None
                    }
                };
                proxy(winit_gui_core::NativeEvent::ColorPicked { dialog, color });
            })?;

        Ok(ColorPickerResponse::Pending)
    }

    #[cfg(not(feature = "color_picker"))]
    fn show_color_picker(
        &mut self,
        _window: RawWindowHandle,
        _dialog: ColorDialogId,
        _initial: Rgba,
        _show_alpha: bool,
    ) -> Result<ColorPickerResponse> {
        Err(anyhow!("color picker support is disabled"))
    }
}
