#![cfg(target_os = "windows")]

use std::cell::RefCell;
use std::collections::HashMap;
use std::ptr;
use std::rc::Rc;

use anyhow::anyhow;
use rwh_06::RawWindowHandle;
use tracing::{debug, trace};
use windows_sys::Win32::{
    Foundation::{HWND, POINT},
    Graphics::Gdi::ClientToScreen,
    UI::WindowsAndMessaging::{
        DestroyMenu, GetCursorPos, PostMessageW, SetForegroundWindow, TPM_LEFTALIGN,
        TPM_RETURNCMD, TPM_RIGHTBUTTON, TPM_TOPALIGN, TrackPopupMenu, WM_NULL,
    },
};
use winit_gui_core::{
    ColorDialogId, ColorPickerResponse, MenuItemId, NativeBridge, NativeEventProxy, NativeItem,
    NativeMenuHandle, NativeMenuKind, PopupPosition, Rgba,
};

mod color_picker;
mod menu;
mod menu_bar;
mod util;

use menu::{CommandMap, MenuRecord};
use menu_bar::{BarHook, InstalledBar};

/// [`NativeBridge`] backed by Win32 `HMENU`s and the common color dialog.
pub struct WindowsBridge {
    proxy: NativeEventProxy,
    commands: Rc<RefCell<CommandMap>>,
    menus: HashMap<NativeMenuHandle, MenuRecord>,
    bars: HashMap<usize, InstalledBar>,
    custom_colors: color_picker::CustomColors,
}

impl std::fmt::Debug for WindowsBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsBridge")
            .field("proxy", &"<...>") // Proxy is a closure, so we can't display it directly
            .field("menus", &self.menus.len())
            .field("bars", &self.bars.len())
            .finish_non_exhaustive()
    }
}

impl WindowsBridge {
    /// Menu bar clicks are reported through `proxy`.
    pub fn new(proxy: NativeEventProxy) -> Self {
        Self {
            proxy,
            commands: Rc::default(),
            menus: HashMap::new(),
            bars: HashMap::new(),
            custom_colors: [0x00FF_FFFF; 16],
        }
    }

    fn record(&self, menu: NativeMenuHandle) -> anyhow::Result<&MenuRecord> {
        self.menus
            .get(&menu)
            .ok_or_else(|| anyhow!("unknown native menu {menu:?}"))
    }

    fn record_mut(&mut self, menu: NativeMenuHandle) -> anyhow::Result<&mut MenuRecord> {
        self.menus
            .get_mut(&menu)
            .ok_or_else(|| anyhow!("unknown native menu {menu:?}"))
    }

    // bars are not repainted by Windows when their menus change
    fn redraw_bars(&self) {
        for bar in self.bars.values() {
            bar.redraw();
        }
    }
}

impl NativeBridge for WindowsBridge {
    fn create_menu(&mut self, kind: NativeMenuKind, title: &str) -> anyhow::Result<NativeMenuHandle> {
        let hmenu = unsafe { menu::create(kind)? };
        let handle = NativeMenuHandle::from_raw(hmenu as usize);
        self.menus.insert(
            handle,
            MenuRecord {
                hmenu,
                kind,
                title: title.to_owned(),
                commands: Vec::new(),
                submenus: Vec::new(),
            },
        );
        trace!(?handle, ?kind, title, "created HMENU");
        Ok(handle)
    }

    fn append_item(&mut self, menu: NativeMenuHandle, item: NativeItem<'_>) -> anyhow::Result<()> {
        let hmenu = self.record(menu)?.hmenu;
        let command = self.commands.borrow_mut().insert(item.id)?;
        let label = menu::item_label(&item);
        if let Err(err) = unsafe { menu::append_string(hmenu, command, &label) } {
            self.commands.borrow_mut().remove(command);
            return Err(err);
        }
        self.record_mut(menu)?.commands.push(command);
        self.redraw_bars();
        Ok(())
    }

    fn append_separator(&mut self, menu: NativeMenuHandle) -> anyhow::Result<()> {
        let hmenu = self.record(menu)?.hmenu;
        unsafe { menu::append_separator(hmenu)? };
        self.redraw_bars();
        Ok(())
    }

    fn append_submenu(
        &mut self,
        menu: NativeMenuHandle,
        title: &str,
        submenu: NativeMenuHandle,
    ) -> anyhow::Result<()> {
        let hmenu = self.record(menu)?.hmenu;
        let child = self.record(submenu)?.hmenu;
        unsafe { menu::append_popup(hmenu, child, title)? };
        self.record_mut(menu)?.submenus.push(submenu);
        self.redraw_bars();
        Ok(())
    }

    fn remove_submenu(&mut self, menu: NativeMenuHandle, submenu: NativeMenuHandle) -> anyhow::Result<()> {
        let hmenu = self.record(menu)?.hmenu;
        let child = self.record(submenu)?.hmenu;
        unsafe { menu::remove_popup(hmenu, child)? };
        self.record_mut(menu)?.submenus.retain(|nested| *nested != submenu);
        self.redraw_bars();
        Ok(())
    }

    fn popup(
        &mut self,
        window: RawWindowHandle,
        menu: NativeMenuHandle,
        position: PopupPosition,
    ) -> anyhow::Result<Option<MenuItemId>> {
        let hwnd = util::hwnd(window)?;
        let hmenu = self.record(menu)?.hmenu;
        let point = unsafe { screen_position(hwnd, position)? };

        let selected = unsafe {
            // without this the menu would not close when clicking elsewhere
            SetForegroundWindow(hwnd);
            let selected = TrackPopupMenu(
                hmenu,
                TPM_LEFTALIGN | TPM_TOPALIGN | TPM_RIGHTBUTTON | TPM_RETURNCMD,
                point.x,
                point.y,
                0,
                hwnd,
                ptr::null(),
            );
            PostMessageW(hwnd, WM_NULL, 0, 0);
            selected
        };

        if selected <= 0 {
            return Ok(None);
        }
        Ok(self.commands.borrow().get(selected as u16))
    }

    fn attach_to_bar(&mut self, window: RawWindowHandle, menu: NativeMenuHandle) -> anyhow::Result<()> {
        let hwnd = util::hwnd(window)?;
        if let Some(previous) = self.bars.remove(&(hwnd as usize)) {
            previous.remove();
        }

        let hook = BarHook {
            proxy: self.proxy.clone(),
            commands: self.commands.clone(),
        };
        let installed = unsafe { menu_bar::install(hwnd, self.record(menu)?, hook)? };
        self.bars.insert(hwnd as usize, installed);
        debug!(?menu, "installed window menu bar");
        Ok(())
    }

    fn detach_from_bar(&mut self, window: RawWindowHandle) {
        let Ok(hwnd) = util::hwnd(window) else {
            return;
        };
        if let Some(bar) = self.bars.remove(&(hwnd as usize)) {
            bar.remove();
            debug!("removed window menu bar");
        }
    }

    fn release(&mut self, menu: NativeMenuHandle) {
        let Some(hmenu) = self.menus.get(&menu).map(|record| record.hmenu) else {
            return;
        };

        let mut pending = vec![menu];
        while let Some(handle) = pending.pop() {
            if let Some(record) = self.menus.remove(&handle) {
                let mut commands = self.commands.borrow_mut();
                for command in record.commands {
                    commands.remove(command);
                }
                pending.extend(record.submenus);
            }
        }

        // DestroyMenu also destroys every sub-menu still attached
        unsafe { DestroyMenu(hmenu) };
        trace!(?menu, "destroyed HMENU");
    }

    fn show_color_picker(
        &mut self,
        window: RawWindowHandle,
        dialog: ColorDialogId,
        initial: Rgba,
        show_alpha: bool,
    ) -> anyhow::Result<ColorPickerResponse> {
        let hwnd = util::hwnd(window)?;
        if show_alpha {
            trace!(?dialog, "ChooseColorW has no alpha control, keeping initial alpha");
        }
        let picked = unsafe { color_picker::choose_color(hwnd, initial, &mut self.custom_colors)? };
        Ok(match picked {
            Some(color) => ColorPickerResponse::Confirmed(color),
            None => ColorPickerResponse::Cancelled,
        })
    }
}

impl Drop for WindowsBridge {
    fn drop(&mut self) {
        for (_, bar) in self.bars.drain() {
            bar.remove();
        }
    }
}

/// # Safety
/// `hwnd` must be a valid window handle.
unsafe fn screen_position(hwnd: HWND, position: PopupPosition) -> anyhow::Result<POINT> {
    let mut point = POINT { x: 0, y: 0 };
    match position {
        PopupPosition::Pointer => {
            if unsafe { GetCursorPos(&mut point) } == 0 {
                return Err(util::last_os_error());
            }
        }
        PopupPosition::Window(position) => {
            point = POINT {
                x: position.x,
                y: position.y,
            };
            if unsafe { ClientToScreen(hwnd, &mut point) } == 0 {
                return Err(util::last_os_error());
            }
        }
    }
    Ok(point)
}
