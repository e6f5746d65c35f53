#![cfg(target_os = "macos")]

use std::collections::HashMap;

use anyhow::anyhow;
use objc2::rc::Retained;
use objc2::{MainThreadMarker, sel};
use objc2_app_kit::{NSApplication, NSMenu, NSMenuItem};
use objc2_foundation::NSString;
use rwh_06::RawWindowHandle;
use tracing::{debug, trace};
use winit_gui_core::{
    ColorDialogId, ColorPickerResponse, MenuItemId, NativeBridge, NativeEventProxy, NativeItem,
    NativeMenuHandle, NativeMenuKind, PopupPosition, Rgba,
};

mod color_picker;
mod menu;
mod util;

use color_picker::ColorPanelDelegate;
use menu::MenuTarget;

struct MenuRecord {
    menu: Retained<NSMenu>,
    kind: NativeMenuKind,
    title: String,
    submenus: Vec<NativeMenuHandle>,
}

struct MainMenu {
    menu: Retained<NSMenu>,
    // created here to host a popup menu
    wrapper: bool,
}

impl MainMenu {
    /// Give a hosted popup menu back so it can be attached elsewhere.
    fn release(self) {
        if self.wrapper {
            self.menu.removeAllItems();
        }
    }
}

/// The installed main menu and the window it was attached for.
#[derive(Debug)]
struct BarSlot<M> {
    current: Option<(RawWindowHandle, M)>,
}

impl<M> Default for BarSlot<M> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<M> BarSlot<M> {
    fn is_occupied(&self) -> bool {
        self.current.is_some()
    }

    fn install(&mut self, window: RawWindowHandle, menu: M) -> Option<M> {
        self.current.replace((window, menu)).map(|(_, menu)| menu)
    }

    fn take(&mut self) -> Option<M> {
        self.current.take().map(|(_, menu)| menu)
    }

    /// Take the menu only if `window` installed it.
    fn take_for(&mut self, window: RawWindowHandle) -> Option<M> {
        match &self.current {
            Some((owner, _)) if *owner == window => self.take(),
            _ => None,
        }
    }
}

/// [`NativeBridge`] backed by AppKit menus and the shared color panel.
///
/// macOS has a single menu bar per application: attaching a menu to any window
/// replaces the application's main menu. Detaching only clears it for the window
/// that attached it last.
///
/// The color panel has no cancel button. Closing it reports the color it shows, so
/// users cannot cancel a color dialog here.
pub struct MacosBridge {
    mtm: MainThreadMarker,
    target: Retained<MenuTarget>,
    color_panel: Retained<ColorPanelDelegate>,
    menus: HashMap<NativeMenuHandle, MenuRecord>,
    main_menu: BarSlot<MainMenu>,
}

impl std::fmt::Debug for MacosBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacosBridge")
            .field("menus", &self.menus.len())
            .field("main_menu", &self.main_menu.is_occupied())
            .finish_non_exhaustive()
    }
}

impl MacosBridge {
    /// Must be called on the main thread. Menu bar clicks and color panel results are
    /// reported through `proxy`.
    pub fn new(proxy: NativeEventProxy) -> anyhow::Result<Self> {
        let mtm = MainThreadMarker::new()
            .ok_or_else(|| anyhow!("MacosBridge must be created on the main thread"))?;
        Ok(Self {
            mtm,
            target: MenuTarget::new(mtm, proxy.clone()),
            color_panel: ColorPanelDelegate::new(mtm, proxy),
            menus: HashMap::new(),
            main_menu: BarSlot::default(),
        })
    }

    fn record(&self, menu: NativeMenuHandle) -> anyhow::Result<&MenuRecord> {
        self.menus
            .get(&menu)
            .ok_or_else(|| anyhow!("unknown native menu {menu:?}"))
    }

    fn menu(&self, menu: NativeMenuHandle) -> anyhow::Result<&NSMenu> {
        Ok(&self.record(menu)?.menu)
    }

    /// Application menu shown first in every menu bar, holding Quit.
    fn application_item(&self) -> Retained<NSMenuItem> {
        let mtm = self.mtm;
        let app_menu = menu::new_menu(mtm, "");
        let quit = unsafe {
            NSMenuItem::initWithTitle_action_keyEquivalent(
                mtm.alloc(),
                &NSString::from_str("Quit"),
                Some(sel!(terminate:)),
                &NSString::from_str("q"),
            )
        };
        app_menu.addItem(&quit);
        menu::create_submenu_item(mtm, "", &app_menu)
    }
}

impl NativeBridge for MacosBridge {
    fn create_menu(&mut self, kind: NativeMenuKind, title: &str) -> anyhow::Result<NativeMenuHandle> {
        let menu = menu::new_menu(self.mtm, title);
        if kind == NativeMenuKind::Bar {
            menu.addItem(&self.application_item());
        }
        let handle = NativeMenuHandle::from_raw(Retained::as_ptr(&menu) as usize);
        self.menus.insert(
            handle,
            MenuRecord {
                menu,
                kind,
                title: title.to_owned(),
                submenus: Vec::new(),
            },
        );
        trace!(?handle, ?kind, title, "created NSMenu");
        Ok(handle)
    }

    fn append_item(&mut self, menu: NativeMenuHandle, item: NativeItem<'_>) -> anyhow::Result<()> {
        let menu_item = menu::create_menu_item(self.mtm, &item, &self.target);
        self.menu(menu)?.addItem(&menu_item);
        Ok(())
    }

    fn append_separator(&mut self, menu: NativeMenuHandle) -> anyhow::Result<()> {
        let separator = NSMenuItem::separatorItem(self.mtm);
        self.menu(menu)?.addItem(&separator);
        Ok(())
    }

    fn append_submenu(
        &mut self,
        menu: NativeMenuHandle,
        title: &str,
        submenu: NativeMenuHandle,
    ) -> anyhow::Result<()> {
        let child = self.menu(submenu)?;
        if child.supermenu().is_some() {
            return Err(anyhow!("native menu {submenu:?} already has a parent"));
        }
        let menu_item = menu::create_submenu_item(self.mtm, title, child);
        self.menu(menu)?.addItem(&menu_item);
        if let Some(record) = self.menus.get_mut(&menu) {
            record.submenus.push(submenu);
        }
        Ok(())
    }

    fn remove_submenu(&mut self, menu: NativeMenuHandle, submenu: NativeMenuHandle) -> anyhow::Result<()> {
        let parent = self.menu(menu)?;
        let index = parent.indexOfItemWithSubmenu(Some(self.menu(submenu)?));
        if index < 0 {
            return Err(anyhow!("sub-menu not found in parent menu"));
        }
        parent.removeItemAtIndex(index);
        if let Some(record) = self.menus.get_mut(&menu) {
            record.submenus.retain(|nested| *nested != submenu);
        }
        Ok(())
    }

    fn popup(
        &mut self,
        window: RawWindowHandle,
        menu: NativeMenuHandle,
        position: PopupPosition,
    ) -> anyhow::Result<Option<MenuItemId>> {
        let ns_view = util::ns_view(window)?;
        let location = unsafe { util::screen_location(ns_view, position)? };
        let menu = self.menu(menu)?;

        // This blocks until user makes a selection or dismisses
        // When view is None, location is in screen coordinates
        Ok(menu::track_popup(|| {
            menu.popUpMenuPositioningItem_atLocation_inView(None, location, None);
        }))
    }

    fn attach_to_bar(&mut self, window: RawWindowHandle, menu: NativeMenuHandle) -> anyhow::Result<()> {
        let mtm = self.mtm;
        // the bar is shared, so whichever window attached last loses it
        if let Some(previous) = self.main_menu.take() {
            previous.release();
        }
        let record = self.record(menu)?;

        let main_menu = match record.kind {
            NativeMenuKind::Bar => MainMenu {
                menu: record.menu.clone(),
                wrapper: false,
            },
            NativeMenuKind::Popup => {
                if record.menu.supermenu().is_some() {
                    return Err(anyhow!("native menu {menu:?} already has a parent"));
                }
                let bar = menu::new_menu(mtm, "");
                bar.addItem(&self.application_item());
                bar.addItem(&menu::create_submenu_item(mtm, &record.title, &record.menu));
                MainMenu {
                    menu: bar,
                    wrapper: true,
                }
            }
        };

        NSApplication::sharedApplication(mtm).setMainMenu(Some(&main_menu.menu));
        self.main_menu.install(window, main_menu);
        debug!(?menu, "installed application main menu");
        Ok(())
    }

    fn detach_from_bar(&mut self, window: RawWindowHandle) {
        let Some(main_menu) = self.main_menu.take_for(window) else {
            trace!("main menu not owned by this window, left in place");
            return;
        };
        main_menu.release();
        // Set an empty menu to clear the menu bar
        NSApplication::sharedApplication(self.mtm).setMainMenu(Some(&NSMenu::new(self.mtm)));
        debug!("cleared application main menu");
    }

    fn release(&mut self, menu: NativeMenuHandle) {
        let mut pending = vec![menu];
        while let Some(handle) = pending.pop() {
            if let Some(record) = self.menus.remove(&handle) {
                record.menu.removeAllItems();
                pending.extend(record.submenus);
            }
        }
        trace!(?menu, "released NSMenu");
    }

    fn show_color_picker(
        &mut self,
        _window: RawWindowHandle,
        dialog: ColorDialogId,
        initial: Rgba,
        show_alpha: bool,
    ) -> anyhow::Result<ColorPickerResponse> {
        self.color_panel.open(self.mtm, dialog, initial, show_alpha);
        Ok(ColorPickerResponse::Pending)
    }
}

#[cfg(test)]
mod tests {
    use std::ptr::NonNull;

    use rwh_06::AppKitWindowHandle;

    use super::*;

    fn window(view: usize) -> RawWindowHandle {
        let view = NonNull::new(view as *mut std::ffi::c_void).unwrap();
        RawWindowHandle::AppKit(AppKitWindowHandle::new(view))
    }

    #[test]
    fn detach_leaves_other_windows_bar_alone() {
        let mut slot = BarSlot::default();
        assert_eq!(slot.install(window(0x10), "first"), None);
        assert_eq!(slot.install(window(0x20), "second"), Some("first"));

        assert_eq!(slot.take_for(window(0x10)), None);
        assert!(slot.is_occupied());
        assert_eq!(slot.take_for(window(0x20)), Some("second"));
        assert!(!slot.is_occupied());
    }

    #[test]
    fn take_clears_regardless_of_owner() {
        let mut slot = BarSlot::default();
        slot.install(window(0x10), "bar");
        assert_eq!(slot.take(), Some("bar"));
        assert_eq!(slot.take_for(window(0x10)), None);
    }
}
