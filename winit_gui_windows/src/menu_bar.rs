//! Menu bar support for Windows.
//!
//! On Windows, the menu bar is attached to a window using SetMenu(). Clicks arrive as
//! `WM_COMMAND` at the window procedure, which is subclassed while a bar is installed.

#![allow(unsafe_op_in_unsafe_fn)]

use std::cell::RefCell;
use std::ptr;
use std::rc::Rc;

use windows_sys::Win32::{
    Foundation::{HWND, LPARAM, LRESULT, WPARAM},
    UI::{
        Shell::{DefSubclassProc, RemoveWindowSubclass, SetWindowSubclass},
        WindowsAndMessaging::{
            CreateMenu, DestroyMenu, DrawMenuBar, HMENU, MF_BYPOSITION, RemoveMenu, SetMenu,
            WM_COMMAND,
        },
    },
};
use winit_gui_core::{NativeEvent, NativeEventProxy, NativeMenuKind};

use crate::menu::{CommandMap, MenuRecord, append_popup};
use crate::util::{hiword, last_os_error, loword};

const SUBCLASS_ID: usize = 0x5747_4D42;

/// State reachable from the subclassed window procedure.
pub(crate) struct BarHook {
    pub(crate) proxy: NativeEventProxy,
    pub(crate) commands: Rc<RefCell<CommandMap>>,
}

/// A menu bar installed on a window.
#[derive(Debug)]
pub(crate) struct InstalledBar {
    hwnd: HWND,
    bar: HMENU,
    // bar created here to host a popup menu as its single entry
    wrapper: bool,
    hook: *mut BarHook,
}

/// # Safety
/// `hwnd` must be a valid window owned by the calling thread and `menu` a live menu.
pub(crate) unsafe fn install(hwnd: HWND, menu: &MenuRecord, hook: BarHook) -> anyhow::Result<InstalledBar> {
    let (bar, wrapper) = match menu.kind {
        NativeMenuKind::Bar => (menu.hmenu, false),
        NativeMenuKind::Popup => {
            let bar = CreateMenu();
            if bar.is_null() {
                return Err(last_os_error());
            }
            if let Err(err) = append_popup(bar, menu.hmenu, &menu.title) {
                DestroyMenu(bar);
                return Err(err);
            }
            (bar, true)
        }
    };

    if SetMenu(hwnd, bar) == 0 {
        let err = last_os_error();
        release_wrapper(bar, wrapper);
        return Err(err);
    }

    let hook = Box::into_raw(Box::new(hook));
    if SetWindowSubclass(hwnd, Some(subclass_proc), SUBCLASS_ID, hook as usize) == 0 {
        drop(Box::from_raw(hook));
        SetMenu(hwnd, ptr::null_mut());
        release_wrapper(bar, wrapper);
        return Err(anyhow::anyhow!("failed to subclass window for menu bar commands"));
    }

    DrawMenuBar(hwnd);
    Ok(InstalledBar {
        hwnd,
        bar,
        wrapper,
        hook,
    })
}

impl InstalledBar {
    pub(crate) fn redraw(&self) {
        unsafe { DrawMenuBar(self.hwnd) };
    }

    /// Take the bar off the window. Menus created by the caller are left alive.
    pub(crate) fn remove(self) {
        unsafe {
            RemoveWindowSubclass(self.hwnd, Some(subclass_proc), SUBCLASS_ID);
            drop(Box::from_raw(self.hook));
            SetMenu(self.hwnd, ptr::null_mut());
            release_wrapper(self.bar, self.wrapper);
            DrawMenuBar(self.hwnd);
        }
    }
}

/// Destroy a wrapper bar without destroying the menu it hosts.
unsafe fn release_wrapper(bar: HMENU, wrapper: bool) {
    if wrapper {
        RemoveMenu(bar, 0, MF_BYPOSITION);
        DestroyMenu(bar);
    }
}

unsafe extern "system" fn subclass_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
    _id: usize,
    refdata: usize,
) -> LRESULT {
    // high word 0 and no control handle: the command came from a menu
    if msg == WM_COMMAND && hiword(wparam) == 0 && lparam == 0 {
        let hook = &*(refdata as *const BarHook);
        let item = hook.commands.borrow().get(loword(wparam));
        if let Some(id) = item {
            (hook.proxy)(NativeEvent::MenuItemActivated { id });
            return 0;
        }
    }
    DefSubclassProc(hwnd, msg, wparam, lparam)
}
