//! `HMENU` construction for native menus.

#![allow(unsafe_op_in_unsafe_fn)]

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::ptr;

use anyhow::anyhow;

use windows_sys::Win32::UI::WindowsAndMessaging::{
    AppendMenuW, CreateMenu, CreatePopupMenu, GetMenuItemCount, GetSubMenu, HMENU, MF_BYPOSITION,
    MF_POPUP, MF_SEPARATOR, MF_STRING, RemoveMenu,
};
use winit_gui_core::{MenuItemId, NativeItem, NativeMenuHandle, NativeMenuKind};

use crate::util::{encode_wide, last_os_error};

/// A live `HMENU` and what was appended to it.
#[derive(Debug)]
pub(crate) struct MenuRecord {
    pub(crate) hmenu: HMENU,
    pub(crate) kind: NativeMenuKind,
    pub(crate) title: String,
    pub(crate) commands: Vec<u16>,
    pub(crate) submenus: Vec<NativeMenuHandle>,
}

/// Maps `WM_COMMAND` ids to menu items.
#[derive(Debug, Default)]
pub(crate) struct CommandMap {
    last: u16,
    items: HashMap<u16, MenuItemId>,
}

impl CommandMap {
    /// Allocate a command id for `item`, skipping ids still in use after a wrap.
    pub(crate) fn insert(&mut self, item: MenuItemId) -> anyhow::Result<u16> {
        for _ in 0..u16::MAX {
            // command ids are 16 bits wide and 0 means nothing was chosen
            self.last = self.last.checked_add(1).unwrap_or(1);
            if let Entry::Vacant(entry) = self.items.entry(self.last) {
                entry.insert(item);
                return Ok(self.last);
            }
        }
        Err(anyhow!("all {} menu command ids are in use", u16::MAX))
    }

    pub(crate) fn get(&self, command: u16) -> Option<MenuItemId> {
        self.items.get(&command).copied()
    }

    pub(crate) fn remove(&mut self, command: u16) {
        self.items.remove(&command);
    }
}

/// Row text, with the shortcut right-aligned after a tab.
pub(crate) fn item_label(item: &NativeItem<'_>) -> Vec<u16> {
    // a single '&' would underline the next character
    let label = item.label.replace('&', "&&");
    match item.shortcut {
        Some(shortcut) => encode_wide(format!("{label}\t{shortcut}")),
        None => encode_wide(label),
    }
}

pub(crate) unsafe fn create(kind: NativeMenuKind) -> anyhow::Result<HMENU> {
    let hmenu = match kind {
        NativeMenuKind::Bar => CreateMenu(),
        NativeMenuKind::Popup => CreatePopupMenu(),
    };
    if hmenu.is_null() {
        return Err(last_os_error());
    }
    Ok(hmenu)
}

pub(crate) unsafe fn append_string(hmenu: HMENU, command: u16, label: &[u16]) -> anyhow::Result<()> {
    if AppendMenuW(hmenu, MF_STRING, command as usize, label.as_ptr()) == 0 {
        return Err(last_os_error());
    }
    Ok(())
}

pub(crate) unsafe fn append_separator(hmenu: HMENU) -> anyhow::Result<()> {
    if AppendMenuW(hmenu, MF_SEPARATOR, 0, ptr::null()) == 0 {
        return Err(last_os_error());
    }
    Ok(())
}

pub(crate) unsafe fn append_popup(hmenu: HMENU, submenu: HMENU, title: &str) -> anyhow::Result<()> {
    let label = encode_wide(title.replace('&', "&&"));
    if AppendMenuW(hmenu, MF_POPUP, submenu as usize, label.as_ptr()) == 0 {
        return Err(last_os_error());
    }
    Ok(())
}

/// Detach the row opening `submenu` without destroying `submenu`.
pub(crate) unsafe fn remove_popup(hmenu: HMENU, submenu: HMENU) -> anyhow::Result<()> {
    let count = GetMenuItemCount(hmenu);
    if count < 0 {
        return Err(last_os_error());
    }
    for position in 0..count {
        if GetSubMenu(hmenu, position) == submenu {
            if RemoveMenu(hmenu, position as u32, MF_BYPOSITION) == 0 {
                return Err(last_os_error());
            }
            return Ok(());
        }
    }
    Err(anyhow::anyhow!("sub-menu not found in parent menu"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit_gui_core::{Modifiers, Shortcut};

    #[test]
    fn command_ids_skip_zero_on_wrap() {
        let mut commands = CommandMap {
            last: u16::MAX - 1,
            ..CommandMap::default()
        };
        let item = MenuItemId::from_raw(7);
        assert_eq!(commands.insert(item).unwrap(), u16::MAX);
        assert_eq!(commands.insert(item).unwrap(), 1);
        assert_eq!(commands.get(1), Some(item));
    }

    #[test]
    fn wrapped_command_ids_skip_live_rows() {
        let mut commands = CommandMap::default();
        let live = MenuItemId::from_raw(1);
        let fresh = MenuItemId::from_raw(2);
        assert_eq!(commands.insert(live).unwrap(), 1);
        assert_eq!(commands.insert(live).unwrap(), 2);
        commands.remove(2);

        commands.last = u16::MAX;
        // 1 still belongs to a live row
        assert_eq!(commands.insert(fresh).unwrap(), 2);
        assert_eq!(commands.get(1), Some(live));
        assert_eq!(commands.get(2), Some(fresh));
    }

    #[test]
    fn exhausted_command_ids_are_an_error() {
        let mut commands = CommandMap::default();
        for raw in 1..=u16::MAX {
            commands.items.insert(raw, MenuItemId::from_raw(raw as usize));
        }
        assert!(commands.insert(MenuItemId::from_raw(0)).is_err());
    }

    #[test]
    fn labels_carry_shortcut_hint() {
        let item = NativeItem {
            id: MenuItemId::from_raw(1),
            label: "Black & White",
            shortcut: Some(Shortcut::new(Modifiers::CONTROL, 'b')),
        };
        let expected = encode_wide("Black && White\tCtrl+B");
        assert_eq!(item_label(&item), expected);
    }
}
