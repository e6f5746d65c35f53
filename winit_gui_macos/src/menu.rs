use std::cell::Cell;

use objc2::rc::Retained;
use objc2::{MainThreadMarker, define_class, msg_send, sel};
use objc2_app_kit::{NSEventModifierFlags, NSMenu, NSMenuItem};
use objc2_foundation::{NSObject, NSString};
use winit_gui_core::{MenuItemId, Modifiers, NativeEvent, NativeEventProxy, NativeItem, Shortcut};

// While a popup runs its own tracking loop, clicks are handed back to the caller
// instead of being reported through the proxy.
thread_local! {
    static POPUP_TRACKING: Cell<bool> = const { Cell::new(false) };
    static POPUP_RESULT: Cell<Option<MenuItemId>> = const { Cell::new(None) };
}

pub(crate) struct MenuTargetIvars {
    proxy: NativeEventProxy,
}

define_class!(
    #[unsafe(super(NSObject))]
    #[name = "WinitGuiMenuTarget"]
    #[ivars = MenuTargetIvars]
    pub(crate) struct MenuTarget;

    impl MenuTarget {
        #[unsafe(method(menuItemClicked:))]
        fn menu_item_clicked(&self, sender: &NSMenuItem) {
            // tags carry the item id, which is never 0
            let tag = sender.tag();
            if tag <= 0 {
                return;
            }
            let id = MenuItemId::from_raw(tag as usize);
            if POPUP_TRACKING.get() {
                POPUP_RESULT.set(Some(id));
            } else {
                (self.ivars().proxy)(NativeEvent::MenuItemActivated { id });
            }
        }
    }
);

impl MenuTarget {
    pub(crate) fn new(mtm: MainThreadMarker, proxy: NativeEventProxy) -> Retained<Self> {
        let this = mtm.alloc().set_ivars(MenuTargetIvars { proxy });
        unsafe { msg_send![super(this), init] }
    }
}

/// Run `show` with clicks captured, returning the item chosen while it ran.
pub(crate) fn track_popup(show: impl FnOnce()) -> Option<MenuItemId> {
    POPUP_RESULT.set(None);
    POPUP_TRACKING.set(true);
    show();
    POPUP_TRACKING.set(false);
    POPUP_RESULT.take()
}

pub(crate) fn new_menu(mtm: MainThreadMarker, title: &str) -> Retained<NSMenu> {
    let menu = NSMenu::new(mtm);
    menu.setTitle(&NSString::from_str(title));
    // enabled state is not tracked, every row stays clickable
    menu.setAutoenablesItems(false);
    menu
}

pub(crate) fn create_menu_item(
    mtm: MainThreadMarker,
    item: &NativeItem<'_>,
    target: &MenuTarget,
) -> Retained<NSMenuItem> {
    let (key, mask) = match item.shortcut {
        Some(shortcut) => key_equivalent(shortcut),
        None => (String::new(), NSEventModifierFlags::empty()),
    };

    let menu_item = unsafe {
        NSMenuItem::initWithTitle_action_keyEquivalent(
            mtm.alloc(),
            &NSString::from_str(item.label),
            Some(sel!(menuItemClicked:)),
            &NSString::from_str(&key),
        )
    };
    menu_item.setKeyEquivalentModifierMask(mask);
    menu_item.setTag(item.id.into_raw() as isize);
    unsafe { menu_item.setTarget(Some(target)) };
    menu_item
}

pub(crate) fn create_submenu_item(
    mtm: MainThreadMarker,
    title: &str,
    submenu: &NSMenu,
) -> Retained<NSMenuItem> {
    let menu_item = unsafe {
        NSMenuItem::initWithTitle_action_keyEquivalent(
            mtm.alloc(),
            &NSString::from_str(title),
            None,
            &NSString::from_str(""),
        )
    };
    submenu.setTitle(&NSString::from_str(title));
    menu_item.setSubmenu(Some(submenu));
    menu_item
}

/// Key equivalent string and modifier mask displayed by AppKit.
fn key_equivalent(shortcut: Shortcut) -> (String, NSEventModifierFlags) {
    let modifiers = shortcut.modifiers();
    let mut mask = NSEventModifierFlags::empty();
    for (modifier, flag) in [
        (Modifiers::SHIFT, NSEventModifierFlags::Shift),
        (Modifiers::CONTROL, NSEventModifierFlags::Control),
        (Modifiers::ALT, NSEventModifierFlags::Option),
        (Modifiers::SUPER, NSEventModifierFlags::Command),
    ] {
        if modifiers.contains(modifier) {
            mask |= flag;
        }
    }
    (shortcut.key().to_string(), mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_equivalent_maps_every_modifier() {
        let (key, mask) = key_equivalent(Shortcut::new(Modifiers::ALL, 'R'));
        assert_eq!(key, "r");
        assert_eq!(
            mask,
            NSEventModifierFlags::Shift
                | NSEventModifierFlags::Control
                | NSEventModifierFlags::Option
                | NSEventModifierFlags::Command
        );
    }
}
